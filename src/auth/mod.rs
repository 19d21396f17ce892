//! GitHub OAuth authentication
//!
//! Handles:
//! - GitHub OAuth authorization-code flow
//! - In-memory browser sessions
//! - Session extractors for handlers

pub mod github;
pub mod manager;
mod middleware;
mod oauth;
pub mod session;
pub mod store;

pub use github::{GitHubClient, IdentityProvider, TokenRequest};
pub use manager::{AuthSessionManager, CallbackParams};
pub use middleware::{BrowserSession, CurrentUser, removal_cookie};
pub use oauth::auth_router;
pub use session::{
    AccessToken, GitHubUser, Session, SessionId, sign_session_id, verify_session_cookie,
};
pub use store::{SessionHandle, SessionStore};
