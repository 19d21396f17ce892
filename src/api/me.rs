//! Session introspection endpoint
//!
//! Lets scripts and the browser check who is logged in.

use axum::{Json, Router, routing::get};

use crate::AppState;
use crate::auth::{CurrentUser, GitHubUser};

/// Create session API router
///
/// Routes:
/// - GET /me - GitHub profile of the logged-in user
pub fn me_router() -> Router<AppState> {
    Router::new().route("/me", get(me))
}

/// GET /api/me
///
/// Returns the stored GitHub profile, or 401 without a logged-in session.
async fn me(CurrentUser(user): CurrentUser) -> Json<GitHubUser> {
    Json(user)
}
