//! GitHub OAuth routes
//!
//! The callback itself lands on `/` (the registered redirect URI), where
//! the page handler runs the flow. This router only adds the explicit
//! sign-in entry point.

use axum::{
    Router,
    extract::State,
    response::{IntoResponse, Redirect},
    routing::get,
};

use super::middleware::BrowserSession;
use crate::AppState;
use crate::error::AppError;

/// Create authentication router
///
/// Routes:
/// - GET /auth/github - Redirect to GitHub
pub fn auth_router() -> Router<AppState> {
    Router::new().route("/auth/github", get(github_redirect))
}

/// GET /auth/github
///
/// Redirects the browser to GitHub's authorization page.
///
/// # Steps
/// 1. Fail with 503 when the OAuth app is not configured
/// 2. Resolve (or create) the browser session
/// 3. Get or create the session's CSRF state token
/// 4. Redirect to GitHub with client_id, redirect_uri, scope, state
async fn github_redirect(
    State(state): State<AppState>,
    mut browser: BrowserSession,
) -> Result<impl IntoResponse, AppError> {
    state.auth.credentials()?;

    let handle = browser.get_or_create(&state).await?;
    let mut session = handle.lock().await;
    session.touch();
    let url = state.auth.build_authorization_url(&mut session)?;
    drop(session);

    Ok((browser.into_jar(), Redirect::to(url.as_str())))
}
