//! Dashboard pages
//!
//! `GET /` is the single page of the app and the registered OAuth redirect
//! URI. Every request runs the same pass, top to bottom:
//!
//! 1. `?logout=...` tears the session down
//! 2. `?error=...` from GitHub is surfaced
//! 3. `?code=...&state=...` completes the login
//! 4. otherwise the login page or the dashboard is rendered
//!
//! Steps 1-3 always end in a redirect to `/`, so the query parameters that
//! triggered them are gone after the next load.

pub mod data;
pub mod pages;

use axum::{
    Router,
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};

pub use data::{DemoData, DemoDataCache, Kpis};

use crate::AppState;
use crate::auth::{BrowserSession, CallbackParams, removal_cookie};
use crate::error::{AppError, AuthError};

/// Create dashboard router
///
/// Routes:
/// - GET / - Login page, OAuth callback and dashboard
pub fn dashboard_router() -> Router<AppState> {
    Router::new().route("/", get(index))
}

/// Query parameters understood by `GET /`
#[derive(Debug, Default)]
pub struct PageQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub logout: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl PageQuery {
    /// Fold raw query pairs, keeping the first value of a repeated key
    ///
    /// Unknown keys are ignored. This never fails, so every request reaches
    /// the pass and its parameters are cleared by the redirect.
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "code" => &mut query.code,
                "state" => &mut query.state,
                "logout" => &mut query.logout,
                "error" => &mut query.error,
                "error_description" => &mut query.error_description,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        query
    }

    fn wants_logout(&self) -> bool {
        self.logout.as_deref().is_some_and(|value| !value.is_empty())
    }

    fn has_callback(&self) -> bool {
        self.code.is_some() && self.state.is_some()
    }

    /// Take the callback parameters if both are present
    fn take_callback(&mut self) -> Option<CallbackParams> {
        match (self.code.take(), self.state.take()) {
            (Some(code), Some(state)) => Some(CallbackParams { code, state }),
            _ => None,
        }
    }

    fn provider_error(&self) -> Option<AuthError> {
        let error = self.error.as_deref()?;
        let reason = self
            .error_description
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(error);
        Some(AuthError::AuthorizationDenied(reason.to_string()))
    }
}

fn home() -> Redirect {
    Redirect::to("/")
}

/// GET /
async fn index(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
    mut browser: BrowserSession,
) -> Result<Response, AppError> {
    let mut query = PageQuery::from_pairs(pairs);

    if query.wants_logout() {
        if let Some((id, handle)) = browser.take_existing() {
            let mut session = handle.lock().await;
            state.auth.handle_logout(&mut session);
            drop(session);
            state.sessions.remove(&id).await;
        }
        let jar = browser.into_jar().remove(removal_cookie(&state));
        return Ok((jar, home()).into_response());
    }

    // Without credentials the login page writes nothing to the session, so
    // a browser without one does not get one.
    if browser.handle().is_none() && query.error.is_none() && !query.has_callback() {
        if let Err(err) = state.auth.credentials() {
            let html = pages::login_page(Err(&err), None);
            return Ok((browser.into_jar(), Html(html)).into_response());
        }
    }

    let handle = browser.get_or_create(&state).await?;
    let jar = browser.into_jar();
    let mut session = handle.lock().await;
    session.touch();

    if !session.is_authenticated() {
        if let Some(err) = query.provider_error() {
            tracing::warn!(error = %err, "GitHub returned an authorization error");
            session.set_flash(err.to_string());
            return Ok((jar, home()).into_response());
        }

        if let Some(callback) = query.take_callback() {
            if let Err(err) = state.auth.handle_callback(&mut session, callback).await {
                tracing::warn!(error_kind = err.kind(), error = %err, "Login failed");
                session.set_flash(err.to_string());
            }
            return Ok((jar, home()).into_response());
        }

        let flash = session.take_flash();
        let sign_in = state.auth.build_authorization_url(&mut session);
        let html = pages::login_page(sign_in.as_ref(), flash.as_deref());
        return Ok((jar, Html(html)).into_response());
    }

    session.take_flash();
    let user = session
        .user()
        .cloned()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("authenticated session without user")))?;
    drop(session);

    let data = state.demo_data.get().await;
    let logout_url = state.logout_url();
    let html = pages::dashboard_page(&user, &data, &logout_url, chrono::Utc::now());

    Ok((jar, Html(html)).into_response())
}
