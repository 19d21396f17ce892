//! Session extractors
//!
//! Resolve the browser's session from its signed cookie.

use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};

use super::session::{GitHubUser, SessionId, sign_session_id, verify_session_cookie};
use super::store::SessionHandle;
use crate::AppState;
use crate::error::AppError;

fn session_id_from_jar(jar: &CookieJar, state: &AppState) -> Option<SessionId> {
    let cookie = jar.get(&state.config.session.cookie_name)?;
    verify_session_cookie(cookie.value(), &state.cookie_secret).ok()
}

fn session_cookie(state: &AppState, value: String) -> Cookie<'static> {
    Cookie::build((state.config.session.cookie_name.clone(), value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.should_use_secure_cookies())
        .build()
}

/// Cookie that expires the session cookie in the browser
pub fn removal_cookie(state: &AppState) -> Cookie<'static> {
    Cookie::build(state.config.session.cookie_name.clone())
        .path("/")
        .build()
}

/// The browser's session, if it already has one
///
/// Extraction only looks the session up. Nothing is stored for a browser
/// until a handler calls [`BrowserSession::get_or_create`], and the jar
/// returned by [`BrowserSession::into_jar`] then carries the `Set-Cookie`
/// for the new session, so it must be part of the response.
///
/// # Usage
/// ```ignore
/// async fn handler(State(state): State<AppState>, mut browser: BrowserSession) -> Result<impl IntoResponse, AppError> {
///     let handle = browser.get_or_create(&state).await?;
///     let token = handle.lock().await.get_or_create_state().to_string();
///     Ok((browser.into_jar(), token))
/// }
/// ```
pub struct BrowserSession {
    current: Option<(SessionId, SessionHandle)>,
    jar: CookieJar,
}

impl BrowserSession {
    /// Handle of the existing session
    pub fn handle(&self) -> Option<&SessionHandle> {
        self.current.as_ref().map(|(_, handle)| handle)
    }

    /// Detach the existing session, e.g. to end it
    pub fn take_existing(&mut self) -> Option<(SessionId, SessionHandle)> {
        self.current.take()
    }

    /// Get the session, registering a new one and its cookie on first use
    ///
    /// # Errors
    /// Returns error if the session cookie cannot be signed
    pub async fn get_or_create(&mut self, state: &AppState) -> Result<SessionHandle, AppError> {
        if let Some((_, handle)) = &self.current {
            return Ok(handle.clone());
        }

        let (id, handle) = state.sessions.create().await;
        let value = match sign_session_id(&id, &state.cookie_secret) {
            Ok(value) => value,
            Err(err) => {
                state.sessions.remove(&id).await;
                return Err(err);
            }
        };

        self.jar = self.jar.clone().add(session_cookie(state, value));
        self.current = Some((id, handle.clone()));
        Ok(handle)
    }

    pub fn into_jar(self) -> CookieJar {
        self.jar
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for BrowserSession
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);

        let mut current = None;
        if let Some(id) = session_id_from_jar(&jar, &state) {
            match state.sessions.get(&id).await {
                Some(handle) => current = Some((id, handle)),
                None => {
                    tracing::debug!(session_id = %id, "Session cookie refers to an unknown session");
                }
            }
        }

        Ok(BrowserSession { current, jar })
    }
}

/// Extractor for the currently logged-in GitHub user
///
/// Never creates a session; rejects with 401 when the browser has no
/// authenticated session.
///
/// # Usage
/// ```ignore
/// async fn handler(CurrentUser(user): CurrentUser) -> impl IntoResponse {
///     format!("Hello, {}", user.login)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub GitHubUser);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);

        let id = session_id_from_jar(&jar, &state).ok_or(AppError::Unauthorized)?;
        let handle = state
            .sessions
            .get(&id)
            .await
            .ok_or(AppError::Unauthorized)?;

        let mut session = handle.lock().await;
        session.touch();
        session
            .user()
            .cloned()
            .map(CurrentUser)
            .ok_or(AppError::Unauthorized)
    }
}
