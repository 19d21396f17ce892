//! GitHub OAuth authorization-code flow
//!
//! The flow for one session is:
//!
//! ```text
//! Unauthenticated --(callback: state ok, token ok, profile ok)--> Authenticated
//! Authenticated   --(logout)-------------------------------------> Unauthenticated
//! ```
//!
//! A failed callback leaves the session exactly as it was. Nothing is
//! written to the session until both provider calls have succeeded.

use url::Url;

use super::github::{IdentityProvider, TokenRequest};
use super::session::Session;
use crate::config::{AppConfig, GitHubCredentials};
use crate::error::{AppError, AuthError};
use crate::metrics::LOGIN_ATTEMPTS_TOTAL;

/// Query parameters GitHub appends when redirecting back
///
/// Taken by value so a callback can only be processed once.
#[derive(Debug)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

/// Drives the login flow against an identity provider
pub struct AuthSessionManager<P> {
    provider: P,
    credentials: Option<GitHubCredentials>,
    authorize_url: Url,
    redirect_uri: String,
    scope: String,
}

impl<P: IdentityProvider> AuthSessionManager<P> {
    /// Create a manager from configuration
    ///
    /// Missing client credentials are not an error here: the login page
    /// shows a warning instead of a sign-in link.
    ///
    /// # Errors
    /// Returns error if the authorize URL is invalid
    pub fn new(config: &AppConfig, provider: P) -> Result<Self, AppError> {
        let authorize_url = Url::parse(&config.github.authorize_url)
            .map_err(|e| AppError::Config(format!("github.authorize_url: {e}")))?;

        Ok(Self {
            provider,
            credentials: config.github.credentials().ok(),
            authorize_url,
            redirect_uri: config.server.public_url.clone(),
            scope: config.github.scope.clone(),
        })
    }

    #[cfg(test)]
    pub(crate) fn provider(&self) -> &P {
        &self.provider
    }

    /// Configured client credentials
    ///
    /// # Errors
    /// Returns `AuthError::MissingCredentials` when not configured
    pub fn credentials(&self) -> Result<&GitHubCredentials, AuthError> {
        self.credentials.as_ref().ok_or(AuthError::MissingCredentials)
    }

    /// Build the GitHub authorize URL for this session
    ///
    /// Creates the session's state token on first use; calling this again
    /// in the same session yields the same `state`.
    ///
    /// # Errors
    /// Returns `AuthError::MissingCredentials` when not configured
    pub fn build_authorization_url(&self, session: &mut Session) -> Result<Url, AuthError> {
        let credentials = self.credentials()?;
        let state = session.get_or_create_state();

        let mut url = self.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &credentials.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &self.scope)
            .append_pair("state", state);

        Ok(url)
    }

    /// Process a GitHub callback
    ///
    /// # Steps
    /// 1. Verify the callback `state` against the session's
    /// 2. Exchange the code for an access token
    /// 3. Fetch the user profile with that token
    /// 4. Store token and profile in the session
    ///
    /// # Errors
    /// Returns the first failing step's error. The session is left
    /// untouched in that case.
    pub async fn handle_callback(
        &self,
        session: &mut Session,
        callback: CallbackParams,
    ) -> Result<(), AuthError> {
        let result = self.complete_login(session, callback).await;

        let outcome = match &result {
            Ok(()) => "success",
            Err(err) => err.kind(),
        };
        LOGIN_ATTEMPTS_TOTAL.with_label_values(&[outcome]).inc();

        result
    }

    async fn complete_login(
        &self,
        session: &mut Session,
        callback: CallbackParams,
    ) -> Result<(), AuthError> {
        if !session.state_matches(&callback.state) {
            tracing::warn!("OAuth callback state does not match the session");
            return Err(AuthError::CsrfMismatch);
        }

        let credentials = self.credentials()?;
        let token = self
            .provider
            .exchange_code(TokenRequest {
                client_id: &credentials.client_id,
                client_secret: &credentials.client_secret,
                code: &callback.code,
                redirect_uri: &self.redirect_uri,
                state: &callback.state,
            })
            .await?;

        let user = self.provider.fetch_user(&token).await?;

        tracing::info!(login = %user.login, "GitHub login succeeded");
        session.authenticate(token, user);
        Ok(())
    }

    /// Clear all login state of a session
    pub fn handle_logout(&self, session: &mut Session) {
        if let Some(user) = session.user() {
            tracing::info!(login = %user.login, "Logging out");
        }
        session.teardown();

        use crate::metrics::LOGOUTS_TOTAL;
        LOGOUTS_TOTAL.inc();
    }
}
