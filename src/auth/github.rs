//! GitHub API calls used by the login flow
//!
//! Two requests are made per login: the code-for-token exchange and the
//! authenticated profile fetch. Neither is retried.

use std::future::Future;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};

use super::session::{AccessToken, GitHubUser};
use crate::config::GitHubOAuthConfig;
use crate::error::{AppError, AuthError};

/// Form body of the token exchange request
#[derive(Debug, Clone, Serialize)]
pub struct TokenRequest<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub code: &'a str,
    pub redirect_uri: &'a str,
    pub state: &'a str,
}

/// Identity provider the login flow talks to
///
/// Implemented by [`GitHubClient`]; tests plug in their own.
pub trait IdentityProvider: Send + Sync {
    /// Exchange an authorization code for an access token
    fn exchange_code(
        &self,
        request: TokenRequest<'_>,
    ) -> impl Future<Output = Result<AccessToken, AuthError>> + Send;

    /// Fetch the profile of the user the token belongs to
    fn fetch_user(
        &self,
        token: &AccessToken,
    ) -> impl Future<Output = Result<GitHubUser, AuthError>> + Send;
}

/// GitHub token endpoint response
///
/// GitHub reports a bad or expired code with status 200 and an `error`
/// field, so every field is optional.
#[derive(Debug, Deserialize)]
struct GitHubTokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// HTTP client for the GitHub OAuth and user endpoints
pub struct GitHubClient {
    http: reqwest::Client,
    token_url: String,
    user_api_url: String,
}

impl GitHubClient {
    /// Create a client from configuration
    ///
    /// Every request uses `github.timeout_seconds` as its timeout.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: &GitHubOAuthConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("Octodash/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self {
            http,
            token_url: config.token_url.clone(),
            user_api_url: config.user_api_url.clone(),
        })
    }
}

fn observe(endpoint: &str, status: &str, started: Instant) {
    use crate::metrics::PROVIDER_REQUEST_DURATION_SECONDS;
    PROVIDER_REQUEST_DURATION_SECONDS
        .with_label_values(&[endpoint, status])
        .observe(started.elapsed().as_secs_f64());
}

impl IdentityProvider for GitHubClient {
    async fn exchange_code(&self, request: TokenRequest<'_>) -> Result<AccessToken, AuthError> {
        let started = Instant::now();
        let response = self
            .http
            .post(&self.token_url)
            .header(ACCEPT, "application/json")
            .form(&request)
            .send()
            .await
            .map_err(|e| {
                observe("token", "error", started);
                tracing::warn!(error = %e, "Token exchange request failed");
                AuthError::TokenExchangeFailed(e.to_string())
            })?;

        let status = response.status();
        observe("token", status.as_str(), started);

        if status != StatusCode::OK {
            tracing::warn!(status = status.as_u16(), "Token endpoint returned an error status");
            return Err(AuthError::TokenExchangeFailed(format!(
                "HTTP {}",
                status.as_u16()
            )));
        }

        let body: GitHubTokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::TokenExchangeFailed(format!("invalid response: {e}")))?;

        match body.access_token.filter(|token| !token.is_empty()) {
            Some(token) => Ok(AccessToken::new(token)),
            None => {
                let reason = body
                    .error_description
                    .or(body.error)
                    .unwrap_or_else(|| "response did not include an access token".to_string());
                tracing::warn!(reason = %reason, "Token endpoint did not issue a token");
                Err(AuthError::TokenExchangeFailed(reason))
            }
        }
    }

    async fn fetch_user(&self, token: &AccessToken) -> Result<GitHubUser, AuthError> {
        let started = Instant::now();
        let response = self
            .http
            .get(&self.user_api_url)
            .header(AUTHORIZATION, format!("token {}", token.secret()))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                observe("user", "error", started);
                tracing::warn!(error = %e, "Profile request failed");
                AuthError::ProfileFetchFailed(e.to_string())
            })?;

        let status = response.status();
        observe("user", status.as_str(), started);

        if status != StatusCode::OK {
            tracing::warn!(status = status.as_u16(), "User endpoint returned an error status");
            return Err(AuthError::ProfileFetchFailed(format!(
                "HTTP {}",
                status.as_u16()
            )));
        }

        response
            .json::<GitHubUser>()
            .await
            .map_err(|e| AuthError::ProfileFetchFailed(format!("invalid response: {e}")))
    }
}
