//! Error types for Octodash
//!
//! `AuthError` covers everything that can go wrong while driving the
//! GitHub login flow. Those errors are surfaced to the user as a message on
//! the next page render and never abort the process.
//!
//! `AppError` is the HTTP-facing error. It implements `IntoResponse`
//! so handlers can bubble failures up with `?`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Login flow failures
///
/// The `Display` output of each variant is shown to the user verbatim,
/// so it must never include secrets or tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Callback `state` did not match the one stored in the session
    #[error("State mismatch. Possible CSRF attack.")]
    CsrfMismatch,

    /// Token endpoint answered with a non-success status or no token
    #[error("Failed to obtain a token from GitHub: {0}")]
    TokenExchangeFailed(String),

    /// User endpoint answered with a non-success status or an unreadable body
    #[error("Could not fetch the GitHub user profile: {0}")]
    ProfileFetchFailed(String),

    /// Client id or client secret is not configured
    #[error(
        "GitHub OAuth credentials are not configured. Set GITHUB_CLIENT_ID and GITHUB_CLIENT_SECRET."
    )]
    MissingCredentials,

    /// GitHub redirected back with an `error` parameter instead of a code
    #[error("GitHub authorization was not granted: {0}")]
    AuthorizationDenied(String),
}

impl AuthError {
    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::CsrfMismatch => "csrf_mismatch",
            AuthError::TokenExchangeFailed(_) => "token_exchange_failed",
            AuthError::ProfileFetchFailed(_) => "profile_fetch_failed",
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::AuthorizationDenied(_) => "authorization_denied",
        }
    }
}

/// Application-wide error type
///
/// Each variant maps to an HTTP status code and a JSON error body.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication required (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Login flow error (400/502/503)
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Auth(err) => {
                let status = match err {
                    AuthError::CsrfMismatch | AuthError::AuthorizationDenied(_) => {
                        StatusCode::BAD_REQUEST
                    }
                    AuthError::TokenExchangeFailed(_) | AuthError::ProfileFetchFailed(_) => {
                        StatusCode::BAD_GATEWAY
                    }
                    AuthError::MissingCredentials => StatusCode::SERVICE_UNAVAILABLE,
                };
                (status, err.kind())
            }
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_type) = self.status_and_type();
        let error_message = match &self {
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[error_type]).inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
