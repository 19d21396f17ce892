//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use url::Url;

use crate::error::AuthError;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub github: GitHubOAuthConfig,
    pub session: SessionConfig,
    pub dashboard: DashboardConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public URL of this application
    ///
    /// Used as the OAuth `redirect_uri`, so it must exactly match the
    /// callback URL registered with the GitHub OAuth app.
    pub public_url: String,
}

impl ServerConfig {
    /// Whether the public URL is served over TLS
    pub fn is_https(&self) -> bool {
        self.public_url
            .trim_start()
            .to_ascii_lowercase()
            .starts_with("https://")
    }
}

/// GitHub OAuth configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubOAuthConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Authorization endpoint users are redirected to
    pub authorize_url: String,
    /// Code-for-token exchange endpoint
    pub token_url: String,
    /// Authenticated user profile endpoint
    pub user_api_url: String,
    /// Requested OAuth scope
    pub scope: String,
    /// Timeout for each provider request in seconds
    pub timeout_seconds: u64,
}

/// Client credentials, present only when both halves are configured
#[derive(Clone)]
pub struct GitHubCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for GitHubCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

impl GitHubOAuthConfig {
    /// Get the configured client credentials
    ///
    /// Blank values count as missing.
    ///
    /// # Errors
    /// Returns `AuthError::MissingCredentials` if either value is absent
    pub fn credentials(&self) -> Result<GitHubCredentials, AuthError> {
        let non_blank = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(ToOwned::to_owned)
        };

        match (non_blank(&self.client_id), non_blank(&self.client_secret)) {
            (Some(client_id), Some(client_secret)) => Ok(GitHubCredentials {
                client_id,
                client_secret,
            }),
            _ => Err(AuthError::MissingCredentials),
        }
    }
}

/// Browser session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Name of the session cookie
    pub cookie_name: String,
    /// HMAC key for the session cookie (32+ bytes)
    ///
    /// When unset a random key is generated at startup, which invalidates
    /// all cookies on restart. Sessions are in-memory anyway.
    pub secret: Option<String>,
    /// Seconds without a request after which a session is dropped
    pub idle_timeout_seconds: u64,
}

/// Dashboard configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// How long generated demo data is reused before regenerating
    pub data_ttl_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.trim().eq_ignore_ascii_case("json")
    }

    /// Filter directives used when `RUST_LOG` is not set
    pub fn filter_directives(&self) -> String {
        format!("octodash={},tower_http=info", self.level.trim())
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (OCTODASH__*)
    /// 5. GITHUB_CLIENT_ID, GITHUB_CLIENT_SECRET and APP_URL
    ///
    /// The result is not validated yet. The binary sets up logging from
    /// `logging` first and then calls [`AppConfig::validate`], so the
    /// validation warnings are logged with the configured subscriber.
    ///
    /// # Errors
    /// Returns error if the sources cannot be read or deserialized
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.public_url", "http://localhost:8080")?
            .set_default(
                "github.authorize_url",
                "https://github.com/login/oauth/authorize",
            )?
            .set_default(
                "github.token_url",
                "https://github.com/login/oauth/access_token",
            )?
            .set_default("github.user_api_url", "https://api.github.com/user")?
            .set_default("github.scope", "read:user")?
            .set_default("github.timeout_seconds", 10)?
            .set_default("session.cookie_name", "octodash_session")?
            .set_default("session.idle_timeout_seconds", 86400)?
            .set_default("dashboard.data_ttl_seconds", 60)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("OCTODASH")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("github.client_id", std::env::var("GITHUB_CLIENT_ID").ok())?
            .set_override_option(
                "github.client_secret",
                std::env::var("GITHUB_CLIENT_SECRET").ok(),
            )?
            .set_override_option("server.public_url", std::env::var("APP_URL").ok())?
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))
    }

    pub fn should_use_secure_cookies(&self) -> bool {
        self.server.is_https()
    }

    /// Check the loaded values
    ///
    /// # Errors
    /// Returns `AppError::Config` for malformed URLs, a session secret
    /// shorter than 32 bytes or a zero provider timeout
    pub fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        for (key, value) in [
            ("server.public_url", &self.server.public_url),
            ("github.authorize_url", &self.github.authorize_url),
            ("github.token_url", &self.github.token_url),
            ("github.user_api_url", &self.github.user_api_url),
        ] {
            Url::parse(value).map_err(|e| {
                crate::error::AppError::Config(format!("{key} is not a valid URL: {e}"))
            })?;
        }

        if let Some(secret) = &self.session.secret {
            if secret.as_bytes().len() < MIN_SESSION_SECRET_BYTES {
                return Err(crate::error::AppError::Config(format!(
                    "session.secret must be at least {} bytes",
                    MIN_SESSION_SECRET_BYTES
                )));
            }
        }

        if self.github.timeout_seconds == 0 {
            return Err(crate::error::AppError::Config(
                "github.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.github.credentials().is_err() {
            tracing::warn!("GitHub OAuth credentials are not configured; login is disabled");
        }

        if !self.should_use_secure_cookies() {
            tracing::warn!(
                public_url = %self.server.public_url,
                "Using insecure session cookies for a non-https public URL"
            );
        }

        Ok(())
    }
}
