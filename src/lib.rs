//! Octodash - a small demo dashboard behind a GitHub OAuth login
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HTTP Layer (Axum)                       │
//! │  - GET /  login page, OAuth callback, dashboard             │
//! │  - /auth/github, /api/me, /metrics, /health                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Auth Layer                              │
//! │  - Authorization-code flow (AuthSessionManager)             │
//! │  - In-memory sessions behind signed cookies                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      GitHub                                  │
//! │  - /login/oauth/authorize, /login/oauth/access_token        │
//! │  - api.github.com/user                                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `auth`: GitHub OAuth flow and session management
//! - `dashboard`: Login/dashboard pages and demo data
//! - `api`: JSON and metrics endpoints
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod metrics;

use std::sync::Arc;
use std::time::Duration;

/// Application state shared across all handlers
///
/// Cheap to clone; everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Browser sessions (volatile)
    pub sessions: Arc<auth::SessionStore>,

    /// OAuth flow driver
    pub auth: Arc<auth::AuthSessionManager<auth::GitHubClient>>,

    /// HMAC key for session cookies
    pub cookie_secret: Arc<[u8]>,

    /// Demo data shown on the dashboard
    pub demo_data: Arc<dashboard::DemoDataCache>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Errors
    /// Returns error if the GitHub client cannot be built or the
    /// configuration is inconsistent
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let provider = auth::GitHubClient::new(&config.github)?;
        let auth = auth::AuthSessionManager::new(&config, provider)?;

        let cookie_secret: Arc<[u8]> = match &config.session.secret {
            Some(secret) => Arc::from(secret.as_bytes()),
            None => {
                use rand::RngCore;
                tracing::info!("No session.secret configured; using a random per-process key");
                let mut key = [0u8; 32];
                rand::thread_rng().fill_bytes(&mut key);
                Arc::from(&key[..])
            }
        };

        let sessions =
            auth::SessionStore::new(Duration::from_secs(config.session.idle_timeout_seconds));
        let demo_data =
            dashboard::DemoDataCache::new(Duration::from_secs(config.dashboard.data_ttl_seconds));

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            sessions: Arc::new(sessions),
            auth: Arc::new(auth),
            cookie_secret,
            demo_data: Arc::new(demo_data),
        })
    }

    /// Public URL carrying the logout signal
    pub fn logout_url(&self) -> String {
        match url::Url::parse(&self.config.server.public_url) {
            Ok(mut url) => {
                url.set_query(Some("logout=1"));
                url.to_string()
            }
            Err(_) => "/?logout=1".to_string(),
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower::ServiceBuilder;
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(dashboard::dashboard_router())
        .merge(auth::auth_router())
        .nest("/api", api::me_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer)
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
        .merge(api::metrics_router())
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::CorsLayer;

    let origin = url::Url::parse(&server.public_url)
        .map(|url| url.origin().ascii_serialization())
        .unwrap_or_default();

    match HeaderValue::from_str(&origin) {
        Ok(origin) => CorsLayer::new().allow_origin([origin]),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %origin,
                "Failed to parse CORS origin from the public URL; denying cross-origin requests"
            );
            CorsLayer::new()
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
