//! Octodash binary entry point

use octodash::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Load `.env` if present
/// 2. Load configuration from file and environment
/// 3. Initialize tracing/logging from the `logging` section
/// 4. Validate configuration and initialize metrics
/// 5. Initialize AppState
/// 6. Build Axum router and start HTTP server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load .env (optional)
    let _ = dotenvy::dotenv();

    // 2. Load configuration
    let config = config::AppConfig::load()?;

    // 3. Initialize tracing/logging
    init_tracing(&config.logging);
    tracing::info!("Starting Octodash...");

    // 4. Validate configuration and initialize metrics
    config.validate()?;
    tracing::info!(
        public_url = %config.server.public_url,
        oauth_configured = config.github.credentials().is_ok(),
        "Configuration loaded"
    );
    octodash::metrics::init_metrics();

    // 5. Initialize application state
    let state = AppState::new(config.clone())?;

    // 6. Build Axum router
    let app = octodash::build_router(state);

    // 7. Start HTTP server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Public URL: {}", config.server.public_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Install the global subscriber
///
/// `RUST_LOG` overrides the configured level when set.
fn init_tracing(logging: &config::LoggingConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.filter_directives().into());

    if logging.is_json() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

/// Resolve on Ctrl-C
async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "Failed to listen for shutdown signal");
    }
}
