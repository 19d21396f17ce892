//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Auth Metrics
    pub static ref LOGIN_ATTEMPTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("octodash_login_attempts_total", "Total number of OAuth callbacks processed"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref LOGOUTS_TOTAL: IntCounter = IntCounter::new(
        "octodash_logouts_total",
        "Total number of logouts"
    ).expect("metric can be created");
    pub static ref ACTIVE_SESSIONS: IntGauge = IntGauge::new(
        "octodash_active_sessions",
        "Current number of in-memory browser sessions"
    ).expect("metric can be created");

    // Provider Metrics
    pub static ref PROVIDER_REQUEST_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "octodash_provider_request_duration_seconds",
            "GitHub API request duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["endpoint", "status"]
    ).expect("metric can be created");

    // Dashboard Metrics
    pub static ref DEMO_DATA_REFRESHES_TOTAL: IntCounter = IntCounter::new(
        "octodash_demo_data_refreshes_total",
        "Total number of times demo data was regenerated"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("octodash_errors_total", "Total number of error responses"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(LOGIN_ATTEMPTS_TOTAL.clone()))
            .expect("LOGIN_ATTEMPTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(LOGOUTS_TOTAL.clone()))
            .expect("LOGOUTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ACTIVE_SESSIONS.clone()))
            .expect("ACTIVE_SESSIONS can be registered");
        REGISTRY
            .register(Box::new(PROVIDER_REQUEST_DURATION_SECONDS.clone()))
            .expect("PROVIDER_REQUEST_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(DEMO_DATA_REFRESHES_TOTAL.clone()))
            .expect("DEMO_DATA_REFRESHES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}
