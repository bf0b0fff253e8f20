//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Login Metrics
    pub static ref LOGINS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("oauthgate_logins_total", "Total number of login attempts by outcome"),
        &["provider", "outcome"]
    ).expect("metric can be created");
    pub static ref ACCOUNTS_CREATED_TOTAL: IntCounter = IntCounter::new(
        "oauthgate_accounts_created_total",
        "Total number of accounts created on first login"
    ).expect("metric can be created");
    pub static ref ACCOUNT_CONFLICTS_TOTAL: IntCounter = IntCounter::new(
        "oauthgate_account_conflicts_total",
        "Total number of first-login creation races recovered by re-fetching"
    ).expect("metric can be created");

    // Session Metrics
    pub static ref SESSIONS_PURGED_TOTAL: IntCounter = IntCounter::new(
        "oauthgate_sessions_purged_total",
        "Total number of expired session entries purged"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("oauthgate_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(LOGINS_TOTAL.clone()))
        .expect("LOGINS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ACCOUNTS_CREATED_TOTAL.clone()))
        .expect("ACCOUNTS_CREATED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ACCOUNT_CONFLICTS_TOTAL.clone()))
        .expect("ACCOUNT_CONFLICTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(SESSIONS_PURGED_TOTAL.clone()))
        .expect("SESSIONS_PURGED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}

/// Record the outcome of a login attempt.
pub fn record_login(provider: &str, outcome: &str) {
    LOGINS_TOTAL.with_label_values(&[provider, outcome]).inc();
}
