//! API layer
//!
//! HTTP handlers for:
//! - Signed-in pages
//! - Metrics (Prometheus)

pub mod metrics;
mod pages;

pub use metrics::metrics_router;
pub use pages::pages_router;
