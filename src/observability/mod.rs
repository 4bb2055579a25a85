//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Health check engine produces:
//!     → logging.rs (structured log events per transition)
//!     → metrics.rs (per-pool ratio gauge, per-server up gauge)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;

pub use metrics::{PrometheusGauge, ServerUpGauge};
