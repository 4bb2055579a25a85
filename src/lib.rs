//! Active health checking for reverse proxy backend pools.
//!
//! # Architecture Overview
//!
//! ```text
//!   config (TOML, hot reload)
//!        │
//!        ▼
//!   lifecycle::startup ──▶ load_balancer (RoundRobin + StatusUpdater)
//!        │                        ▲           │
//!        ▼                        │           ▼
//!   health::HealthCheck ──────────┘     runtime::Services ──▶ admin API
//!        │  probes (HTTP / gRPC)
//!        ▼
//!   observability (tracing, Prometheus gauges)
//! ```

pub mod admin;
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod runtime;

pub use config::schema::HealthConfig;
pub use health::HealthCheck;
pub use lifecycle::Shutdown;
