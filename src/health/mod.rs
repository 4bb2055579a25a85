//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! HealthCheck (engine.rs), one loop per backend pool:
//!     Periodic timer
//!     → BackendConfig builds the probe request (backend.rs)
//!     → HTTP or gRPC probe (probe/)
//!     → Upsert/remove on the pool's balancer
//!     → Ratio gauge
//! ```
//!
//! # Design Decisions
//! - A single failed probe removes a server; a single pass restores it
//! - The balancer owns healthy servers; the backend owns sick ones
//! - Health state is per-server, reported per-pool

pub mod backend;
pub mod engine;
pub mod error;
pub mod options;
pub mod probe;

pub use backend::{BackendConfig, DisabledServer};
pub use engine::HealthCheck;
pub use error::{HealthCheckError, ProbeError};
pub use options::{Options, ProbeMode};
