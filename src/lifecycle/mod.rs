//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → Balancers → BackendConfigs → HealthCheck
//!
//! Shutdown (shutdown.rs):
//!     Root token cancelled → Health loops exit → Admin server drains
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{build_backends, rebuild_backends, StartupError};
