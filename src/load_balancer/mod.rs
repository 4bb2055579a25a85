//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Health check tick
//!     → Balancer::upsert_server / Balancer::remove_server
//!         - status.rs (mirror membership into the runtime status table)
//!         - fanout.rs (apply to every replica of the pool)
//!         - round_robin.rs (server set read by the traffic path)
//! ```
//!
//! # Design Decisions
//! - The contract is synchronous: membership changes are in-memory
//! - Every balancer owns its locking; callers never hold a balancer lock
//! - Removing an absent server succeeds
//! - Upserting an existing server updates its weight

pub mod fanout;
pub mod round_robin;
pub mod status;

use std::sync::Arc;
use url::Url;

pub use fanout::Balancers;
pub use round_robin::RoundRobin;
pub use status::StatusUpdater;

/// Weight given to a server when none was recorded.
pub const DEFAULT_WEIGHT: u32 = 1;

/// Errors returned by balancer mutations.
#[derive(Debug, thiserror::Error)]
pub enum BalancerError {
    #[error("invalid weight {weight} for server {url}")]
    InvalidWeight { url: Url, weight: u32 },

    #[error("status updaters can only be registered on health checked services")]
    HealthCheckDisabled,

    #[error("balancer rejected {url}: {reason}")]
    Rejected { url: Url, reason: String },
}

/// The capability the health-check engine drives.
pub trait Balancer: Send + Sync {
    /// Current members, in no particular order.
    fn servers(&self) -> Vec<Url>;

    /// Add `url` with `weight`, or update the weight of an existing member.
    fn upsert_server(&self, url: &Url, weight: u32) -> Result<(), BalancerError>;

    /// Remove `url`. Absent servers are not an error.
    fn remove_server(&self, url: &Url) -> Result<(), BalancerError>;

    /// Weight of a current member, for balancers that track one.
    fn server_weight(&self, _url: &Url) -> Option<u32> {
        None
    }
}

impl<B: Balancer + ?Sized> Balancer for Arc<B> {
    fn servers(&self) -> Vec<Url> {
        (**self).servers()
    }

    fn upsert_server(&self, url: &Url, weight: u32) -> Result<(), BalancerError> {
        (**self).upsert_server(url, weight)
    }

    fn remove_server(&self, url: &Url) -> Result<(), BalancerError> {
        (**self).remove_server(url)
    }

    fn server_weight(&self, url: &Url) -> Option<u32> {
        (**self).server_weight(url)
    }
}
