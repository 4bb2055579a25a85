//! Fan-out over balancer replicas.

use std::fmt;
use std::sync::Arc;
use url::Url;

use crate::load_balancer::{Balancer, BalancerError};

/// Several balancers kept in sync as replicas of one pool.
///
/// Mutations are applied to every replica in order and stop at the first
/// failure. Replicas mutated before the failure keep the change; the caller
/// reconciles on the next attempt.
#[derive(Clone, Default)]
pub struct Balancers(Vec<Arc<dyn Balancer>>);

impl Balancers {
    pub fn new(replicas: Vec<Arc<dyn Balancer>>) -> Self {
        Self(replicas)
    }
}

impl fmt::Debug for Balancers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Balancers")
            .field("replicas", &self.0.len())
            .finish()
    }
}

impl Balancer for Balancers {
    /// Members of the first replica.
    fn servers(&self) -> Vec<Url> {
        self.0.first().map(|b| b.servers()).unwrap_or_default()
    }

    fn upsert_server(&self, url: &Url, weight: u32) -> Result<(), BalancerError> {
        for replica in &self.0 {
            replica.upsert_server(url, weight)?;
        }
        Ok(())
    }

    fn remove_server(&self, url: &Url) -> Result<(), BalancerError> {
        for replica in &self.0 {
            replica.remove_server(url)?;
        }
        Ok(())
    }

    fn server_weight(&self, url: &Url) -> Option<u32> {
        self.0.first().and_then(|b| b.server_weight(url))
    }
}
