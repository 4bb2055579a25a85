//! Weighted round-robin balancer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use url::Url;

use crate::load_balancer::{Balancer, BalancerError};

/// A member of a [`RoundRobin`] pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedServer {
    pub url: Url,
    pub weight: u32,
}

/// Round-robin selector over a weighted server list.
/// Stores an internal counter to rotate through servers; a server of weight
/// `n` is picked `n` times per rotation.
#[derive(Debug, Default)]
pub struct RoundRobin {
    servers: RwLock<Vec<WeightedServer>>,
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the next server for a request.
    pub fn next_server(&self) -> Option<Url> {
        let servers = self.servers.read().unwrap_or_else(PoisonError::into_inner);
        let total: u64 = servers.iter().map(|s| u64::from(s.weight)).sum();
        if total == 0 {
            return None;
        }

        let mut slot = self.counter.fetch_add(1, Ordering::Relaxed) as u64 % total;
        for server in servers.iter() {
            let weight = u64::from(server.weight);
            if slot < weight {
                return Some(server.url.clone());
            }
            slot -= weight;
        }
        None
    }

    /// Snapshot of members with their weights.
    pub fn weighted_servers(&self) -> Vec<WeightedServer> {
        self.servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Balancer for RoundRobin {
    fn servers(&self) -> Vec<Url> {
        self.servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|s| s.url.clone())
            .collect()
    }

    fn upsert_server(&self, url: &Url, weight: u32) -> Result<(), BalancerError> {
        if weight == 0 {
            return Err(BalancerError::InvalidWeight {
                url: url.clone(),
                weight,
            });
        }

        let mut servers = self.servers.write().unwrap_or_else(PoisonError::into_inner);
        match servers.iter_mut().find(|s| &s.url == url) {
            Some(existing) => existing.weight = weight,
            None => servers.push(WeightedServer {
                url: url.clone(),
                weight,
            }),
        }
        Ok(())
    }

    fn remove_server(&self, url: &Url) -> Result<(), BalancerError> {
        self.servers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|s| &s.url != url);
        Ok(())
    }

    fn server_weight(&self, url: &Url) -> Option<u32> {
        self.servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|s| &s.url == url)
            .map(|s| s.weight)
    }
}
