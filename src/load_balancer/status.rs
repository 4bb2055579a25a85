//! Balancer decorator that mirrors membership into the runtime status table.
//!
//! # Responsibilities
//! - Record `UP` after every successful upsert, `DOWN` after every removal
//! - Notify registered parents when the pool as a whole goes up or down

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use url::Url;

use crate::load_balancer::{Balancer, BalancerError};
use crate::runtime::{ServerStatus, ServiceInfo};

type StatusCallback = Box<dyn Fn(bool) + Send + Sync>;

/// Wraps a balancer and keeps a [`ServiceInfo`] in sync with its members.
pub struct StatusUpdater<B = Arc<dyn Balancer>> {
    inner: B,
    service_info: Arc<ServiceInfo>,
    wants_health_check: bool,
    updaters: RwLock<Vec<StatusCallback>>,
    addresses: RwLock<HashMap<Url, String>>,
}

impl<B: Balancer> StatusUpdater<B> {
    pub fn new(inner: B, service_info: Arc<ServiceInfo>, wants_health_check: bool) -> Self {
        Self {
            inner,
            service_info,
            wants_health_check,
            updaters: RwLock::new(Vec::new()),
            addresses: RwLock::new(HashMap::new()),
        }
    }

    /// The decorated balancer, for weight/option introspection.
    pub fn inner(&self) -> &B {
        &self.inner
    }

    pub fn service_info(&self) -> &Arc<ServiceInfo> {
        &self.service_info
    }

    /// Register `callback`, called with `true` when the pool gains its first
    /// server and with `false` when it loses its last one.
    pub fn register_status_updater<F>(&self, callback: F) -> Result<(), BalancerError>
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        if !self.wants_health_check {
            return Err(BalancerError::HealthCheckDisabled);
        }
        self.updaters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(callback));
        Ok(())
    }

    /// Record `url` in the status table under `address`, the server as it
    /// was written in the configuration, instead of its normalized form.
    pub fn set_address(&self, url: &Url, address: impl Into<String>) {
        self.addresses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.clone(), address.into());
    }

    fn status_key(&self, url: &Url) -> String {
        self.addresses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.to_string())
    }

    fn notify(&self, up: bool) {
        let updaters = self.updaters.read().unwrap_or_else(PoisonError::into_inner);
        for updater in updaters.iter() {
            updater(up);
        }
    }
}

impl<B: Balancer> Balancer for StatusUpdater<B> {
    fn servers(&self) -> Vec<Url> {
        self.inner.servers()
    }

    fn upsert_server(&self, url: &Url, weight: u32) -> Result<(), BalancerError> {
        let up_before = !self.inner.servers().is_empty();
        self.inner.upsert_server(url, weight)?;
        self.service_info
            .update_server_status(&self.status_key(url), ServerStatus::Up);

        if !up_before {
            tracing::debug!(url = %url, "Pool has a server again, notifying parents");
            self.notify(true);
        }
        Ok(())
    }

    fn remove_server(&self, url: &Url) -> Result<(), BalancerError> {
        let up_before = !self.inner.servers().is_empty();
        self.inner.remove_server(url)?;
        self.service_info
            .update_server_status(&self.status_key(url), ServerStatus::Down);

        if up_before && self.inner.servers().is_empty() {
            tracing::debug!(url = %url, "Pool has no server left, notifying parents");
            self.notify(false);
        }
        Ok(())
    }

    fn server_weight(&self, url: &Url) -> Option<u32> {
        self.inner.server_weight(url)
    }
}
