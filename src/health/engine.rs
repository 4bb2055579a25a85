//! Active health checking.
//!
//! # Responsibilities
//! - Run one periodic loop per backend pool
//! - Probe every known server of the pool concurrently on each tick
//! - Move servers in and out of the balancer based on the results
//! - Publish the share of healthy servers per pool
//!
//! # State Machine
//! ```text
//! healthy (in balancer)  --probe fails-->   sick (disabled set)
//! sick (disabled set)    --probe passes-->  healthy (in balancer)
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::health::backend::BackendConfig;
use crate::health::error::ProbeError;
use crate::load_balancer::DEFAULT_WEIGHT;
use crate::observability::metrics::{self, ServerUpGauge};

/// Registry of backend pools and the loops checking them.
#[derive(Clone)]
pub struct HealthCheck {
    backends: Arc<ArcSwap<HashMap<String, Arc<BackendConfig>>>>,
    gauge: Arc<dyn ServerUpGauge>,
    running: Arc<Mutex<Option<Running>>>,
}

struct Running {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl HealthCheck {
    pub fn new(gauge: Arc<dyn ServerUpGauge>) -> Self {
        Self {
            backends: Arc::new(ArcSwap::from_pointee(HashMap::new())),
            gauge,
            running: Arc::new(Mutex::new(None)),
        }
    }

    /// Pools currently registered.
    pub fn backends(&self) -> Arc<HashMap<String, Arc<BackendConfig>>> {
        self.backends.load_full()
    }

    /// Replace the registry and restart checking.
    ///
    /// Loops started by a previous call are cancelled. New loops stop when
    /// `parent` is cancelled or on the next call.
    pub fn set_backends_configuration(
        &self,
        parent: &CancellationToken,
        backends: HashMap<String, Arc<BackendConfig>>,
    ) {
        let token = parent.child_token();
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);

        let mut tasks = Vec::with_capacity(backends.len());
        if let Some(previous) = running.take() {
            previous.token.cancel();
            tasks.extend(previous.tasks.into_iter().filter(|t| !t.is_finished()));
        }

        self.backends.store(Arc::new(backends));

        for backend in self.backends.load().values() {
            tracing::info!(
                backend = %backend.name(),
                options = %backend.options(),
                "Starting health check"
            );
            let checker = self.clone();
            let backend = backend.clone();
            let token = token.clone();
            tasks.push(tokio::spawn(async move {
                checker.execute(token, backend).await;
            }));
        }

        *running = Some(Running { token, tasks });
    }

    /// Cancel every loop and wait for them to exit.
    pub async fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(running) = running {
            running.token.cancel();
            for task in running.tasks {
                if let Err(e) = task.await {
                    tracing::error!(error = %e, "Health check task failed");
                }
            }
        }
    }

    /// Check `backend` now and then once per interval until `cancel` fires.
    pub async fn execute(&self, cancel: CancellationToken, backend: Arc<BackendConfig>) {
        tracing::debug!(backend = %backend.name(), "Initial health check");

        // The first tick completes immediately.
        let mut ticker = time::interval(backend.options().interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // Cancellation drops in-flight probes; the apply phase has no
            // await point, so a tick is applied entirely or not at all.
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.check_servers_health(&backend) => {}
            }
        }

        tracing::debug!(backend = %backend.name(), "Health check stopped");
    }

    /// Run one tick for `backend`.
    pub async fn check_servers_health(&self, backend: &BackendConfig) {
        let name = backend.name();
        let lb = &backend.options().lb;

        let enabled = lb.servers();
        let disabled = backend.disabled_servers();

        let (disabled_results, enabled_results) = tokio::join!(
            join_all(disabled.iter().map(|s| backend.check_health(&s.url))),
            join_all(enabled.iter().map(|url| backend.check_health(url))),
        );

        let mut still_disabled = BTreeMap::new();
        let mut healthy = 0usize;

        for (server, result) in disabled.into_iter().zip(disabled_results) {
            match result {
                Ok(()) => {
                    tracing::warn!(
                        backend = %name,
                        url = %server.url,
                        weight = server.weight,
                        "Health check up: returning to server list"
                    );
                    match lb.upsert_server(&server.url, server.weight) {
                        Ok(()) => healthy += 1,
                        Err(e) => {
                            tracing::error!(
                                backend = %name,
                                url = %server.url,
                                error = %e,
                                "Failed to return server to the balancer"
                            );
                            still_disabled.insert(server.url.clone(), server.weight);
                        }
                    }
                    metrics::record_server_up(name, server.url.as_str(), true);
                }
                Err(reason) => {
                    log_probe_failure(name, &server.url, &reason, "Health check still failing");
                    metrics::record_server_up(name, server.url.as_str(), false);
                    still_disabled.insert(server.url, server.weight);
                }
            }
        }

        for (url, result) in enabled.into_iter().zip(enabled_results) {
            match result {
                Ok(()) => {
                    healthy += 1;
                    metrics::record_server_up(name, url.as_str(), true);
                }
                Err(reason) => {
                    let weight = lb.server_weight(&url).unwrap_or(DEFAULT_WEIGHT);
                    log_probe_failure(
                        name,
                        &url,
                        &reason,
                        "Health check failed, removing from server list",
                    );
                    match lb.remove_server(&url) {
                        Ok(()) => {
                            still_disabled.insert(url.clone(), weight);
                        }
                        Err(e) => {
                            // Still in the balancer; retried next tick.
                            tracing::error!(
                                backend = %name,
                                url = %url,
                                error = %e,
                                "Failed to remove server from the balancer"
                            );
                            healthy += 1;
                        }
                    }
                    metrics::record_server_up(name, url.as_str(), false);
                }
            }
        }

        let total = healthy + still_disabled.len();
        backend.replace_disabled(still_disabled);

        let ratio = if total == 0 {
            0.0
        } else {
            healthy as f64 / total as f64
        };
        self.gauge.set(name, ratio);
    }
}

fn log_probe_failure(backend: &str, url: &Url, reason: &ProbeError, message: &str) {
    if reason.is_construction() {
        tracing::error!(backend = %backend, url = %url, reason = %reason, "{}", message);
    } else {
        tracing::warn!(backend = %backend, url = %url, reason = %reason, "{}", message);
    }
}
