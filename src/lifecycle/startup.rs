//! Startup orchestration.
//!
//! # Responsibilities
//! - Turn a validated [`HealthConfig`] into balancers and backend configs
//! - Seed every balancer with the configured servers
//! - Attach each pool to its status table in [`Services`]
//!
//! # Design Decisions
//! - Fail fast: any invalid pool aborts the whole build
//! - Pools start with every server enabled; the first tick sorts them
//! - On reload, servers a pool already knew to be sick stay out of the new
//!   balancer until they pass a check
//! - Status tables are keyed by the server address as configured

use std::collections::HashMap;
use std::sync::Arc;

use url::Url;

use crate::config::{BackendPoolConfig, HealthConfig};
use crate::health::{BackendConfig, HealthCheckError, Options};
use crate::load_balancer::{Balancer, BalancerError, RoundRobin, StatusUpdater};
use crate::runtime::Services;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("backend {backend}: invalid server URL {url:?}: {source}")]
    InvalidServerUrl {
        backend: String,
        url: String,
        source: url::ParseError,
    },

    #[error("backend {backend}: {source}")]
    Balancer {
        backend: String,
        source: BalancerError,
    },

    #[error("backend {backend}: {source}")]
    HealthCheck {
        backend: String,
        source: HealthCheckError,
    },
}

/// Build one health-checked backend per configured pool.
pub fn build_backends(
    config: &HealthConfig,
    services: &Services,
) -> Result<HashMap<String, Arc<BackendConfig>>, StartupError> {
    rebuild_backends(config, services, &HashMap::new())
}

/// Like [`build_backends`], carrying over the sick servers of the
/// same-named pools in `previous`.
pub fn rebuild_backends(
    config: &HealthConfig,
    services: &Services,
    previous: &HashMap<String, Arc<BackendConfig>>,
) -> Result<HashMap<String, Arc<BackendConfig>>, StartupError> {
    let mut backends = HashMap::with_capacity(config.backends.len());

    for pool in &config.backends {
        let sick: Vec<Url> = previous
            .get(&pool.name)
            .map(|backend| {
                backend
                    .disabled_servers()
                    .into_iter()
                    .map(|server| server.url)
                    .collect()
            })
            .unwrap_or_default();
        let backend = build_backend(pool, services, &sick)?;
        tracing::info!(
            backend = %pool.name,
            servers = pool.servers.len(),
            mode = %pool.health_check.mode,
            "Backend pool configured"
        );
        backends.insert(pool.name.clone(), Arc::new(backend));
    }

    Ok(backends)
}

fn build_backend(
    pool: &BackendPoolConfig,
    services: &Services,
    sick: &[Url],
) -> Result<BackendConfig, StartupError> {
    let lb = StatusUpdater::new(RoundRobin::new(), services.service(&pool.name), true);
    let mut disabled = Vec::new();
    for server in &pool.servers {
        let url = Url::parse(&server.url).map_err(|source| StartupError::InvalidServerUrl {
            backend: pool.name.clone(),
            url: server.url.clone(),
            source,
        })?;
        lb.set_address(&url, server.url.as_str());
        if sick.contains(&url) {
            disabled.push((url, server.weight));
            continue;
        }
        lb.upsert_server(&url, server.weight)
            .map_err(|source| StartupError::Balancer {
                backend: pool.name.clone(),
                source,
            })?;
    }

    let name = pool.name.clone();
    lb.register_status_updater(move |up| {
        if up {
            tracing::info!(backend = %name, "Backend pool has healthy servers");
        } else {
            tracing::warn!(backend = %name, "Backend pool has no healthy server");
        }
    })
    .map_err(|source| StartupError::Balancer {
        backend: pool.name.clone(),
        source,
    })?;

    let options = Options::from_config(&pool.health_check, Arc::new(lb));

    let backend =
        BackendConfig::new(options, pool.name.clone()).map_err(|source| StartupError::HealthCheck {
            backend: pool.name.clone(),
            source,
        })?;
    for (url, weight) in disabled {
        tracing::debug!(backend = %pool.name, server = %url, "Keeping server disabled");
        backend.disable_server(url, weight);
    }
    Ok(backend)
}
