//! Health checker runner.
//!
//! Loads the configuration, checks every configured backend pool and keeps
//! doing so across configuration reloads until SIGINT or SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use proxy_healthcheck::admin::{self, AdminState};
use proxy_healthcheck::config::{load_config, watcher::ConfigWatcher, HealthConfig};
use proxy_healthcheck::health::HealthCheck;
use proxy_healthcheck::lifecycle::{build_backends, rebuild_backends, Shutdown};
use proxy_healthcheck::observability::{logging, metrics, PrometheusGauge};
use proxy_healthcheck::runtime::Services;

#[derive(Parser)]
#[command(name = "proxy-healthcheck")]
#[command(about = "Active health checker for reverse proxy backend pools", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "healthcheck.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        backends = config.backends.len(),
        "proxy-healthcheck starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let services = Arc::new(Services::new());
    let health = HealthCheck::new(Arc::new(PrometheusGauge));

    health.set_backends_configuration(shutdown.token(), build_backends(&config, &services)?);

    let admin_task = if config.admin.enabled {
        Some(spawn_admin(&config, &health, &services, &shutdown).await?)
    } else {
        None
    };

    let (watcher, mut updates) = ConfigWatcher::new(&cli.config);
    let _watcher = match watcher.run() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Config hot reload disabled");
            None
        }
    };

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move { shutdown.wait_for_signal().await }
    });

    loop {
        tokio::select! {
            _ = shutdown.token().cancelled() => break,
            Some(new_config) = updates.recv() => {
                // Old loops must be gone before the new balancers take over.
                let previous = health.backends();
                health.stop().await;
                match rebuild_backends(&new_config, &services, &previous) {
                    Ok(backends) => {
                        tracing::info!(backends = backends.len(), "Applying new configuration");
                        health.set_backends_configuration(shutdown.token(), backends);
                    }
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            "Rejected new configuration, keeping current health checks"
                        );
                        health.set_backends_configuration(shutdown.token(), (*previous).clone());
                    }
                }
            }
        }
    }

    tracing::info!("Shutting down");
    health.stop().await;
    if let Some(task) = admin_task {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Admin server task failed");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn spawn_admin(
    config: &HealthConfig,
    health: &HealthCheck,
    services: &Arc<Services>,
    shutdown: &Shutdown,
) -> std::io::Result<tokio::task::JoinHandle<()>> {
    let listener = TcpListener::bind(&config.admin.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Admin API listening");

    let app = admin::router(AdminState {
        health: health.clone(),
        services: services.clone(),
        api_key: config.admin.api_key.as_str().into(),
    });
    let token = shutdown.subscribe();

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(token.cancelled_owned())
            .await
        {
            tracing::error!(error = %e, "Admin server error");
        }
    }))
}
