//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the health
//! checker. All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::health::ProbeMode;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HealthConfig {
    /// Backend pools to health check.
    pub backends: Vec<BackendPoolConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin status API.
    pub admin: AdminConfig,
}

/// One backend pool and the servers it starts with.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendPoolConfig {
    /// Unique pool identifier, used as the `service` metric label.
    pub name: String,

    /// Servers placed in the balancer at startup.
    #[serde(default)]
    pub servers: Vec<ServerConfig>,

    /// Probe settings for the pool.
    #[serde(default)]
    pub health_check: HealthCheckConfig,
}

/// A server of a pool.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server URL (e.g., "http://10.0.0.1:8080").
    pub url: String,

    /// Weight for weighted load balancing (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Probe protocol.
    pub mode: ProbeMode,

    /// Path to probe, optionally with a query string.
    pub path: String,

    /// Port override; 0 keeps the server's own port.
    pub port: u16,

    /// Scheme override; empty keeps the server's scheme.
    pub scheme: String,

    /// Host header override; empty uses the probed host.
    pub hostname: String,

    /// HTTP method; empty means GET.
    pub method: String,

    /// Extra request headers.
    pub headers: BTreeMap<String, String>,

    /// Time between two checks in milliseconds.
    pub interval_ms: u64,

    /// Time allowed for a single probe in milliseconds.
    pub timeout_ms: u64,

    /// Follow HTTP redirects returned by the probed server.
    pub follow_redirects: bool,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            mode: ProbeMode::Http,
            path: "/health".to_string(),
            port: 0,
            scheme: String::new(),
            hostname: String::new(),
            method: String::new(),
            headers: BTreeMap::new(),
            interval_ms: 30_000,
            timeout_ms: 5_000,
            follow_redirects: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin status API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// Bearer token; empty disables authentication.
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
