//! Per-pool probe options.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::HealthCheckConfig;
use crate::load_balancer::Balancer;

/// Protocol used to probe servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMode {
    #[default]
    Http,
    Grpc,
}

impl fmt::Display for ProbeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeMode::Http => f.write_str("http"),
            ProbeMode::Grpc => f.write_str("grpc"),
        }
    }
}

/// Immutable probe settings of one backend pool.
#[derive(Clone)]
pub struct Options {
    pub mode: ProbeMode,
    /// Resolved against each server URL; may carry a query string.
    pub path: String,
    /// 0 keeps the server's port.
    pub port: u16,
    /// Empty keeps the server's scheme.
    pub scheme: String,
    /// Empty sends the probed host.
    pub hostname: String,
    pub headers: BTreeMap<String, String>,
    /// Empty means GET.
    pub method: String,
    pub interval: Duration,
    pub timeout: Duration,
    pub follow_redirects: bool,
    /// Balancer whose membership the checks drive.
    pub lb: Arc<dyn Balancer>,
}

impl Options {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Defaults for `lb`: HTTP GET on `/`, 30s interval, 5s timeout.
    pub fn new(lb: Arc<dyn Balancer>) -> Self {
        Self {
            mode: ProbeMode::Http,
            path: "/".to_string(),
            port: 0,
            scheme: String::new(),
            hostname: String::new(),
            headers: BTreeMap::new(),
            method: String::new(),
            interval: Self::DEFAULT_INTERVAL,
            timeout: Self::DEFAULT_TIMEOUT,
            follow_redirects: true,
            lb,
        }
    }

    pub fn from_config(config: &HealthCheckConfig, lb: Arc<dyn Balancer>) -> Self {
        Self {
            mode: config.mode,
            path: config.path.clone(),
            port: config.port,
            scheme: config.scheme.clone(),
            hostname: config.hostname.clone(),
            headers: config.headers.clone(),
            method: config.method.clone(),
            interval: Duration::from_millis(config.interval_ms),
            timeout: Duration::from_millis(config.timeout_ms),
            follow_redirects: config.follow_redirects,
            lb,
        }
    }
}

impl fmt::Display for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[Hostname: {} Headers: {:?} Path: {} Method: {} Port: {} Interval: {:?} Timeout: {:?} FollowRedirects: {}]",
            self.hostname,
            self.headers,
            self.path,
            if self.method.is_empty() { "GET" } else { self.method.as_str() },
            self.port,
            self.interval,
            self.timeout,
            self.follow_redirects,
        )
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("mode", &self.mode)
            .field("path", &self.path)
            .field("port", &self.port)
            .field("scheme", &self.scheme)
            .field("hostname", &self.hostname)
            .field("headers", &self.headers)
            .field("method", &self.method)
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .field("follow_redirects", &self.follow_redirects)
            .finish_non_exhaustive()
    }
}
