//! Per-pool health check state.
//!
//! # Responsibilities
//! - Build probe requests for a server from the pool's [`Options`]
//! - Hold the servers currently excluded from the balancer, with the weight
//!   they had when they were removed

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use tokio::time;
use url::Url;

use crate::health::error::{HealthCheckError, ProbeError};
use crate::health::options::Options;
use crate::health::probe::{self, authority, HealthProbe, ProbeRequest};

/// A server out of the balancer because its last probe failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisabledServer {
    pub url: Url,
    pub weight: u32,
}

/// Health check configuration and state of one backend pool.
pub struct BackendConfig {
    name: String,
    options: Options,
    method: Method,
    headers: HeaderMap,
    prober: Arc<dyn HealthProbe>,
    disabled: RwLock<BTreeMap<Url, u32>>,
}

impl BackendConfig {
    /// Validate `options` and select the probe for its mode.
    pub fn new(options: Options, name: impl Into<String>) -> Result<Self, HealthCheckError> {
        let prober = probe::for_options(&options)?;
        Self::with_probe(options, name, prober)
    }

    /// Like [`BackendConfig::new`] with a caller-supplied probe.
    pub fn with_probe(
        options: Options,
        name: impl Into<String>,
        prober: Arc<dyn HealthProbe>,
    ) -> Result<Self, HealthCheckError> {
        if options.interval.is_zero() {
            return Err(HealthCheckError::ZeroDuration("interval"));
        }
        if options.timeout.is_zero() {
            return Err(HealthCheckError::ZeroDuration("timeout"));
        }

        validate_path(&options.path).map_err(|reason| HealthCheckError::InvalidPath {
            path: options.path.clone(),
            reason: reason.to_string(),
        })?;

        let method = if options.method.is_empty() {
            Method::GET
        } else {
            Method::from_bytes(options.method.as_bytes())
                .map_err(|_| HealthCheckError::InvalidMethod(options.method.clone()))?
        };

        if !options.hostname.is_empty() && HeaderValue::from_str(&options.hostname).is_err() {
            return Err(HealthCheckError::InvalidHostname(options.hostname.clone()));
        }

        let mut headers = HeaderMap::with_capacity(options.headers.len());
        for (name, value) in &options.headers {
            let invalid = || HealthCheckError::InvalidHeader { name: name.clone() };
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            headers.insert(header_name, header_value);
        }

        Ok(Self {
            name: name.into(),
            options,
            method,
            headers,
            prober,
            disabled: RwLock::new(BTreeMap::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Snapshot of the servers currently out of the balancer.
    pub fn disabled_servers(&self) -> Vec<DisabledServer> {
        self.disabled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(url, weight)| DisabledServer {
                url: url.clone(),
                weight: *weight,
            })
            .collect()
    }

    /// Mark `url` as sick. Used to seed the initial state.
    pub fn disable_server(&self, url: Url, weight: u32) {
        self.disabled
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url, weight);
    }

    pub(crate) fn replace_disabled(&self, disabled: BTreeMap<Url, u32>) {
        *self.disabled.write().unwrap_or_else(PoisonError::into_inner) = disabled;
    }

    /// Build the probe URL for `server`: path (with query), then scheme
    /// override, then port override.
    pub fn new_request(&self, server: &Url) -> Result<ProbeRequest, HealthCheckError> {
        let mut url = resolve_path(server, &self.options.path)?;

        if !self.options.scheme.is_empty() {
            url.set_scheme(&self.options.scheme)
                .map_err(|()| HealthCheckError::InvalidScheme(self.options.scheme.clone()))?;
        }

        if self.options.port != 0 {
            url.set_port(Some(self.options.port))
                .map_err(|()| HealthCheckError::InvalidPort(url.to_string()))?;
        }

        Ok(ProbeRequest {
            host: authority(&url),
            url,
            method: Method::GET,
            headers: HeaderMap::new(),
            follow_redirects: true,
        })
    }

    /// Apply hostname override, custom headers, method and redirect policy.
    pub fn set_request_options(&self, mut request: ProbeRequest) -> ProbeRequest {
        if !self.options.hostname.is_empty() {
            request.host = self.options.hostname.clone();
        }
        for (name, value) in &self.headers {
            request.headers.insert(name.clone(), value.clone());
        }
        request.method = self.method.clone();
        request.follow_redirects = self.options.follow_redirects;
        request
    }

    /// Probe `server` once, bounded by the configured timeout.
    pub async fn check_health(&self, server: &Url) -> Result<(), ProbeError> {
        let request = self.set_request_options(self.new_request(server)?);

        match time::timeout(self.options.timeout, self.prober.probe(&request)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(self.options.timeout)),
        }
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("disabled", &self.disabled_servers())
            .finish()
    }
}

fn resolve_path(server: &Url, path: &str) -> Result<Url, HealthCheckError> {
    let invalid = |reason: String| HealthCheckError::InvalidPath {
        path: path.to_string(),
        reason,
    };

    validate_path(path).map_err(|reason| invalid(reason.to_string()))?;
    server.join(path).map_err(|e| invalid(e.to_string()))
}

/// Check that `path` is a well-formed URL reference.
///
/// Rejects control characters, malformed `%XX` escapes and a colon in the
/// first segment unless it ends a valid scheme.
pub(crate) fn validate_path(path: &str) -> Result<(), &'static str> {
    if path.chars().any(char::is_control) {
        return Err("invalid control character in URL");
    }

    let bytes = path.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'%'
            && !matches!(
                (bytes.get(i + 1), bytes.get(i + 2)),
                (Some(hi), Some(lo)) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit()
            )
        {
            return Err("invalid URL escape");
        }
    }

    let first_segment = path.split(['/', '?', '#']).next().unwrap_or_default();
    if let Some((scheme, _)) = first_segment.split_once(':') {
        if scheme.is_empty() {
            return Err("missing protocol scheme");
        }
        let mut chars = scheme.chars();
        let valid_scheme = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !valid_scheme {
            return Err("first path segment in URL cannot contain colon");
        }
    }

    Ok(())
}
