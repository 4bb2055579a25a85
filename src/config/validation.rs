//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (interval and timeout > 0, timeout < interval)
//! - Check server URLs, probe paths, methods and header names before any
//!   probe runs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: HealthConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;

use reqwest::header::HeaderName;
use reqwest::Method;
use url::Url;

use crate::config::schema::{BackendPoolConfig, HealthConfig};
use crate::health::backend::validate_path;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("backend pool name must not be empty")]
    EmptyBackendName,

    #[error("backend pool {0:?} is defined more than once")]
    DuplicateBackend(String),

    #[error("backend {backend:?}: invalid server URL {url:?}: {reason}")]
    InvalidServerUrl {
        backend: String,
        url: String,
        reason: String,
    },

    #[error("backend {backend:?}: server {url:?} has weight 0")]
    ZeroWeight { backend: String, url: String },

    #[error("backend {0:?}: interval must be greater than zero")]
    ZeroInterval(String),

    #[error("backend {0:?}: timeout must be greater than zero")]
    ZeroTimeout(String),

    #[error("backend {0:?}: timeout must be shorter than interval")]
    TimeoutNotBelowInterval(String),

    #[error("backend {backend:?}: invalid health check path {path:?}: {reason}")]
    InvalidPath {
        backend: String,
        path: String,
        reason: &'static str,
    },

    #[error("backend {backend:?}: invalid method {method:?}")]
    InvalidMethod { backend: String, method: String },

    #[error("backend {backend:?}: invalid header name {header:?}")]
    InvalidHeader { backend: String, header: String },
}

/// Check the whole configuration, collecting every error.
pub fn validate_config(config: &HealthConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for backend in &config.backends {
        if backend.name.is_empty() {
            errors.push(ValidationError::EmptyBackendName);
        } else if !seen.insert(backend.name.as_str()) {
            errors.push(ValidationError::DuplicateBackend(backend.name.clone()));
        }
        validate_backend(backend, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_backend(backend: &BackendPoolConfig, errors: &mut Vec<ValidationError>) {
    let name = &backend.name;

    for server in &backend.servers {
        if let Err(e) = Url::parse(&server.url) {
            errors.push(ValidationError::InvalidServerUrl {
                backend: name.clone(),
                url: server.url.clone(),
                reason: e.to_string(),
            });
        }
        if server.weight == 0 {
            errors.push(ValidationError::ZeroWeight {
                backend: name.clone(),
                url: server.url.clone(),
            });
        }
    }

    let hc = &backend.health_check;
    if hc.interval_ms == 0 {
        errors.push(ValidationError::ZeroInterval(name.clone()));
    }
    if hc.timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout(name.clone()));
    }
    if hc.interval_ms > 0 && hc.timeout_ms >= hc.interval_ms {
        errors.push(ValidationError::TimeoutNotBelowInterval(name.clone()));
    }

    if let Err(reason) = validate_path(&hc.path) {
        errors.push(ValidationError::InvalidPath {
            backend: name.clone(),
            path: hc.path.clone(),
            reason,
        });
    }

    if !hc.method.is_empty() && Method::from_bytes(hc.method.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidMethod {
            backend: name.clone(),
            method: hc.method.clone(),
        });
    }

    for header in hc.headers.keys() {
        if HeaderName::from_bytes(header.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidHeader {
                backend: name.clone(),
                header: header.clone(),
            });
        }
    }
}
