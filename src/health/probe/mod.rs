//! Protocol probes.
//!
//! # Responsibilities
//! - Execute one check against one server
//! - Classify the outcome as healthy (`Ok`) or sick (`Err`)
//!
//! # Design Decisions
//! - The probe variant is chosen once, when the backend is configured
//! - Probes never retry; the next tick is the retry
//! - The caller bounds every probe with the configured timeout

pub mod grpc;
pub mod http;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;
use url::Url;

use crate::health::error::{HealthCheckError, ProbeError};
use crate::health::options::{Options, ProbeMode};

pub use grpc::GrpcProbe;
pub use http::HttpProbe;

/// A fully built probe, ready to be sent.
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub url: Url,
    pub method: Method,
    /// Value of the Host header.
    pub host: String,
    pub headers: HeaderMap,
    pub follow_redirects: bool,
}

/// Checks one server.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, request: &ProbeRequest) -> Result<(), ProbeError>;
}

/// Build the probe matching `options.mode`.
pub fn for_options(options: &Options) -> Result<Arc<dyn HealthProbe>, HealthCheckError> {
    Ok(match options.mode {
        ProbeMode::Http => Arc::new(HttpProbe::new(options.timeout, options.follow_redirects)?),
        ProbeMode::Grpc => Arc::new(GrpcProbe::new(options.timeout)),
    })
}

/// `host[:port]` as written in `url`.
pub(crate) fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}
