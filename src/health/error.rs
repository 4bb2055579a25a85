//! Health check error types.
//!
//! Construction errors point at a configuration defect; probe errors are the
//! normal signal that a server is sick. The two are kept apart so that logs
//! can tell a broken `path` from a broken server.

use std::time::Duration;

use reqwest::StatusCode;

/// The probe request could not be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HealthCheckError {
    #[error("invalid health check path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("invalid scheme override {0:?}")]
    InvalidScheme(String),

    #[error("cannot override port of {0}")]
    InvalidPort(String),

    #[error("invalid hostname override {0:?}")]
    InvalidHostname(String),

    #[error("invalid method {0:?}")]
    InvalidMethod(String),

    #[error("invalid header {name:?}")]
    InvalidHeader { name: String },

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("failed to build probe client: {0}")]
    Client(String),
}

/// A single probe did not report the server healthy.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error(transparent)]
    Construction(#[from] HealthCheckError),

    #[error("received error status code: {0}")]
    BadStatus(StatusCode),

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to connect to gRPC server: {0}")]
    GrpcConnect(#[from] tonic::transport::Error),

    #[error("gRPC server does not implement the health protocol")]
    GrpcUnimplemented,

    #[error("gRPC health check failed: {0}")]
    GrpcStatus(Box<tonic::Status>),

    #[error("received gRPC serving status: {0}")]
    NotServing(String),
}

impl ProbeError {
    /// True when the failure comes from configuration rather than the server.
    pub fn is_construction(&self) -> bool {
        matches!(self, ProbeError::Construction(_))
    }
}
