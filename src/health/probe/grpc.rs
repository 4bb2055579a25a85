//! gRPC health protocol probe (`grpc.health.v1.Health/Check`).

use std::time::Duration;

use async_trait::async_trait;
use tonic::transport::Endpoint;
use tonic::Code;
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;

use crate::health::error::ProbeError;
use crate::health::probe::{HealthProbe, ProbeRequest};

/// Healthy only when the server answers `SERVING` for the empty service name.
pub struct GrpcProbe {
    timeout: Duration,
}

impl GrpcProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl HealthProbe for GrpcProbe {
    async fn probe(&self, request: &ProbeRequest) -> Result<(), ProbeError> {
        let url = &request.url;
        let target = format!(
            "{}://{}:{}",
            url.scheme(),
            url.host_str().unwrap_or_default(),
            url.port_or_known_default().unwrap_or(80),
        );

        let channel = Endpoint::from_shared(target)?
            .connect_timeout(self.timeout)
            .timeout(self.timeout)
            .connect()
            .await?;

        let response = HealthClient::new(channel)
            .check(HealthCheckRequest {
                service: String::new(),
            })
            .await
            .map_err(|status| match status.code() {
                Code::Unimplemented => ProbeError::GrpcUnimplemented,
                _ => ProbeError::GrpcStatus(Box::new(status)),
            })?;

        match response.into_inner().status() {
            ServingStatus::Serving => Ok(()),
            other => Err(ProbeError::NotServing(format!("{other:?}"))),
        }
    }
}
