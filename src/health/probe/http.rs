//! HTTP probe.
//!
//! # Design Decisions
//! - 2xx is healthy
//! - 3xx is healthy only when redirects are not followed: the redirect
//!   response itself is the outcome and its target is never contacted
//! - Every other status, transport errors and timeouts are sick

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, HOST};
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};

use crate::health::error::{HealthCheckError, ProbeError};
use crate::health::probe::{authority, HealthProbe, ProbeRequest};

pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration, follow_redirects: bool) -> Result<Self, HealthCheckError> {
        let redirect = if follow_redirects {
            Policy::default()
        } else {
            Policy::none()
        };

        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect)
            .no_proxy()
            .user_agent("proxy-healthcheck")
            .build()
            .map_err(|e| HealthCheckError::Client(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self, request: &ProbeRequest) -> Result<(), ProbeError> {
        let mut req = reqwest::Request::new(request.method.clone(), request.url.clone());
        *req.headers_mut() = request.headers.clone();

        if request.host != authority(&request.url) {
            let host = HeaderValue::from_str(&request.host)
                .map_err(|_| HealthCheckError::InvalidHostname(request.host.clone()))?;
            req.headers_mut().insert(HOST, host);
        }

        let response = self.client.execute(req).await?;
        classify(response.status(), request.follow_redirects)
    }
}

pub(crate) fn classify(status: StatusCode, follow_redirects: bool) -> Result<(), ProbeError> {
    if status.is_success() || (status.is_redirection() && !follow_redirects) {
        Ok(())
    } else {
        Err(ProbeError::BadStatus(status))
    }
}
