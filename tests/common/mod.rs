//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use proxy_healthcheck::load_balancer::{Balancer, BalancerError};
use proxy_healthcheck::observability::ServerUpGauge;
use reqwest::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_stream::wrappers::TcpListenerStream;
use tokio_stream::Stream;
use tonic::{Request, Response, Status};
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_server::{Health, HealthServer};
use tonic_health::pb::{HealthCheckRequest, HealthCheckResponse};
use url::Url;

/// Requests seen by a mock backend.
#[derive(Clone, Default)]
pub struct Hits {
    count: Arc<AtomicUsize>,
    heads: Arc<Mutex<Vec<String>>>,
}

impl Hits {
    pub fn get(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Request line and headers of every HTTP request, in arrival order.
    pub fn heads(&self) -> Vec<String> {
        self.heads.lock().unwrap().clone()
    }

    fn next(&self) -> usize {
        self.count.fetch_add(1, Ordering::SeqCst)
    }

    fn record(&self, head: String) {
        self.heads.lock().unwrap().push(head);
    }
}

fn scripted<T: Copy>(script: &[T], index: usize) -> T {
    script[index.min(script.len() - 1)]
}

/// Start an HTTP backend answering the scripted statuses in order, then
/// repeating the last one. `location` is sent with every response.
pub async fn start_http_backend(
    statuses: Vec<u16>,
    location: Option<String>,
) -> (SocketAddr, Hits) {
    assert!(!statuses.is_empty());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Hits::default();

    let counter = hits.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let status = scripted(&statuses, counter.next());
            let location = location.clone();
            tokio::spawn(respond(socket, status, location, counter.clone()));
        }
    });

    (addr, hits)
}

async fn respond(mut socket: TcpStream, status: u16, location: Option<String>, hits: Hits) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }
    hits.record(String::from_utf8_lossy(&request).into_owned());

    let reason = StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown");
    let location = location
        .map(|l| format!("Location: {l}\r\n"))
        .unwrap_or_default();
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\n{location}Content-Length: 0\r\nConnection: close\r\n\r\n"
    );

    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// gRPC health service answering the scripted statuses in order, then
/// repeating the last one. An empty script answers `UNIMPLEMENTED`.
struct ScriptedHealth {
    statuses: Vec<ServingStatus>,
    hits: Hits,
}

type WatchStream = Pin<Box<dyn Stream<Item = Result<HealthCheckResponse, Status>> + Send>>;

#[tonic::async_trait]
impl Health for ScriptedHealth {
    async fn check(
        &self,
        _request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        let index = self.hits.next();
        if self.statuses.is_empty() {
            return Err(Status::unimplemented("health service disabled"));
        }
        Ok(Response::new(HealthCheckResponse {
            status: scripted(&self.statuses, index) as i32,
        }))
    }

    type WatchStream = WatchStream;

    async fn watch(
        &self,
        _request: Request<HealthCheckRequest>,
    ) -> Result<Response<Self::WatchStream>, Status> {
        Err(Status::unimplemented("watch"))
    }
}

pub async fn start_grpc_backend(statuses: Vec<ServingStatus>) -> (SocketAddr, Hits) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Hits::default();

    let service = ScriptedHealth {
        statuses,
        hits: hits.clone(),
    };
    tokio::spawn(async move {
        let _ = tonic::transport::Server::builder()
            .add_service(HealthServer::new(service))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await;
    });

    (addr, hits)
}

pub fn server_url(addr: SocketAddr) -> Url {
    Url::parse(&format!("http://{addr}")).unwrap()
}

#[derive(Default)]
struct LbState {
    servers: Vec<Url>,
    weights: Vec<u32>,
    num_removed: usize,
    num_upserted: usize,
}

/// Balancer recording every membership change.
#[derive(Default)]
pub struct TestLoadBalancer {
    state: RwLock<LbState>,
}

impl TestLoadBalancer {
    pub fn with_servers(servers: Vec<Url>) -> Self {
        let lb = Self::default();
        lb.state.write().unwrap().servers = servers;
        lb
    }

    pub fn num_removed(&self) -> usize {
        self.state.read().unwrap().num_removed
    }

    pub fn num_upserted(&self) -> usize {
        self.state.read().unwrap().num_upserted
    }

    /// Weights passed to every upsert so far.
    pub fn weights(&self) -> Vec<u32> {
        self.state.read().unwrap().weights.clone()
    }
}

impl Balancer for TestLoadBalancer {
    fn servers(&self) -> Vec<Url> {
        self.state.read().unwrap().servers.clone()
    }

    fn upsert_server(&self, url: &Url, weight: u32) -> Result<(), BalancerError> {
        let mut state = self.state.write().unwrap();
        state.num_upserted += 1;
        state.servers.push(url.clone());
        state.weights.push(weight);
        Ok(())
    }

    fn remove_server(&self, url: &Url) -> Result<(), BalancerError> {
        let mut state = self.state.write().unwrap();
        state.num_removed += 1;
        state.servers.retain(|s| s != url);
        Ok(())
    }
}

/// Keeps the last value written and how many writes happened.
#[derive(Default)]
pub struct CollectingGauge {
    inner: Mutex<(f64, usize)>,
}

impl CollectingGauge {
    pub fn value(&self) -> f64 {
        self.inner.lock().unwrap().0
    }

    pub fn sets(&self) -> usize {
        self.inner.lock().unwrap().1
    }
}

impl ServerUpGauge for CollectingGauge {
    fn set(&self, _backend: &str, value: f64) {
        let mut inner = self.inner.lock().unwrap();
        inner.0 = value;
        inner.1 += 1;
    }
}

/// Poll `condition` every 10ms, panicking after `timeout`.
pub async fn wait_until<F>(timeout: Duration, mut condition: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(timeout, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met in time");
}
