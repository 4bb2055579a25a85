//! End-to-end health check loops against real HTTP and gRPC backends.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::{
    server_url, start_grpc_backend, start_http_backend, wait_until, CollectingGauge,
    TestLoadBalancer,
};
use proxy_healthcheck::health::{BackendConfig, HealthCheck, Options, ProbeMode};
use proxy_healthcheck::load_balancer::Balancer;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tonic_health::pb::health_check_response::ServingStatus;
use url::Url;

const INTERVAL: Duration = Duration::from_millis(200);
const TIMEOUT: Duration = Duration::from_millis(100);
const DEADLINE: Duration = Duration::from_secs(5);

fn options(lb: Arc<TestLoadBalancer>, mode: ProbeMode) -> Options {
    let mut options = Options::new(lb);
    options.mode = mode;
    options.path = "/path".to_string();
    options.interval = INTERVAL;
    options.timeout = TIMEOUT;
    options.follow_redirects = false;
    options
}

struct Outcome {
    removed: usize,
    upserted: usize,
    gauge: f64,
    lb: Arc<TestLoadBalancer>,
}

/// Run the loop on a single server until `ticks` checks have completed.
async fn run_checks(
    server: Url,
    options: Options,
    lb: Arc<TestLoadBalancer>,
    start_healthy: bool,
    ticks: usize,
) -> Outcome {
    if start_healthy {
        lb.upsert_server(&server, 1).unwrap();
    }
    let seeded = lb.num_upserted();

    let backend = Arc::new(BackendConfig::new(options, "backendName").unwrap());
    if !start_healthy {
        backend.disable_server(server, 1);
    }

    let gauge = Arc::new(CollectingGauge::default());
    let check = HealthCheck::new(gauge.clone());
    let token = CancellationToken::new();

    let handle = tokio::spawn({
        let token = token.clone();
        async move { check.execute(token, backend).await }
    });

    wait_until(DEADLINE, || gauge.sets() >= ticks).await;
    token.cancel();
    handle.await.unwrap();

    Outcome {
        removed: lb.num_removed(),
        upserted: lb.num_upserted() - seeded,
        gauge: gauge.value(),
        lb,
    }
}

async fn run_http(statuses: Vec<u16>, start_healthy: bool) -> Outcome {
    let ticks = statuses.len();
    let (addr, _) = start_http_backend(statuses, None).await;
    let lb = Arc::new(TestLoadBalancer::default());
    run_checks(
        server_url(addr),
        options(lb.clone(), ProbeMode::Http),
        lb,
        start_healthy,
        ticks,
    )
    .await
}

async fn run_grpc(statuses: Vec<ServingStatus>, start_healthy: bool) -> Outcome {
    let ticks = statuses.len().max(1);
    let (addr, _) = start_grpc_backend(statuses).await;
    let lb = Arc::new(TestLoadBalancer::default());
    run_checks(
        server_url(addr),
        options(lb.clone(), ProbeMode::Grpc),
        lb,
        start_healthy,
        ticks,
    )
    .await
}

fn assert_outcome(outcome: &Outcome, removed: usize, upserted: usize, gauge: f64) {
    assert_eq!(outcome.removed, removed, "removed servers");
    assert_eq!(outcome.upserted, upserted, "upserted servers");
    assert_eq!(outcome.gauge, gauge, "server up gauge");
}

#[tokio::test]
async fn test_healthy_server_staying_healthy() {
    let outcome = run_http(vec![200], true).await;
    assert_outcome(&outcome, 0, 0, 1.0);
}

#[tokio::test]
async fn test_healthy_server_staying_healthy_no_content() {
    let outcome = run_http(vec![204], true).await;
    assert_outcome(&outcome, 0, 0, 1.0);
}

#[tokio::test]
async fn test_healthy_server_staying_healthy_permanent_redirect() {
    let outcome = run_http(vec![308], true).await;
    assert_outcome(&outcome, 0, 0, 1.0);
}

#[tokio::test]
async fn test_healthy_server_becoming_sick() {
    let outcome = run_http(vec![503], true).await;
    assert_outcome(&outcome, 1, 0, 0.0);
    assert!(outcome.lb.servers().is_empty());
}

#[tokio::test]
async fn test_sick_server_becoming_healthy() {
    let outcome = run_http(vec![200], false).await;
    assert_outcome(&outcome, 0, 1, 1.0);
    assert_eq!(outcome.lb.weights(), vec![1]);
}

#[tokio::test]
async fn test_sick_server_staying_sick() {
    let outcome = run_http(vec![503], false).await;
    assert_outcome(&outcome, 0, 0, 0.0);
}

#[tokio::test]
async fn test_healthy_server_toggling_to_sick_and_back() {
    let outcome = run_http(vec![503, 200], true).await;
    assert_outcome(&outcome, 1, 1, 1.0);
}

#[tokio::test]
async fn test_grpc_healthy_server_staying_healthy() {
    let outcome = run_grpc(vec![ServingStatus::Serving], true).await;
    assert_outcome(&outcome, 0, 0, 1.0);
}

#[tokio::test]
async fn test_grpc_healthy_server_becoming_sick() {
    let outcome = run_grpc(vec![ServingStatus::NotServing], true).await;
    assert_outcome(&outcome, 1, 0, 0.0);
}

#[tokio::test]
async fn test_grpc_sick_server_becoming_healthy() {
    let outcome = run_grpc(vec![ServingStatus::Serving], false).await;
    assert_outcome(&outcome, 0, 1, 1.0);
}

#[tokio::test]
async fn test_grpc_sick_server_staying_sick() {
    let outcome = run_grpc(vec![ServingStatus::NotServing], false).await;
    assert_outcome(&outcome, 0, 0, 0.0);
}

#[tokio::test]
async fn test_grpc_healthy_server_toggling_to_sick_and_back() {
    let outcome = run_grpc(vec![ServingStatus::NotServing, ServingStatus::Serving], true).await;
    assert_outcome(&outcome, 1, 1, 1.0);
}

#[tokio::test]
async fn test_grpc_unimplemented_is_sick() {
    let outcome = run_grpc(vec![], true).await;
    assert_outcome(&outcome, 1, 0, 0.0);
}

#[tokio::test]
async fn test_unresponsive_server_is_sick() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let lb = Arc::new(TestLoadBalancer::default());
    let outcome = run_checks(
        server_url(addr),
        options(lb.clone(), ProbeMode::Http),
        lb,
        true,
        1,
    )
    .await;

    assert_outcome(&outcome, 1, 0, 0.0);
}

#[tokio::test]
async fn test_unbuildable_request_removes_server() {
    let (addr, hits) = start_http_backend(vec![200], None).await;
    let lb = Arc::new(TestLoadBalancer::default());
    let mut opts = options(lb.clone(), ProbeMode::Http);
    // http cannot be switched to a non-special scheme.
    opts.scheme = "foo".to_string();

    let outcome = run_checks(server_url(addr), opts, lb, true, 1).await;

    assert_outcome(&outcome, 1, 0, 0.0);
    assert_eq!(hits.get(), 0);
}

#[tokio::test]
async fn test_request_options_reach_backend() {
    let (addr, hits) = start_http_backend(vec![200], None).await;
    let lb = Arc::new(TestLoadBalancer::default());
    let mut opts = options(lb.clone(), ProbeMode::Http);
    opts.hostname = "myhost".to_string();
    opts.headers
        .insert("Custom-Header".to_string(), "foo".to_string());
    opts.method = "HEAD".to_string();

    let outcome = run_checks(server_url(addr), opts, lb, true, 1).await;
    assert_outcome(&outcome, 0, 0, 1.0);

    let head = hits.heads()[0].to_ascii_lowercase();
    assert!(head.starts_with("head /path http/1.1\r\n"), "{head}");
    assert!(head.contains("\r\nhost: myhost\r\n"), "{head}");
    assert!(head.contains("\r\ncustom-header: foo\r\n"), "{head}");
}

#[tokio::test]
async fn test_default_request_uses_server_host() {
    let (addr, hits) = start_http_backend(vec![200], None).await;
    let lb = Arc::new(TestLoadBalancer::default());

    run_checks(
        server_url(addr),
        options(lb.clone(), ProbeMode::Http),
        lb,
        true,
        1,
    )
    .await;

    let head = hits.heads()[0].to_ascii_lowercase();
    assert!(head.starts_with("get /path http/1.1\r\n"), "{head}");
    assert!(head.contains(&format!("\r\nhost: {addr}\r\n")), "{head}");
    assert!(!head.contains("custom-header"), "{head}");
}

#[test]
fn test_malformed_path_rejected_at_setup() {
    for path in [":", "/%zz", "1:x", "/a\x7fb"] {
        let mut opts = options(Arc::new(TestLoadBalancer::default()), ProbeMode::Http);
        opts.path = path.to_string();
        assert!(
            BackendConfig::new(opts, "backendName").is_err(),
            "path {path:?} accepted"
        );
    }
}

#[tokio::test]
async fn test_redirect_not_followed() {
    let (target, target_hits) = start_http_backend(vec![200], None).await;
    let (addr, hits) =
        start_http_backend(vec![303], Some(server_url(target).to_string())).await;
    let lb = Arc::new(TestLoadBalancer::default());

    let outcome = run_checks(
        server_url(addr),
        options(lb.clone(), ProbeMode::Http),
        lb,
        true,
        1,
    )
    .await;

    assert_outcome(&outcome, 0, 0, 1.0);
    assert!(hits.get() >= 1);
    assert_eq!(target_hits.get(), 0, "redirect must not be followed");
}

#[tokio::test]
async fn test_redirect_followed_to_sick_target() {
    let (target, target_hits) = start_http_backend(vec![503], None).await;
    let (addr, _) = start_http_backend(vec![303], Some(server_url(target).to_string())).await;
    let lb = Arc::new(TestLoadBalancer::default());
    let mut opts = options(lb.clone(), ProbeMode::Http);
    opts.follow_redirects = true;

    let outcome = run_checks(server_url(addr), opts, lb, true, 1).await;

    assert_outcome(&outcome, 1, 0, 0.0);
    assert!(target_hits.get() >= 1);
}

#[tokio::test]
async fn test_set_backends_configuration_replaces_loops() {
    let (first_addr, first_hits) = start_http_backend(vec![200], None).await;
    let (second_addr, second_hits) = start_http_backend(vec![200], None).await;

    let backend = |addr| {
        let lb = Arc::new(TestLoadBalancer::with_servers(vec![server_url(addr)]));
        Arc::new(BackendConfig::new(options(lb.clone(), ProbeMode::Http), "backendName").unwrap())
    };

    let gauge = Arc::new(CollectingGauge::default());
    let check = HealthCheck::new(gauge.clone());
    let root = CancellationToken::new();

    check.set_backends_configuration(
        &root,
        HashMap::from([("first".to_string(), backend(first_addr))]),
    );
    wait_until(DEADLINE, || first_hits.get() >= 1).await;

    check.set_backends_configuration(
        &root,
        HashMap::from([("second".to_string(), backend(second_addr))]),
    );
    assert!(check.backends().contains_key("second"));
    assert!(!check.backends().contains_key("first"));
    wait_until(DEADLINE, || second_hits.get() >= 2).await;

    tokio::time::sleep(TIMEOUT).await;
    let frozen = first_hits.get();
    tokio::time::sleep(INTERVAL * 3).await;
    assert_eq!(first_hits.get(), frozen, "replaced loop kept probing");

    root.cancel();
    tokio::time::timeout(DEADLINE, check.stop())
        .await
        .expect("loops did not stop");
}

#[tokio::test]
async fn test_stop_halts_probing() {
    let (addr, hits) = start_http_backend(vec![200], None).await;
    let lb = Arc::new(TestLoadBalancer::with_servers(vec![server_url(addr)]));
    let backend = Arc::new(
        BackendConfig::new(options(lb.clone(), ProbeMode::Http), "backendName").unwrap(),
    );

    let check = HealthCheck::new(Arc::new(CollectingGauge::default()));
    check.set_backends_configuration(
        &CancellationToken::new(),
        HashMap::from([("backendName".to_string(), backend)]),
    );
    wait_until(DEADLINE, || hits.get() >= 1).await;

    tokio::time::timeout(DEADLINE, check.stop())
        .await
        .expect("loops did not stop");

    let frozen = hits.get();
    tokio::time::sleep(INTERVAL * 2).await;
    assert_eq!(hits.get(), frozen);
    assert_eq!(lb.num_removed(), 0);
}
