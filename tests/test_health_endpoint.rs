//! HTTP health surface tests
//!
//! Spin up the axum router on an ephemeral port and query it with reqwest,
//! the way the dashboard's system-health widget does.

use smm_panel_monitor::monitoring::FixedMemoryProbe;
use smm_panel_monitor::{server, MonitorConfig, OperationMonitor};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use tokio::sync::oneshot;

struct TestServer {
    addr: SocketAddr,
    monitor: Arc<OperationMonitor>,
    probe: Arc<FixedMemoryProbe>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

fn start_server(max_concurrency: usize) -> TestServer {
    let probe = Arc::new(FixedMemoryProbe::with_ratio(0.3));
    let config = MonitorConfig {
        max_concurrency,
        ..MonitorConfig::default()
    };
    let monitor = Arc::new(OperationMonitor::with_memory_probe(config, probe.clone()));

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    let served = monitor.clone();
    tokio::spawn(async move {
        server::serve(served, listener, async {
            let _ = rx.await;
        })
        .await
        .unwrap();
    });

    TestServer {
        addr,
        monitor,
        probe,
        shutdown: Some(tx),
    }
}

#[tokio::test]
async fn test_health_endpoint_reports_status() {
    let server = start_server(10);
    server.monitor.try_admit("order-1", "bulk-order-sync", 25);

    let response = reqwest::get(server.url("/health")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["metrics"]["totalOperations"], 1);
    assert_eq!(body["activeOperations"][0]["id"], "order-1");
    assert_eq!(body["activeOperations"][0]["itemCount"], 25);
}

#[tokio::test]
async fn test_critical_health_is_service_unavailable() {
    let server = start_server(10);
    server.probe.set_ratio(0.95);

    let response = reqwest::get(server.url("/health")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "critical");
    assert_eq!(body["recommendations"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_metrics_and_reset_endpoints() {
    let server = start_server(10);
    server.monitor.try_admit("a", "provider-refill", 1);
    server.monitor.try_admit("b", "provider-refill", 1);
    server.monitor.complete("a", 1);

    let metrics: serde_json::Value = reqwest::get(server.url("/metrics"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(metrics["totalOperations"], 2);
    assert_eq!(metrics["successfulOperations"], 1);

    let operations: serde_json::Value = reqwest::get(server.url("/operations"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(operations.as_array().unwrap().len(), 1);
    assert_eq!(operations[0]["id"], "b");

    let response = reqwest::Client::new()
        .post(server.url("/metrics/reset"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);

    let after = server.monitor.metrics();
    assert_eq!(after.total_operations, 0);
    assert_eq!(after.current_concurrency, 1);
}
