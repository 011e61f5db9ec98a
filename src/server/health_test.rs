//! End-to-end tests for the health endpoints

use super::*;
use crate::config::ServiceSpec;
use crate::probe::supervisor::MockSupervisor;
use crate::probe::{Aggregator, StatusCache, SystemClock, TcpPortProber};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

struct TestServer {
    addr: SocketAddr,
    client: reqwest::Client,
    supervisor: Arc<MockSupervisor>,
    _controller: ShutdownController,
    // Stands in for the monitored backend; kept open so its port accepts
    _backend: TcpListener,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn request(&self, method: reqwest::Method, path: &str) -> reqwest::Response {
        self.client
            .request(method, self.url(path))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .expect("Failed to reach sentinel")
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.request(reqwest::Method::GET, path).await
    }
}

/// Start a sentinel monitoring one "backend" service whose port is open
async fn start_server(online: &[&str]) -> TestServer {
    let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend_port = backend.local_addr().unwrap().port();

    let supervisor = Arc::new(MockSupervisor::new(online));
    let aggregator = Aggregator::new(
        vec![ServiceSpec::new("backend", "backend", "127.0.0.1", backend_port)],
        supervisor.clone(),
        Arc::new(TcpPortProber),
        Duration::from_millis(1200),
        Arc::new(SystemClock),
    );
    let cache = Arc::new(StatusCache::new(
        aggregator,
        Arc::new(SystemClock),
        Duration::from_millis(5000),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (controller, signal) = shutdown_channel();
    tokio::spawn(serve(listener, cache, signal));

    TestServer {
        addr,
        client: reqwest::Client::builder().no_proxy().build().unwrap(),
        supervisor,
        _controller: controller,
        _backend: backend,
    }
}

fn header<'a>(response: &'a reqwest::Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

fn assert_no_cache_headers(response: &reqwest::Response) {
    assert_eq!(
        header(response, "cache-control"),
        Some("no-store, no-cache, must-revalidate, proxy-revalidate")
    );
    assert_eq!(header(response, "pragma"), Some("no-cache"));
    assert_eq!(header(response, "expires"), Some("0"));
}

fn assert_cors_headers(response: &reqwest::Response) {
    assert_eq!(header(response, "access-control-allow-origin"), Some("*"));
    assert_eq!(
        header(response, "access-control-allow-methods"),
        Some("GET,HEAD,OPTIONS")
    );
    assert_eq!(
        header(response, "access-control-allow-headers"),
        Some("Content-Type")
    );
    assert_eq!(header(response, "access-control-max-age"), Some("300"));
}

#[tokio::test]
async fn test_health_returns_204_when_healthy() {
    let server = start_server(&["backend"]).await;

    let response = server.get("/health").await;

    assert_eq!(response.status(), 204);
    assert_cors_headers(&response);
    assert_no_cache_headers(&response);
    assert!(response.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_health_returns_403_when_supervisor_reports_offline() {
    let server = start_server(&[]).await;

    let response = server.get("/health").await;

    assert_eq!(response.status(), 403);
    assert_cors_headers(&response);
    assert_no_cache_headers(&response);
    assert_eq!(header(&response, "content-type"), Some("application/json"));
    assert_eq!(response.text().await.unwrap(), r#"{"ok":false}"#);
}

#[tokio::test]
async fn test_health_head_uses_status_code_only() {
    let server = start_server(&["backend"]).await;

    let response = server.request(reqwest::Method::HEAD, "/health").await;
    assert_eq!(response.status(), 204);
}

#[tokio::test]
async fn test_health_matches_by_prefix() {
    let server = start_server(&["backend"]).await;

    assert_eq!(server.get("/healthz").await.status(), 204);
    assert_eq!(server.get("/health/deep?x=1").await.status(), 204);
}

#[tokio::test]
async fn test_options_preflight_skips_probing() {
    let server = start_server(&[]).await;

    let response = server.request(reqwest::Method::OPTIONS, "/health").await;

    assert_eq!(response.status(), 204);
    assert_cors_headers(&response);
    assert_eq!(server.supervisor.calls(), 0, "preflight must not probe");
}

#[tokio::test]
async fn test_options_preflight_on_pixel_path_skips_cache() {
    let server = start_server(&[]).await;

    let response = server
        .request(reqwest::Method::OPTIONS, "/health-pixel")
        .await;

    assert_eq!(response.status(), 204);
    assert_cors_headers(&response);
    assert_no_cache_headers(&response);
    assert!(response.bytes().await.unwrap().is_empty());
    assert_eq!(server.supervisor.calls(), 0, "preflight must not query the supervisor");
}

#[tokio::test]
async fn test_options_outside_health_prefix_returns_404() {
    let server = start_server(&[]).await;

    let response = server.request(reqwest::Method::OPTIONS, "/other").await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_pixel_returns_gif_when_healthy() {
    let server = start_server(&["backend"]).await;

    let response = server.get("/health-pixel").await;

    assert_eq!(response.status(), 200);
    assert_eq!(header(&response, "content-type"), Some("image/gif"));
    assert_no_cache_headers(&response);
    assert!(header(&response, "access-control-allow-origin").is_none());
    assert_eq!(response.bytes().await.unwrap().as_ref(), PIXEL_GIF);
}

#[tokio::test]
async fn test_pixel_returns_503_when_unhealthy() {
    let server = start_server(&[]).await;

    let response = server.get("/health-pixel?t=123").await;

    assert_eq!(response.status(), 503);
    assert!(response.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_path_returns_404() {
    let server = start_server(&["backend"]).await;

    let response = server.get("/unknown-path").await;

    assert_eq!(response.status(), 404);
    assert!(response.bytes().await.unwrap().is_empty());
    assert_eq!(server.supervisor.calls(), 0);
}

#[tokio::test]
async fn test_endpoints_share_cached_status() {
    let server = start_server(&["backend"]).await;

    assert_eq!(server.get("/health").await.status(), 204);
    assert_eq!(server.get("/health-pixel").await.status(), 200);
    assert_eq!(server.get("/health").await.status(), 204);

    assert_eq!(server.supervisor.calls(), 1);
}

#[tokio::test]
async fn test_server_stops_on_shutdown() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let aggregator = Aggregator::new(
        vec![],
        Arc::new(MockSupervisor::new(&[])),
        Arc::new(TcpPortProber),
        Duration::from_millis(1200),
        Arc::new(SystemClock),
    );
    let cache = Arc::new(StatusCache::new(
        aggregator,
        Arc::new(SystemClock),
        Duration::from_millis(5000),
    ));
    let (controller, signal) = shutdown_channel();
    let handle = tokio::spawn(serve(listener, cache, signal));

    controller.shutdown();

    let result = tokio::time::timeout(Duration::from_secs(2), handle).await;
    assert!(matches!(result, Ok(Ok(Ok(())))), "server should exit cleanly");
}

#[test]
fn test_pixel_matches_published_encoding() {
    use base64::Engine;

    let encoded = base64::engine::general_purpose::STANDARD.encode(PIXEL_GIF);
    assert_eq!(
        encoded,
        "R0lGODlhAQABAPAAAP///wAAACH5BAAAAAAALAAAAAABAAEAAAICRAEAOw=="
    );
}
