//! HTTP endpoints for maintenance-page and load-balancer polling
//!
//! - `/health*` - 204 when every service is healthy, 403 `{"ok":false}` otherwise
//! - `/health-pixel*` - 200 with a 1x1 GIF, or 503, for `<img>` probing
//!
//! `OPTIONS` on either prefix answers the CORS preflight without probing.
//!
//! Paths are matched by prefix; everything else is 404.

use crate::probe::StatusCache;
use crate::server::shutdown::ShutdownSignal;
use axum::{
    extract::State,
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, CACHE_CONTROL, CONTENT_TYPE,
            EXPIRES, PRAGMA,
        },
        HeaderName, Method, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

const HEALTH_PREFIX: &str = "/health";
const PIXEL_PREFIX: &str = "/health-pixel";

/// 1x1 transparent GIF
pub const PIXEL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0xf0, 0x00, 0x00, 0xff, 0xff,
    0xff, 0x00, 0x00, 0x00, 0x21, 0xf9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

const NO_CACHE_HEADERS: [(HeaderName, &str); 3] = [
    (
        CACHE_CONTROL,
        "no-store, no-cache, must-revalidate, proxy-revalidate",
    ),
    (PRAGMA, "no-cache"),
    (EXPIRES, "0"),
];

const CORS_HEADERS: [(HeaderName, &str); 4] = [
    (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (ACCESS_CONTROL_ALLOW_METHODS, "GET,HEAD,OPTIONS"),
    (ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
    (ACCESS_CONTROL_MAX_AGE, "300"),
];

/// Shared state for the health handlers
///
/// Every endpoint reads through the same cache, so `/health` and
/// `/health-pixel` never trigger separate probe cycles within a window.
#[derive(Clone)]
pub struct ServerState {
    cache: Arc<StatusCache>,
}

impl ServerState {
    /// Create server state around a shared status cache
    pub fn new(cache: Arc<StatusCache>) -> Self {
        Self { cache }
    }
}

/// Prefix dispatch
///
/// Preflight is answered for the whole `/health` prefix before the pixel
/// split; `/health-pixel` is tested before `/health` since it also starts
/// with `/health`.
async fn dispatch(State(state): State<ServerState>, method: Method, uri: Uri) -> Response {
    let path = uri.path();
    debug!(%method, %path, "request");

    if !path.starts_with(HEALTH_PREFIX) {
        return StatusCode::NOT_FOUND.into_response();
    }

    if method == Method::OPTIONS {
        preflight()
    } else if path.starts_with(PIXEL_PREFIX) {
        pixel(&state).await
    } else {
        health(&state).await
    }
}

/// CORS preflight: 204 without touching the cache
fn preflight() -> Response {
    (StatusCode::NO_CONTENT, CORS_HEADERS, NO_CACHE_HEADERS).into_response()
}

async fn health(state: &ServerState) -> Response {
    if state.cache.is_healthy().await {
        (StatusCode::NO_CONTENT, CORS_HEADERS, NO_CACHE_HEADERS).into_response()
    } else {
        (
            StatusCode::FORBIDDEN,
            CORS_HEADERS,
            NO_CACHE_HEADERS,
            Json(json!({ "ok": false })),
        )
            .into_response()
    }
}

async fn pixel(state: &ServerState) -> Response {
    if state.cache.is_healthy().await {
        (
            StatusCode::OK,
            [(CONTENT_TYPE, "image/gif")],
            NO_CACHE_HEADERS,
            PIXEL_GIF,
        )
            .into_response()
    } else {
        StatusCode::SERVICE_UNAVAILABLE.into_response()
    }
}

/// Build the router for the health endpoints
///
/// Matching is by path prefix, so a single fallback handler does the routing.
pub fn build_router(cache: Arc<StatusCache>) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(ServerState::new(cache))
}

/// Serve the health endpoints on an already-bound listener until `shutdown` fires
pub async fn serve(
    listener: TcpListener,
    cache: Arc<StatusCache>,
    mut shutdown: ShutdownSignal,
) -> Result<(), std::io::Error> {
    let app = build_router(cache);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
}

/// Bind `addr` and serve the health endpoints
pub async fn run_health_server(
    addr: SocketAddr,
    cache: Arc<StatusCache>,
    shutdown: ShutdownSignal,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "sentinel listening");

    serve(listener, cache, shutdown).await
}
