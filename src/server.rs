use crate::error::{MonitorError, Result};
use crate::monitoring::{HealthStatus, OperationMonitor};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::info;
use std::future::Future;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<OperationMonitor>,
}

/// GET /health: full report; critical maps to 503 so load balancers can react
pub async fn get_health(State(state): State<AppState>) -> Response {
    let report = state.monitor.health();
    let code = match report.status {
        HealthStatus::Critical => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Warning => StatusCode::OK,
    };
    (code, Json(report)).into_response()
}

pub async fn get_metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.monitor.metrics())
}

pub async fn get_operations(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.monitor.active_operations())
}

pub async fn reset_metrics(State(state): State<AppState>) -> impl IntoResponse {
    state.monitor.reset_metrics();
    StatusCode::NO_CONTENT
}

pub fn create_router(monitor: Arc<OperationMonitor>) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/metrics", get(get_metrics))
        .route("/metrics/reset", post(reset_metrics))
        .route("/operations", get(get_operations))
        .with_state(AppState { monitor })
}

/// Serve the health routes on `listener` until `shutdown` resolves
pub async fn serve<S>(
    monitor: Arc<OperationMonitor>,
    listener: TcpListener,
    shutdown: S,
) -> Result<()>
where
    S: Future<Output = ()>,
{
    let addr: SocketAddr = listener.local_addr()?;
    listener.set_nonblocking(true)?;

    info!("Health endpoint listening on http://{}", addr);

    axum::Server::from_tcp(listener)
        .map_err(|e| MonitorError::Server(e.to_string()))?
        .serve(create_router(monitor).into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| MonitorError::Server(e.to_string()))
}
