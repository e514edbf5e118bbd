//! Server side of the relay backend.
//!
//! Clients that keep no log of their own (`RelayLogStore`) forward every
//! operation here; this server applies it to a local backend.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use apilog_core::{CallLog, ConfigError, LogBackend, LogRecord};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::info;

/// Path of the log collection.
pub const LOGS_PATH: &str = "/api/logs";

/// Build the relay routes over `backend`.
///
/// A relay backed by another relay could forward in a loop, so that is
/// rejected.
pub fn router(backend: Arc<dyn LogBackend>) -> Result<Router, ConfigError> {
    if backend.name() == "relay" {
        return Err(ConfigError::Invalid(
            "relay server needs a local backend, not another relay".into(),
        ));
    }
    let log = CallLog::new(backend);
    Ok(Router::new()
        .route(LOGS_PATH, get(list_logs).post(append_log).delete(clear_logs))
        .route("/health", get(health))
        .with_state(log))
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn serve(
    addr: SocketAddr,
    backend: Arc<dyn LogBackend>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_on(listener, backend, shutdown).await
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve_on(
    listener: TcpListener,
    backend: Arc<dyn LogBackend>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = router(backend)?;
    info!(addr = %listener.local_addr()?, "relay listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn list_logs(State(log): State<CallLog>) -> Json<Vec<LogRecord>> {
    Json(log.list().await)
}

async fn append_log(State(log): State<CallLog>, Json(record): Json<LogRecord>) -> Response {
    let outcome = log.append_record(&record).await;
    if outcome.is_stored() {
        Json(json!({ "success": true })).into_response()
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to save log" })),
        )
            .into_response()
    }
}

async fn clear_logs(State(log): State<CallLog>) -> Response {
    let outcome = log.clear().await;
    if outcome.is_stored() {
        Json(json!({ "success": true })).into_response()
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to clear logs" })),
        )
            .into_response()
    }
}
