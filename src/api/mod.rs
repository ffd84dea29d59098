//! HTTP surface over a [`DispatcherHandle`].
//!
//! | Route                   | Purpose                                   |
//! |-------------------------|-------------------------------------------|
//! | `POST /request`         | submit one task                           |
//! | `GET /status`           | scheduler snapshot for the dashboard      |
//! | `POST /load`            | bulk-generate random tasks                |
//! | `POST /admin/scheduler` | policy change (validated, never applied)  |
//! | `GET /health`           | liveness                                  |

use std::net::SocketAddr;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::error::{Result, SchedulerError};
use crate::scheduler::{DispatcherHandle, LoadRequest, StatusSnapshot, TaskSpec};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitTaskResponse {
    task_id: Uuid,
}

#[derive(Serialize)]
struct LoadResponse {
    queued: usize,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ChangeSchedulerRequest {
    scheduler: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl SchedulerError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            SchedulerError::QueueFull { .. } => (StatusCode::SERVICE_UNAVAILABLE, "queue-full"),
            SchedulerError::PolicyChangeNotSupported(_) => (
                StatusCode::NOT_IMPLEMENTED,
                "change-scheduler-not-implemented-dynamically",
            ),
            SchedulerError::InvalidPolicy(_) => (StatusCode::BAD_REQUEST, "invalid-scheduler"),
            SchedulerError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid-request"),
            SchedulerError::Unavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "scheduler-unavailable")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal-error"),
        }
    }
}

impl IntoResponse for SchedulerError {
    fn into_response(self) -> Response {
        let (status, error) = self.status_and_code();
        (
            status,
            Json(ErrorResponse {
                error,
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// An empty body means "all defaults", the same as `{}`.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| SchedulerError::InvalidRequest(e.to_string()))
}

pub fn router(handle: DispatcherHandle) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/request", post(submit_handler))
        .route("/status", get(status_handler))
        .route("/load", post(load_handler))
        .route("/admin/scheduler", post(change_scheduler_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(handle)
}

/// Serve the API until `shutdown` is cancelled.
pub async fn serve(
    addr: SocketAddr,
    handle: DispatcherHandle,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Starting HTTP server");

    axum::serve(listener, router(handle))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

async fn submit_handler(
    State(handle): State<DispatcherHandle>,
    body: Bytes,
) -> Result<Json<SubmitTaskResponse>> {
    let spec: TaskSpec = parse_body(&body)?;
    let task_id = handle.submit(spec).await?;
    Ok(Json(SubmitTaskResponse { task_id }))
}

async fn status_handler(State(handle): State<DispatcherHandle>) -> Result<Json<StatusSnapshot>> {
    Ok(Json(handle.status().await?))
}

async fn load_handler(
    State(handle): State<DispatcherHandle>,
    body: Bytes,
) -> Result<Json<LoadResponse>> {
    let request: LoadRequest = parse_body(&body)?;
    let queued = handle.bulk_load(request).await?;
    Ok(Json(LoadResponse { queued }))
}

async fn change_scheduler_handler(
    State(handle): State<DispatcherHandle>,
    body: Bytes,
) -> Result<StatusCode> {
    let request: ChangeSchedulerRequest = parse_body(&body)?;
    let requested = request
        .scheduler
        .ok_or_else(|| SchedulerError::InvalidPolicy(String::new()))?;
    handle.change_policy(requested).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
