//! HTTP ingest gateway — receives trigger events from the web layer and
//! exposes audit reads over the action store.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use taskdeck_core::error::TaskDeckError;
use taskdeck_core::types::{TaskAssigned, TaskSnapshot, TaskState};
use taskdeck_db::ProjectDb;
use taskdeck_scheduler::{ActionStore, ReminderWorkflow};

/// Shared state for the ingest gateway.
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<ReminderWorkflow>,
    pub store: Arc<ActionStore>,
    pub directory: Arc<ProjectDb>,
}

/// Bind and serve until ctrl-c.
pub async fn serve(
    workflow: Arc<ReminderWorkflow>,
    store: Arc<ActionStore>,
    directory: Arc<ProjectDb>,
    host: &str,
    port: u16,
) -> anyhow::Result<()> {
    let state = Arc::new(AppState {
        workflow,
        store,
        directory,
    });

    let app = Router::new()
        .route("/api/health", get(health_check))
        .route("/api/events/task-assigned", post(task_assigned))
        .route("/api/actions", get(recent_actions))
        .route("/api/tasks", put(upsert_task))
        .route("/api/tasks/{id}/state", post(set_task_state))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    tracing::info!("🌐 Ingest gateway listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    tracing::info!("🛑 Shutdown signal received");
}

/// Health check endpoint.
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "taskdeck",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Trigger event: a task was assigned. Sends the assignment email and
/// schedules the due-date recheck. Reminder-scheduling problems never fail
/// this request; a failed assignment email reports the transport error.
async fn task_assigned(
    State(state): State<Arc<AppState>>,
    Json(event): Json<TaskAssigned>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.workflow.on_task_assigned(&event).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "ok": true }))),
        Err(e @ TaskDeckError::Delivery(_)) => (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({ "ok": false, "error": e.to_string() })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "ok": false, "error": e.to_string() })),
        ),
    }
}

/// Audit view: recent delayed actions, newest first.
async fn recent_actions(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.store.recent(50) {
        Ok(actions) => (
            StatusCode::OK,
            Json(serde_json::json!({ "actions": actions })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "ok": false, "error": e.to_string() })),
        ),
    }
}

/// Mirror a task row from the upstream data layer (idempotent upsert, so
/// out-of-order create/update deliveries converge to the same row).
async fn upsert_task(
    State(state): State<Arc<AppState>>,
    Json(task): Json<TaskSnapshot>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.directory.upsert_task(&task) {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "ok": true }))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "ok": false, "error": e.to_string() })),
        ),
    }
}

#[derive(Deserialize)]
struct StateChange {
    state: TaskState,
}

/// Mirror a task state change (e.g. completion before the due date).
async fn set_task_state(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(change): Json<StateChange>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.directory.set_task_state(&id, change.state) {
        Ok(true) => (StatusCode::OK, Json(serde_json::json!({ "ok": true }))),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "ok": false, "error": "task not found" })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "ok": false, "error": e.to_string() })),
        ),
    }
}
