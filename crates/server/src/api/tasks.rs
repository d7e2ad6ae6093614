//! Task API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use opused_core::{BatchRequest, ExecutionMode, SubmitOutcome, Task, TaskSpec};

use super::ApiError;
use crate::state::AppState;

type TaskResult = Result<(StatusCode, Json<Task>), ApiError>;

/// Create a task and execute it.
///
/// Background mode answers `202 Accepted` with the task as dispatched;
/// inline mode answers `200 OK` with the terminal task.
pub async fn submit_task(
    State(state): State<Arc<AppState>>,
    Json(spec): Json<TaskSpec>,
) -> TaskResult {
    match state.orchestrator().submit(spec).await? {
        SubmitOutcome::Accepted(task) => Ok((StatusCode::ACCEPTED, Json(task))),
        SubmitOutcome::Finished { task, .. } => Ok((StatusCode::OK, Json(task))),
    }
}

/// Create pending tasks for every song of every title.
pub async fn create_batch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchRequest>,
) -> Result<(StatusCode, Json<Vec<Task>>), ApiError> {
    let tasks = state.orchestrator().create_batch(request).await?;
    Ok((StatusCode::CREATED, Json(tasks)))
}

/// Execute an existing task, retrying it if it already finished.
pub async fn start_task(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> TaskResult {
    let orchestrator = state.orchestrator();
    match orchestrator.mode() {
        ExecutionMode::Background => {
            let task = orchestrator.start(&id)?;
            Ok((StatusCode::ACCEPTED, Json(task)))
        }
        ExecutionMode::Inline => {
            let (task, _) = orchestrator.run(&id).await?;
            Ok((StatusCode::OK, Json(task)))
        }
    }
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(state.orchestrator().status(&id)?))
}

pub async fn list_tasks(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(state.orchestrator().list()?))
}

pub async fn list_history(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(state.orchestrator().history()?))
}

pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(state.orchestrator().delete(&id)?))
}
