use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::{handlers, metadata, tasks};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Metadata
        .route("/metadata/search", get(metadata::search_metadata))
        // Tasks
        .route("/tasks", post(tasks::submit_task).get(tasks::list_tasks))
        .route("/tasks/batch", post(tasks::create_batch))
        .route("/tasks/history", get(tasks::list_history))
        .route("/tasks/{id}", get(tasks::get_task).delete(tasks::delete_task))
        .route("/tasks/{id}/start", post(tasks::start_task))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
