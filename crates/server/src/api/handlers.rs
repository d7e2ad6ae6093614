use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use opused_core::Config;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    /// Downloads currently running or queued for a slot.
    pub in_flight: usize,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "opused".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        in_flight: state.orchestrator().in_flight_count(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<Config> {
    Json(state.config().clone())
}
