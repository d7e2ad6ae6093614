//! Metadata search handler.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use opused_core::Metadata;

use super::ApiError;
use crate::state::AppState;

/// Query parameters for metadata search
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub title: String,
    /// Bangumi access token
    pub token: Option<String>,
}

/// Resolve an anime title into song candidates
pub async fn search_metadata(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Metadata>>, ApiError> {
    let results = state
        .orchestrator()
        .search_metadata(&params.title, params.token.as_deref())
        .await?;
    Ok(Json(results))
}
