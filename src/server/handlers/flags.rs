use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct FlagQuery {
    pub limit: Option<i64>,
}

/// Most recent flagged questions, newest first.
pub async fn list_flags(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FlagQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let records = state.flags.list_recent(limit).await?;
    Ok(Json(json!({ "flags": records })))
}
