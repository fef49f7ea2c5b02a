use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let indexed_chunks = state.index.get().map(|index| index.len()).unwrap_or(0);
    Json(json!({
        "status": "ok",
        "index_built": state.index.is_built(),
        "indexed_chunks": indexed_chunks,
        "sessions": state.sessions.len()
    }))
}
