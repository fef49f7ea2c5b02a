use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::chat::{ConversationState, RatingCollector};
use crate::core::errors::ApiError;
use crate::state::sessions::SessionHandle;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitQuestionRequest {
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRatingRequest {
    pub index: usize,
    pub value: u8,
}

/// Transcript view used by every session endpoint. Rating buttons belong to
/// `rating_offer` only.
fn transcript(session_id: &str, session: &ConversationState) -> Value {
    let turns: Vec<Value> = session
        .turns()
        .iter()
        .enumerate()
        .map(|(index, turn)| {
            json!({
                "index": index,
                "role": turn.role(),
                "content": turn.content(),
                "rating": session.rating(index)
            })
        })
        .collect();

    json!({
        "id": session_id,
        "turns": turns,
        "rating_offer": RatingCollector::offered_index(session)
    })
}

fn with_fields(mut view: Value, fields: Value) -> Value {
    if let (Some(view_map), Value::Object(extra)) = (view.as_object_mut(), fields) {
        view_map.extend(extra);
    }
    view
}

fn lookup(state: &AppState, session_id: &str) -> Result<SessionHandle, ApiError> {
    state
        .sessions
        .get(session_id)
        .ok_or_else(|| ApiError::NotFound(format!("Session not found: {}", session_id)))
}

pub async fn create_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (session_id, handle) = state.sessions.create();
    let session = handle.lock().await;
    Json(transcript(&session_id, &session))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let handle = lookup(&state, &session_id)?;
    let session = handle.lock().await;
    Ok(Json(transcript(&session_id, &session)))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.sessions.remove(&session_id) {
        return Err(ApiError::NotFound(format!("Session not found: {}", session_id)));
    }
    Ok(Json(json!({"success": true})))
}

/// Submit-question event. The session lock is held across the engine call so
/// events on one session are handled strictly in order.
pub async fn submit_question(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    payload: Result<Json<SubmitQuestionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let handle = lookup(&state, &session_id)?;
    let mut session = handle.lock().await;

    let outcome = state
        .controller
        .submit_question(&session, &payload.question)
        .await?;
    *session = outcome.session;

    Ok(Json(with_fields(
        transcript(&session_id, &session),
        json!({
            "answer_index": outcome.answer_index,
            "gated": outcome.gated,
            "warning": outcome.warning
        }),
    )))
}

/// Submit-rating event.
pub async fn submit_rating(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    payload: Result<Json<SubmitRatingRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let handle = lookup(&state, &session_id)?;
    let mut session = handle.lock().await;

    let receipt = state
        .ratings
        .submit(&session, payload.index, payload.value)
        .await?;
    *session = receipt.session;

    Ok(Json(with_fields(
        transcript(&session_id, &session),
        json!({
            "flagged": receipt.flagged,
            "warning": receipt.warning
        }),
    )))
}
