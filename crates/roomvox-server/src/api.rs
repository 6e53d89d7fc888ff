//! Token HTTP API.

use crate::dispatch::DispatchRegistry;
use crate::AppState;
use axum::{
    extract::Query,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use roomvox_worker::JobDecision;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

const TOKEN_FAILURE: &str = "Failed to generate token";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    #[serde(default)]
    pub room_name: String,
    #[serde(default)]
    pub participant_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub room_name: String,
    pub participant_name: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub room: Option<String>,
    pub identity: Option<String>,
}

/// Handler for `GET /health`.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Handler for `POST /token`.
///
/// Mints a join token, makes sure the room exists and dispatches the agent
/// to it unless a dispatch is already on record.
pub async fn create_token_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let TokenRequest {
        room_name,
        participant_name,
    } = payload;
    if room_name.trim().is_empty() || participant_name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "roomName and participantName are required".to_string(),
        ));
    }

    let token = state
        .voice
        .generate_join_token(&room_name, &participant_name, &participant_name)
        .map_err(|e| {
            tracing::error!(room = %room_name, "failed to mint join token: {}", e);
            ApiError::InternalServerError(TOKEN_FAILURE.to_string())
        })?;

    if let Err(e) = state.voice.create_room(&room_name).await {
        tracing::debug!(room = %room_name, error = %e, "create_room failed, room may already exist");
    }

    dispatch_agent(&state, &room_name).await;

    tracing::info!(room = %room_name, participant = %participant_name, "issued join token");
    Ok(Json(TokenResponse {
        token,
        room_name,
        participant_name,
    }))
}

/// Handler for `GET /token?room=<room>&identity=<identity>`.
pub async fn get_token_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Value>, ApiError> {
    let room = query.room.unwrap_or_default();
    let identity = query.identity.unwrap_or_default();
    if room.trim().is_empty() || identity.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "room and identity query parameters are required".to_string(),
        ));
    }

    let token = state
        .voice
        .generate_join_token(&room, &identity, &identity)
        .map_err(|e| {
            tracing::error!(room = %room, "failed to mint join token: {}", e);
            ApiError::InternalServerError(TOKEN_FAILURE.to_string())
        })?;

    Ok(Json(json!({ "token": token })))
}

/// Drops a room's `Pending` dispatch record unless the dispatch settled.
///
/// The token handler can be cancelled while it waits for the worker's
/// decision; the record must not outlive it.
struct PendingDispatch<'a> {
    registry: &'a DispatchRegistry,
    room: &'a str,
    settled: bool,
}

impl<'a> PendingDispatch<'a> {
    fn new(registry: &'a DispatchRegistry, room: &'a str) -> Self {
        Self {
            registry,
            room,
            settled: false,
        }
    }

    fn complete(mut self, job_id: &str) {
        self.registry.complete(self.room, job_id);
        self.settled = true;
    }

    fn fail(mut self) {
        self.registry.fail(self.room);
        self.settled = true;
    }
}

impl Drop for PendingDispatch<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.registry.fail(self.room);
            tracing::debug!(room = %self.room, "dispatch abandoned before the worker decided");
        }
    }
}

/// Dispatches the agent to `room` at most once per live record. Failures are
/// logged and never fail the token request.
async fn dispatch_agent(state: &AppState, room: &str) {
    if state
        .dispatches
        .clear_if_inactive(room, state.admission.contains(room))
    {
        tracing::debug!(room = %room, "previous agent left, dispatch record cleared");
    }
    if !state.dispatches.try_begin(room) {
        tracing::debug!(room = %room, "agent already dispatched");
        return;
    }

    let pending = PendingDispatch::new(&state.dispatches, room);
    match state.worker.dispatch(room).await {
        Ok(dispatch) if dispatch.decision == JobDecision::Accepted => {
            pending.complete(&dispatch.job_id);
            tracing::info!(room = %room, job_id = %dispatch.job_id, "agent dispatched");
        }
        Ok(dispatch) => {
            pending.fail();
            tracing::info!(room = %room, job_id = %dispatch.job_id, "agent dispatch rejected");
        }
        Err(e) => {
            pending.fail();
            tracing::error!(room = %room, "failed to dispatch agent: {}", e);
        }
    }
}
