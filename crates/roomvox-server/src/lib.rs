//! roomvox server library logic: the voice agent job handler and the token
//! API that dispatches it.

pub mod agent;
pub mod api;
pub mod config;
pub mod dispatch;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use dispatch::DispatchRegistry;
use roomvox_voice::VoiceService;
use roomvox_worker::{RoomAdmission, WorkerHandle};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use agent::VoiceAgent;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// LiveKit tokens and room management.
    pub voice: Arc<VoiceService>,
    /// Submits jobs to the in-process worker.
    pub worker: WorkerHandle,
    /// Rooms the agent was dispatched to.
    pub dispatches: Arc<DispatchRegistry>,
    /// The agent's room occupancy set, shared with [`VoiceAgent`].
    pub admission: RoomAdmission,
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route(
            "/token",
            post(api::create_token_handler).get(api::get_token_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
