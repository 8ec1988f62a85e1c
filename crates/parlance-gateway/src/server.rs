//! Router assembly and shared handler state.

use std::sync::Arc;

use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use parlance_engine::SessionEngine;

use crate::handlers;

/// Shared state available to all handlers.
pub struct AppState {
    /// The lifecycle engine behind every route.
    pub engine: Arc<SessionEngine>,
}

/// Builds the gateway's `axum` router.
pub struct GatewayServer;

impl GatewayServer {
    /// Assembles the router with all session routes and shared state.
    pub fn build(engine: Arc<SessionEngine>) -> Router {
        let state = Arc::new(AppState { engine });
        Router::new()
            .route("/health", get(health_handler))
            .route("/sessions", post(handlers::create_session))
            .route("/sessions/{session_id}", get(handlers::get_session))
            .route("/sessions/{session_id}/events", post(handlers::add_event))
            .route(
                "/sessions/{session_id}/complete",
                post(handlers::complete_session),
            )
            .with_state(state)
    }
}

async fn health_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        serde_json::json!({"status": "ok", "service": "parlance"}).to_string(),
    )
}
