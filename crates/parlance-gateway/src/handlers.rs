//! Request handlers for the session routes.
//!
//! Handlers take the raw body and parse it themselves so malformed JSON and
//! failed field checks both come back as a 400 with a JSON error body.
//! Engine errors are translated at this boundary: `SessionNotFound` to 404,
//! `SessionClosed` to 400, anything else to a generic 500. Bodies are
//! serialized by hand, so every reply carries an explicit
//! `application/json` content type.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderName, StatusCode};
use axum::response::IntoResponse;
use parlance_core::ParlanceError;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::dto::{
    AddEventRequest, CreateSessionRequest, EventResponse, PaginationParams,
    SessionDetailResponse, SessionResponse,
};
use crate::server::AppState;

/// `POST /sessions` - creates a session, or returns the existing record
/// when the id is already taken.
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    body: String,
) -> impl IntoResponse {
    let request: CreateSessionRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Rejected malformed session create");
            return bad_request(format!("invalid request body: {e}"));
        }
    };
    if let Err(message) = request.validate() {
        warn!(%message, "Rejected session create");
        return bad_request(message);
    }

    match state
        .engine
        .create_or_get_session(request.into_new_session())
        .await
    {
        Ok(session) => {
            info!(session_id = %session.session_id, status = %session.status, "Session ensured");
            json_response(StatusCode::OK, &SessionResponse::from(session))
        }
        Err(e) => error_response(&e),
    }
}

/// `POST /sessions/{session_id}/events` - appends an event; replaying an
/// already-ingested `eventId` returns the stored event.
pub async fn add_event(
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
    body: String,
) -> impl IntoResponse {
    let request: AddEventRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(session_id, error = %e, "Rejected malformed event");
            return bad_request(format!("invalid request body: {e}"));
        }
    };
    if let Err(message) = request.validate() {
        warn!(session_id, %message, "Rejected event");
        return bad_request(message);
    }

    match state.engine.add_event(&session_id, request.into_draft()).await {
        Ok(event) => json_response(StatusCode::OK, &EventResponse::from(event)),
        Err(e) => error_response(&e),
    }
}

/// `GET /sessions/{session_id}` - the session plus one page of its events.
pub async fn get_session(
    Path(session_id): Path<String>,
    Query(params): Query<PaginationParams>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    if let Err(message) = params.validate() {
        warn!(session_id, %message, "Rejected detail query");
        return bad_request(message);
    }

    match state
        .engine
        .session_detail(&session_id, params.page, params.limit)
        .await
    {
        Ok(detail) => json_response(StatusCode::OK, &SessionDetailResponse::from(detail)),
        Err(e) => error_response(&e),
    }
}

/// `POST /sessions/{session_id}/complete` - marks the session completed.
/// Completing twice is a no-op; an unknown session is a 404.
pub async fn complete_session(
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    match state.engine.complete_session(&session_id).await {
        Ok(Some(session)) => json_response(StatusCode::OK, &SessionResponse::from(session)),
        Ok(None) => error_response(&ParlanceError::SessionNotFound(session_id)),
        Err(e) => error_response(&e),
    }
}

type JsonReply = (StatusCode, [(HeaderName, &'static str); 1], String);

fn json_reply(status: StatusCode, body: String) -> JsonReply {
    (status, [(header::CONTENT_TYPE, "application/json")], body)
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> JsonReply {
    match serde_json::to_string(value) {
        Ok(body) => json_reply(status, body),
        Err(e) => {
            error!(error = %e, "Failed to serialize response body");
            json_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({"error": "internal error"}).to_string(),
            )
        }
    }
}

fn bad_request(message: String) -> JsonReply {
    json_reply(
        StatusCode::BAD_REQUEST,
        serde_json::json!({"error": message}).to_string(),
    )
}

fn error_response(err: &ParlanceError) -> JsonReply {
    match err {
        ParlanceError::SessionNotFound(id) => json_reply(
            StatusCode::NOT_FOUND,
            serde_json::json!({"error": format!("Session with ID {id} not found")}).to_string(),
        ),
        ParlanceError::SessionClosed(_) => json_reply(
            StatusCode::BAD_REQUEST,
            serde_json::json!({"error": "Cannot add events to a completed session"}).to_string(),
        ),
        other => {
            error!(error = %other, "Request failed");
            json_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({"error": "internal error"}).to_string(),
            )
        }
    }
}
