//! Wire types for the gateway's JSON API.
//!
//! Request and response bodies use camelCase keys; the event kind travels
//! under the key `type`. Domain types in `parlance-core` keep their Rust
//! field names, so the mapping lives entirely here. Request bodies reject
//! unknown keys; query strings stay permissive.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parlance_core::{Event, EventDraft, EventKind, NewSession, Session, SessionStatus};
use parlance_engine::SessionDetail;
use serde::{Deserialize, Serialize};

/// Body of `POST /sessions`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateSessionRequest {
    /// Caller-chosen unique identifier for the session.
    pub session_id: String,
    /// Conversation language tag.
    pub language: String,
    /// Optional initial status; only `initiated` and `active` are accepted.
    #[serde(default)]
    pub status: Option<SessionStatus>,
    /// Optional free-form metadata.
    #[serde(default)]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl CreateSessionRequest {
    /// Field checks serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.session_id.trim().is_empty() {
            return Err("sessionId must not be empty".to_string());
        }
        if self.language.trim().is_empty() {
            return Err("language must not be empty".to_string());
        }
        if matches!(
            self.status,
            Some(SessionStatus::Completed) | Some(SessionStatus::Failed)
        ) {
            return Err("status must be one of: initiated, active".to_string());
        }
        Ok(())
    }

    /// Converts into the engine's creation draft.
    pub fn into_new_session(self) -> NewSession {
        let mut new = NewSession::new(self.session_id, self.language);
        if let Some(status) = self.status {
            new = new.with_status(status);
        }
        if let Some(metadata) = self.metadata {
            new = new.with_metadata(metadata);
        }
        new
    }
}

/// Body of `POST /sessions/{session_id}/events`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddEventRequest {
    /// Caller-chosen identifier, unique within the session.
    pub event_id: String,
    /// Event kind, one of `user_speech`, `bot_speech`, `system`.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Arbitrary JSON object payload.
    pub payload: serde_json::Value,
    /// Optional occurrence time; the engine stamps "now" when absent.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl AddEventRequest {
    /// Field checks serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.event_id.trim().is_empty() {
            return Err("eventId must not be empty".to_string());
        }
        if !self.payload.is_object() {
            return Err("payload must be a JSON object".to_string());
        }
        Ok(())
    }

    /// Converts into the engine's event draft.
    pub fn into_draft(self) -> EventDraft {
        let mut draft = EventDraft::new(self.event_id, self.kind, self.payload);
        if let Some(at) = self.timestamp {
            draft = draft.with_timestamp(at);
        }
        draft
    }
}

/// Query string of `GET /sessions/{session_id}`.
#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Page size.
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    20
}

impl PaginationParams {
    /// Both values must be at least 1.
    pub fn validate(&self) -> Result<(), String> {
        if self.page < 1 {
            return Err("page must be at least 1".to_string());
        }
        if self.limit < 1 {
            return Err("limit must be at least 1".to_string());
        }
        Ok(())
    }
}

/// A session as returned by the API.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    /// Caller-chosen unique identifier for the session.
    pub session_id: String,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Conversation language tag.
    pub language: String,
    /// When the session record was created.
    pub started_at: DateTime<Utc>,
    /// Always present; `null` until the session completes.
    pub ended_at: Option<DateTime<Utc>>,
    /// Metadata attached at creation.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            session_id: session.session_id,
            status: session.status,
            language: session.language,
            started_at: session.started_at,
            ended_at: session.ended_at,
            metadata: session.metadata,
        }
    }
}

/// An event as returned by the API.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    /// The session this event belongs to.
    pub session_id: String,
    /// Caller-chosen identifier, unique within the session.
    pub event_id: String,
    /// Event kind, serialized under the key `type`.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Arbitrary JSON payload.
    pub payload: serde_json::Value,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
}

impl From<Event> for EventResponse {
    fn from(event: Event) -> Self {
        Self {
            session_id: event.session_id,
            event_id: event.event_id,
            kind: event.kind,
            payload: event.payload,
            timestamp: event.timestamp,
        }
    }
}

/// A session plus one page of its events, as returned by the detail route.
#[derive(Debug, Serialize)]
pub struct SessionDetailResponse {
    /// Session fields, flattened to the top level.
    #[serde(flatten)]
    pub session: SessionResponse,
    /// The requested page of events, oldest first.
    pub events: Vec<EventResponse>,
}

impl From<SessionDetail> for SessionDetailResponse {
    fn from(detail: SessionDetail) -> Self {
        Self {
            session: SessionResponse::from(detail.session),
            events: detail.events.into_iter().map(EventResponse::from).collect(),
        }
    }
}
