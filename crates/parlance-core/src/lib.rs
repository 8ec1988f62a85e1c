//! Core types for the Parlance conversation session service.
//!
//! Everything shared between the storage, engine, and gateway crates lives
//! here: the error taxonomy, the session and event records, and the draft
//! types callers hand in when creating them.
//!
//! # Main types
//!
//! - [`ParlanceError`] - Unified error type for all Parlance operations
//! - [`Session`] - A conversation session and its lifecycle status
//! - [`Event`] - A single entry in a session's event ledger
//! - [`NewSession`] / [`EventDraft`] - Caller-supplied drafts for creation

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Error types ---

/// Unified error type for all Parlance operations.
#[derive(Debug, thiserror::Error)]
pub enum ParlanceError {
    /// The referenced session does not exist.
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    /// The session is completed and rejects further events.
    #[error("Session closed: {0}")]
    SessionClosed(String),
    /// An error originating from the storage backend.
    #[error("Storage error: {0}")]
    Storage(String),
    /// A configuration loading or validation error.
    #[error("Config error: {0}")]
    Config(String),
    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used across all Parlance crates.
pub type ParlanceResult<T> = Result<T, ParlanceError>;

// --- Session types ---

/// Lifecycle status of a conversation session.
///
/// `Completed` is terminal for event ingestion: a completed session rejects
/// new events. `Failed` is reserved for operator tooling and is never entered
/// by the service itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// The session was created but the conversation has not started.
    #[default]
    Initiated,
    /// The conversation is in progress.
    Active,
    /// The conversation ended; no further events are accepted.
    Completed,
    /// The session was marked failed out of band.
    Failed,
}

impl SessionStatus {
    /// Returns the canonical string form, as stored and serialized.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Initiated => "initiated",
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single conversation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Caller-chosen unique identifier for the session.
    pub session_id: String,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Conversation language tag, e.g. `"en"` or `"es-AR"`.
    pub language: String,
    /// When the session record was created.
    pub started_at: DateTime<Utc>,
    /// When the session was completed, if it has been.
    pub ended_at: Option<DateTime<Utc>>,
    /// Free-form metadata attached at creation.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Draft for creating a session.
///
/// Timestamps are not part of the draft: the store stamps `started_at` at
/// insert time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSession {
    /// Caller-chosen unique identifier for the session.
    pub session_id: String,
    /// Conversation language tag.
    pub language: String,
    /// Initial lifecycle status. Defaults to [`SessionStatus::Initiated`].
    #[serde(default)]
    pub status: SessionStatus,
    /// Free-form metadata to attach.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl NewSession {
    /// Creates a draft with default status and empty metadata.
    pub fn new(session_id: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            language: language.into(),
            status: SessionStatus::default(),
            metadata: HashMap::new(),
        }
    }

    /// Sets the initial status.
    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the metadata map.
    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

// --- Event types ---

/// The kind of a conversation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// An utterance from the human participant.
    UserSpeech,
    /// An utterance from the bot.
    BotSpeech,
    /// A non-speech marker such as a transfer or timeout.
    System,
}

impl EventKind {
    /// Returns the canonical string form, as stored and serialized.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::UserSpeech => "user_speech",
            EventKind::BotSpeech => "bot_speech",
            EventKind::System => "system",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single entry in a session's event ledger.
///
/// `(session_id, event_id)` is unique: replays of the same key are resolved
/// to the stored row rather than appended again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// The session this event belongs to.
    pub session_id: String,
    /// Caller-chosen identifier, unique within the session.
    pub event_id: String,
    /// What kind of event this is.
    pub kind: EventKind,
    /// Arbitrary JSON payload.
    pub payload: serde_json::Value,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
}

/// Draft for appending an event, before a timestamp is materialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDraft {
    /// Caller-chosen identifier, unique within the session.
    pub event_id: String,
    /// What kind of event this is.
    pub kind: EventKind,
    /// Arbitrary JSON payload.
    pub payload: serde_json::Value,
    /// When the event occurred. `None` means "stamp with the current time".
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl EventDraft {
    /// Creates a draft with no explicit timestamp.
    pub fn new(event_id: impl Into<String>, kind: EventKind, payload: serde_json::Value) -> Self {
        Self {
            event_id: event_id.into(),
            kind,
            payload,
            timestamp: None,
        }
    }

    /// Sets an explicit occurrence timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// A fully materialized event ready for the ledger, with its session and
/// timestamp resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    /// The session this event belongs to.
    pub session_id: String,
    /// Caller-chosen identifier, unique within the session.
    pub event_id: String,
    /// What kind of event this is.
    pub kind: EventKind,
    /// Arbitrary JSON payload.
    pub payload: serde_json::Value,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
}

impl From<NewEvent> for Event {
    fn from(new: NewEvent) -> Self {
        Event {
            session_id: new.session_id,
            event_id: new.event_id,
            kind: new.kind,
            payload: new.payload,
            timestamp: new.timestamp,
        }
    }
}
