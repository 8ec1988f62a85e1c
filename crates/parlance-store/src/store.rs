//! Storage traits for sessions and their event ledgers.

use async_trait::async_trait;
use parlance_core::{Event, NewEvent, NewSession, ParlanceResult, Session};

/// Outcome of an event append.
///
/// A replayed `(session_id, event_id)` key is a tagged value rather than an
/// error, so callers can treat idempotent ingestion as a success path.
#[derive(Debug, Clone)]
pub enum AppendOutcome {
    /// The event was written. Carries the stored row.
    Inserted(Event),
    /// An event with the same `(session_id, event_id)` key already exists.
    DuplicateEvent,
}

/// Atomic persistence for session records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Inserts the session if `session_id` is absent, then returns the stored
    /// row either way. A concurrent or repeated call with the same id never
    /// overwrites existing fields.
    async fn upsert_if_absent(&self, new: NewSession) -> ParlanceResult<Session>;

    /// Looks up a session by id.
    async fn find(&self, session_id: &str) -> ParlanceResult<Option<Session>>;

    /// Marks the session completed and stamps `ended_at`, unless it is
    /// already completed. Returns the stored row, or `None` when no session
    /// with that id exists.
    async fn transition_to_completed(&self, session_id: &str)
        -> ParlanceResult<Option<Session>>;
}

/// Append-only persistence for session events.
#[async_trait]
pub trait EventLedger: Send + Sync {
    /// Appends an event, detecting `(session_id, event_id)` replays in the
    /// same write rather than with a prior read.
    async fn append(&self, new: NewEvent) -> ParlanceResult<AppendOutcome>;

    /// Looks up a single event by its unique key.
    async fn find_by_key(&self, session_id: &str, event_id: &str)
        -> ParlanceResult<Option<Event>>;

    /// Returns one page of a session's events ordered by timestamp, ties in
    /// insertion order. Pages are 1-based; a page past the end is empty.
    async fn list_page(&self, session_id: &str, page: u32, limit: u32)
        -> ParlanceResult<Vec<Event>>;
}
