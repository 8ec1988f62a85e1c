//! Session lifecycle engine for Parlance.
//!
//! [`SessionEngine`] sits between the HTTP gateway and the storage layer and
//! owns the lifecycle rules: idempotent session creation, event ingestion
//! with replay resolution, paginated reads, and completion. It never decides
//! races itself; it delegates them to the store's atomic primitives and
//! interprets the outcomes.

use std::sync::Arc;

use chrono::Utc;
use parlance_core::{
    Event, EventDraft, NewEvent, NewSession, ParlanceError, ParlanceResult, Session,
    SessionStatus,
};
use parlance_store::{AppendOutcome, EventLedger, SessionStore};
use tracing::{debug, info, warn};

/// A session together with one page of its events.
#[derive(Debug, Clone)]
pub struct SessionDetail {
    /// The session record.
    pub session: Session,
    /// The requested page of the session's events, oldest first.
    pub events: Vec<Event>,
}

/// Orchestrates session and event operations on top of the storage traits.
pub struct SessionEngine {
    sessions: Arc<dyn SessionStore>,
    events: Arc<dyn EventLedger>,
}

impl SessionEngine {
    /// Creates an engine over the given stores. Backends implementing both
    /// traits can be passed as two clones of one `Arc`.
    pub fn new(sessions: Arc<dyn SessionStore>, events: Arc<dyn EventLedger>) -> Self {
        Self { sessions, events }
    }

    /// Creates the session, or returns the existing one untouched when the
    /// id is already taken. Concurrent calls with the same id all observe the
    /// same stored record.
    pub async fn create_or_get_session(&self, new: NewSession) -> ParlanceResult<Session> {
        let session = self.sessions.upsert_if_absent(new).await?;
        debug!(
            session_id = %session.session_id,
            status = %session.status,
            "Session ensured"
        );
        Ok(session)
    }

    /// Appends an event to a live session.
    ///
    /// Fails with [`ParlanceError::SessionNotFound`] when the session does
    /// not exist and [`ParlanceError::SessionClosed`] when it is completed.
    /// A replay of an already-ingested `(session_id, event_id)` key returns
    /// the stored event as a success; the replayed payload is discarded.
    /// Appending never changes the session's status.
    pub async fn add_event(&self, session_id: &str, draft: EventDraft) -> ParlanceResult<Event> {
        let session = self
            .sessions
            .find(session_id)
            .await?
            .ok_or_else(|| ParlanceError::SessionNotFound(session_id.to_string()))?;
        if session.status == SessionStatus::Completed {
            warn!(session_id, event_id = %draft.event_id, "Event rejected, session completed");
            return Err(ParlanceError::SessionClosed(session_id.to_string()));
        }

        let event_id = draft.event_id.clone();
        let new = NewEvent {
            session_id: session_id.to_string(),
            event_id: draft.event_id,
            kind: draft.kind,
            payload: draft.payload,
            timestamp: draft.timestamp.unwrap_or_else(Utc::now),
        };

        match self.events.append(new).await? {
            AppendOutcome::Inserted(event) => Ok(event),
            AppendOutcome::DuplicateEvent => {
                debug!(session_id, event_id = %event_id, "Duplicate event, returning stored row");
                self.events
                    .find_by_key(session_id, &event_id)
                    .await?
                    .ok_or_else(|| {
                        ParlanceError::Storage(format!(
                            "event {event_id} in session {session_id} reported duplicate but has no stored row"
                        ))
                    })
            }
        }
    }

    /// Returns the session and one page of its events.
    ///
    /// Fails with [`ParlanceError::SessionNotFound`] when the session does
    /// not exist; a page past the end of the ledger is merely empty.
    pub async fn session_detail(
        &self,
        session_id: &str,
        page: u32,
        limit: u32,
    ) -> ParlanceResult<SessionDetail> {
        let session = self
            .sessions
            .find(session_id)
            .await?
            .ok_or_else(|| ParlanceError::SessionNotFound(session_id.to_string()))?;
        let events = self.events.list_page(session_id, page, limit).await?;
        Ok(SessionDetail { session, events })
    }

    /// Marks the session completed. Completing an already-completed session
    /// is a no-op that returns the record as is. `None` means no session with
    /// that id exists; the caller chooses how to report that.
    pub async fn complete_session(&self, session_id: &str) -> ParlanceResult<Option<Session>> {
        let completed = self.sessions.transition_to_completed(session_id).await?;
        match &completed {
            Some(session) => {
                info!(session_id, status = %session.status, "Session completed");
            }
            None => {
                warn!(session_id, "Completion requested for unknown session");
            }
        }
        Ok(completed)
    }
}
