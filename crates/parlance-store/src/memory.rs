//! In-memory storage backend.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parlance_core::{Event, NewEvent, NewSession, ParlanceResult, Session, SessionStatus};
use tokio::sync::RwLock;

use crate::store::{AppendOutcome, EventLedger, SessionStore};

/// Non-durable store backed by `HashMap`s behind `RwLock`s.
///
/// Used by tests and by deployments that opt out of persistence. Semantics
/// match [`crate::SqliteStore`]: conditional inserts, tagged duplicates, and
/// timestamp-ordered pages with ties in insertion order.
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, Session>>,
    events: RwLock<HashMap<String, Vec<Event>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            events: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn upsert_if_absent(&self, new: NewSession) -> ParlanceResult<Session> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(new.session_id.clone())
            .or_insert_with(|| Session {
                session_id: new.session_id.clone(),
                status: new.status,
                language: new.language,
                started_at: Utc::now(),
                ended_at: None,
                metadata: new.metadata,
            });
        Ok(session.clone())
    }

    async fn find(&self, session_id: &str) -> ParlanceResult<Option<Session>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned())
    }

    async fn transition_to_completed(
        &self,
        session_id: &str,
    ) -> ParlanceResult<Option<Session>> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(session) => {
                if session.status != SessionStatus::Completed {
                    session.status = SessionStatus::Completed;
                    session.ended_at = Some(Utc::now());
                }
                Ok(Some(session.clone()))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl EventLedger for MemoryStore {
    async fn append(&self, new: NewEvent) -> ParlanceResult<AppendOutcome> {
        let mut events = self.events.write().await;
        let ledger = events.entry(new.session_id.clone()).or_default();
        if ledger.iter().any(|e| e.event_id == new.event_id) {
            return Ok(AppendOutcome::DuplicateEvent);
        }
        let event = Event::from(new);
        ledger.push(event.clone());
        Ok(AppendOutcome::Inserted(event))
    }

    async fn find_by_key(
        &self,
        session_id: &str,
        event_id: &str,
    ) -> ParlanceResult<Option<Event>> {
        let events = self.events.read().await;
        Ok(events
            .get(session_id)
            .and_then(|ledger| ledger.iter().find(|e| e.event_id == event_id))
            .cloned())
    }

    async fn list_page(
        &self,
        session_id: &str,
        page: u32,
        limit: u32,
    ) -> ParlanceResult<Vec<Event>> {
        let events = self.events.read().await;
        let Some(ledger) = events.get(session_id) else {
            return Ok(Vec::new());
        };
        let mut ordered = ledger.clone();
        // Stable sort keeps insertion order for equal timestamps.
        ordered.sort_by_key(|e| e.timestamp);
        let skip = usize::try_from(u64::from(page.saturating_sub(1)) * u64::from(limit))
            .unwrap_or(usize::MAX);
        Ok(ordered.into_iter().skip(skip).take(limit as usize).collect())
    }
}
