//! SQLite storage backend.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parlance_core::{
    Event, EventKind, NewEvent, NewSession, ParlanceError, ParlanceResult, Session,
    SessionStatus,
};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::store::{AppendOutcome, EventLedger, SessionStore};

/// Durable store backed by a single SQLite database file.
///
/// One connection lives behind an `Arc<Mutex<_>>` and every call runs on
/// `tokio::task::spawn_blocking`, so the async runtime never blocks on disk
/// I/O and multi-statement operations are serialized on the connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and applies the schema.
    pub async fn connect(path: impl Into<PathBuf>) -> ParlanceResult<Self> {
        let db_path = path.into();
        let display_path = db_path.display().to_string();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, rusqlite::Error> {
            let conn = Connection::open(&db_path)?;
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA temp_store = MEMORY;
                 PRAGMA foreign_keys = ON;",
            )?;
            init_schema(&conn)?;
            Ok(conn)
        })
        .await
        .map_err(join_err)?
        .map_err(storage_err)?;

        info!(path = %display_path, "SQLite store ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run_blocking<F, R>(&self, f: F) -> ParlanceResult<R>
    where
        F: FnOnce(&mut Connection) -> Result<R, rusqlite::Error> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = match conn.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            f(&mut conn)
        })
        .await
        .map_err(join_err)?
        .map_err(storage_err)
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn upsert_if_absent(&self, new: NewSession) -> ParlanceResult<Session> {
        let metadata_json = serde_json::to_string(&new.metadata)?;
        let started_at = fmt_ts(Utc::now());
        self.run_blocking(move |conn| {
            conn.execute(
                "INSERT INTO sessions (session_id, status, language, started_at, ended_at, metadata)
                 VALUES (?1, ?2, ?3, ?4, NULL, ?5)
                 ON CONFLICT(session_id) DO NOTHING",
                params![
                    new.session_id,
                    new.status.as_str(),
                    new.language,
                    started_at,
                    metadata_json
                ],
            )?;
            conn.query_row(
                "SELECT session_id, status, language, started_at, ended_at, metadata
                 FROM sessions WHERE session_id = ?1",
                params![new.session_id],
                row_to_session,
            )
        })
        .await
    }

    async fn find(&self, session_id: &str) -> ParlanceResult<Option<Session>> {
        let session_id = session_id.to_string();
        self.run_blocking(move |conn| {
            conn.query_row(
                "SELECT session_id, status, language, started_at, ended_at, metadata
                 FROM sessions WHERE session_id = ?1",
                params![session_id],
                row_to_session,
            )
            .optional()
        })
        .await
    }

    async fn transition_to_completed(
        &self,
        session_id: &str,
    ) -> ParlanceResult<Option<Session>> {
        let session_id = session_id.to_string();
        let ended_at = fmt_ts(Utc::now());
        self.run_blocking(move |conn| {
            conn.execute(
                "UPDATE sessions SET status = 'completed', ended_at = ?1
                 WHERE session_id = ?2 AND status <> 'completed'",
                params![ended_at, session_id],
            )?;
            conn.query_row(
                "SELECT session_id, status, language, started_at, ended_at, metadata
                 FROM sessions WHERE session_id = ?1",
                params![session_id],
                row_to_session,
            )
            .optional()
        })
        .await
    }
}

#[async_trait]
impl EventLedger for SqliteStore {
    async fn append(&self, new: NewEvent) -> ParlanceResult<AppendOutcome> {
        // Stored timestamps carry microsecond precision, so the returned row
        // must match what a later read would parse back.
        let mut new = new;
        new.timestamp = truncate_to_micros(new.timestamp);
        let payload_json = serde_json::to_string(&new.payload)?;
        let timestamp = fmt_ts(new.timestamp);
        self.run_blocking(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO events (session_id, event_id, kind, payload, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    new.session_id,
                    new.event_id,
                    new.kind.as_str(),
                    payload_json,
                    timestamp
                ],
            );
            match inserted {
                Ok(_) => Ok(AppendOutcome::Inserted(Event::from(new))),
                Err(err) if is_duplicate_event(&err) => Ok(AppendOutcome::DuplicateEvent),
                Err(err) => Err(err),
            }
        })
        .await
    }

    async fn find_by_key(
        &self,
        session_id: &str,
        event_id: &str,
    ) -> ParlanceResult<Option<Event>> {
        let session_id = session_id.to_string();
        let event_id = event_id.to_string();
        self.run_blocking(move |conn| {
            conn.query_row(
                "SELECT session_id, event_id, kind, payload, timestamp
                 FROM events WHERE session_id = ?1 AND event_id = ?2",
                params![session_id, event_id],
                row_to_event,
            )
            .optional()
        })
        .await
    }

    async fn list_page(
        &self,
        session_id: &str,
        page: u32,
        limit: u32,
    ) -> ParlanceResult<Vec<Event>> {
        let session_id = session_id.to_string();
        // Offset clamps at i64::MAX so out-of-range pages read back empty.
        let offset = i64::try_from(u64::from(page.saturating_sub(1)) * u64::from(limit))
            .unwrap_or(i64::MAX);
        let limit = i64::from(limit);
        self.run_blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT session_id, event_id, kind, payload, timestamp
                 FROM events WHERE session_id = ?1
                 ORDER BY timestamp ASC, id ASC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt.query_map(params![session_id, limit, offset], row_to_event)?;
            rows.collect()
        })
        .await
    }
}

fn init_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sessions (
            session_id TEXT PRIMARY KEY,
            status     TEXT NOT NULL,
            language   TEXT NOT NULL,
            started_at TEXT NOT NULL,
            ended_at   TEXT,
            metadata   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS events (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL,
            event_id   TEXT NOT NULL,
            kind       TEXT NOT NULL,
            payload    TEXT NOT NULL,
            timestamp  TEXT NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_events_session_event
            ON events(session_id, event_id);
        CREATE INDEX IF NOT EXISTS idx_events_session_timestamp
            ON events(session_id, timestamp);",
    )
}

/// True only for violations of the `(session_id, event_id)` unique index.
/// Other constraint failures stay errors.
fn is_duplicate_event(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, Some(msg))
            if e.code == rusqlite::ErrorCode::ConstraintViolation
                && msg.contains("events.session_id, events.event_id")
    )
}

fn join_err(err: tokio::task::JoinError) -> ParlanceError {
    ParlanceError::Storage(format!("blocking task failed: {err}"))
}

fn storage_err(err: rusqlite::Error) -> ParlanceError {
    ParlanceError::Storage(err.to_string())
}

// Fixed-width RFC 3339 UTC so lexicographic order equals chronological order.
fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn truncate_to_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(ts.timestamp_micros()).unwrap_or(ts)
}

fn parse_ts(column: usize, raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn parse_status(column: usize, raw: &str) -> Result<SessionStatus, rusqlite::Error> {
    match raw {
        "initiated" => Ok(SessionStatus::Initiated),
        "active" => Ok(SessionStatus::Active),
        "completed" => Ok(SessionStatus::Completed),
        "failed" => Ok(SessionStatus::Failed),
        other => Err(rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Text,
            format!("unknown session status '{other}'").into(),
        )),
    }
}

fn parse_kind(column: usize, raw: &str) -> Result<EventKind, rusqlite::Error> {
    match raw {
        "user_speech" => Ok(EventKind::UserSpeech),
        "bot_speech" => Ok(EventKind::BotSpeech),
        "system" => Ok(EventKind::System),
        other => Err(rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Text,
            format!("unknown event kind '{other}'").into(),
        )),
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> Result<Session, rusqlite::Error> {
    let status_raw: String = row.get(1)?;
    let started_raw: String = row.get(3)?;
    let ended_raw: Option<String> = row.get(4)?;
    let metadata_raw: String = row.get(5)?;

    let ended_at = match ended_raw {
        Some(raw) => Some(parse_ts(4, &raw)?),
        None => None,
    };
    let metadata = serde_json::from_str(&metadata_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Session {
        session_id: row.get(0)?,
        status: parse_status(1, &status_raw)?,
        language: row.get(2)?,
        started_at: parse_ts(3, &started_raw)?,
        ended_at,
        metadata,
    })
}

fn row_to_event(row: &rusqlite::Row<'_>) -> Result<Event, rusqlite::Error> {
    let kind_raw: String = row.get(2)?;
    let payload_raw: String = row.get(3)?;
    let timestamp_raw: String = row.get(4)?;

    let payload = serde_json::from_str(&payload_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Event {
        session_id: row.get(0)?,
        event_id: row.get(1)?,
        kind: parse_kind(2, &kind_raw)?,
        payload,
        timestamp: parse_ts(4, &timestamp_raw)?,
    })
}
