//! HTTP gateway for the Parlance session service.
//!
//! A thin JSON layer over [`parlance_engine::SessionEngine`]:
//!
//! - `POST /sessions` - create a session (idempotent on `sessionId`)
//! - `POST /sessions/{session_id}/events` - append an event
//! - `GET  /sessions/{session_id}` - session with one page of events
//! - `POST /sessions/{session_id}/complete` - mark a session completed
//! - `GET  /health` - liveness probe

pub mod dto;
pub mod handlers;
pub mod server;

pub use server::{AppState, GatewayServer};
