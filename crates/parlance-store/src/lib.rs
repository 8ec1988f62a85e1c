//! Storage backends for Parlance sessions and event ledgers.
//!
//! The [`SessionStore`] and [`EventLedger`] traits define the atomic
//! primitives the engine relies on. Two backends implement both:
//! [`MemoryStore`] for tests and ephemeral runs, [`SqliteStore`] for
//! durable single-node deployments.

pub mod memory;
pub mod sqlite;
pub mod store;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::{AppendOutcome, EventLedger, SessionStore};
