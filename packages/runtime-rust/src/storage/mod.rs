//! Transactional storage collaborators.
//!
//! - [`TransactionalStore`]: backing store with begin/commit/rollback
//! - [`Transaction`]: handle scoped to a single `execute` phase
//! - [`engines`]: in-memory and (with the `postgres` feature) `PostgreSQL` stores

pub mod engine;
pub mod engines;

pub use engine::{StoreError, Transaction, TransactionalStore};
pub use engines::MemoryStore;
#[cfg(feature = "postgres")]
pub use engines::PgStore;
