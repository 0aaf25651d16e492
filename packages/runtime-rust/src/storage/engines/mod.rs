//! Concrete [`TransactionalStore`](crate::storage::TransactionalStore) implementations.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::{MemoryStore, MemoryTransaction};
#[cfg(feature = "postgres")]
pub use postgres::{PgStore, PgTransaction};
