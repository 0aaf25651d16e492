//! Transactional store traits.
//!
//! Defines [`TransactionalStore`], the external collaborator that `execute`
//! phases write through, and [`Transaction`], the handle scoped to exactly one
//! `execute` call. Records are JSON values addressed by `(collection, key)`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// Failures raised by a store or transaction.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("transaction already committed or rolled back")]
    Finished,
    #[error("constraint violation on {collection}/{key}: {reason}")]
    Constraint {
        collection: String,
        key: String,
        reason: String,
    },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[cfg(feature = "postgres")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A unit of atomic work against a [`TransactionalStore`].
///
/// Writes are invisible outside the transaction until [`commit`](Transaction::commit)
/// succeeds. Reads inside the transaction observe its own pending writes.
/// Dropping a transaction without committing discards its writes.
///
/// Used as `Arc<dyn Transaction>`, so every method takes `&self`.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Read a record.
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError>;

    /// Insert or replace a record.
    async fn put(&self, collection: &str, key: &str, value: Value) -> Result<(), StoreError>;

    /// Insert a record that must not already exist.
    ///
    /// Fails with [`StoreError::Constraint`] if the key is taken.
    async fn insert(&self, collection: &str, key: &str, value: Value) -> Result<(), StoreError>;

    /// Remove a record, returning its last visible value.
    async fn remove(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError>;

    /// All records of a collection, ordered by key.
    async fn scan(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError>;

    /// Apply all pending writes atomically.
    async fn commit(&self) -> Result<(), StoreError>;

    /// Discard all pending writes.
    async fn rollback(&self) -> Result<(), StoreError>;
}

/// Backing store with begin/commit/rollback semantics.
///
/// Isolation and locking are the store's concern. The pipeline only delimits
/// the transaction boundary around `execute`.
#[async_trait]
pub trait TransactionalStore: Send + Sync {
    /// Open a new transaction.
    async fn begin(&self) -> Result<Arc<dyn Transaction>, StoreError>;

    /// Read a committed record outside any transaction.
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError>;

    /// All committed records of a collection, ordered by key.
    async fn scan(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError>;
}
