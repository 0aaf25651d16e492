//! `PostgreSQL` [`TransactionalStore`] backed by `sqlx`.
//!
//! All collections share one `records` table keyed by `(collection, key)`
//! with a `JSONB` value column.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::Postgres;
use tokio::sync::Mutex;

use crate::storage::engine::{StoreError, Transaction, TransactionalStore};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS records (
    collection TEXT NOT NULL,
    key TEXT NOT NULL,
    value JSONB NOT NULL,
    PRIMARY KEY (collection, key)
)";

/// `PostgreSQL` store using one database transaction per `execute` phase.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to `database_url` and create the `records` table if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection or migration fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool. The `records` table must already exist.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionalStore for PgStore {
    async fn begin(&self) -> Result<Arc<dyn Transaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Arc::new(PgTransaction {
            tx: Mutex::new(Some(tx)),
        }))
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let row: Option<(Json<Value>,)> =
            sqlx::query_as("SELECT value FROM records WHERE collection = $1 AND key = $2")
                .bind(collection)
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(Json(value),)| value))
    }

    async fn scan(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let rows: Vec<(String, Json<Value>)> =
            sqlx::query_as("SELECT key, value FROM records WHERE collection = $1 ORDER BY key")
                .bind(collection)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(key, Json(value))| (key, value)).collect())
    }
}

// ---------------------------------------------------------------------------
// PgTransaction
// ---------------------------------------------------------------------------

/// A live `sqlx` transaction. Dropping it without commit rolls back.
pub struct PgTransaction {
    tx: Mutex<Option<sqlx::Transaction<'static, Postgres>>>,
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(StoreError::Finished)?;
        let row: Option<(Json<Value>,)> =
            sqlx::query_as("SELECT value FROM records WHERE collection = $1 AND key = $2")
                .bind(collection)
                .bind(key)
                .fetch_optional(&mut **tx)
                .await?;
        Ok(row.map(|(Json(value),)| value))
    }

    async fn put(&self, collection: &str, key: &str, value: Value) -> Result<(), StoreError> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(StoreError::Finished)?;
        sqlx::query(
            "INSERT INTO records (collection, key, value) VALUES ($1, $2, $3)
             ON CONFLICT (collection, key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(collection)
        .bind(key)
        .bind(Json(value))
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn insert(&self, collection: &str, key: &str, value: Value) -> Result<(), StoreError> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(StoreError::Finished)?;
        let result = sqlx::query("INSERT INTO records (collection, key, value) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(key)
            .bind(Json(value))
            .execute(&mut **tx)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Err(StoreError::Constraint {
                    collection: collection.to_string(),
                    key: key.to_string(),
                    reason: err.message().to_string(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn remove(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(StoreError::Finished)?;
        let row: Option<(Json<Value>,)> = sqlx::query_as(
            "DELETE FROM records WHERE collection = $1 AND key = $2 RETURNING value",
        )
        .bind(collection)
        .bind(key)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row.map(|(Json(value),)| value))
    }

    async fn scan(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(StoreError::Finished)?;
        let rows: Vec<(String, Json<Value>)> =
            sqlx::query_as("SELECT key, value FROM records WHERE collection = $1 ORDER BY key")
                .bind(collection)
                .fetch_all(&mut **tx)
                .await?;
        Ok(rows.into_iter().map(|(key, Json(value))| (key, value)).collect())
    }

    async fn commit(&self) -> Result<(), StoreError> {
        let tx = self.tx.lock().await.take().ok_or(StoreError::Finished)?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), StoreError> {
        let tx = self.tx.lock().await.take().ok_or(StoreError::Finished)?;
        tx.rollback().await?;
        Ok(())
    }
}
