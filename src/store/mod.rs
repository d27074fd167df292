pub mod dynamo;
#[cfg(test)]
pub mod memory;

use crate::clock::Timestamp;
use crate::interval::WorkInterval;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{operation} on {table} failed: {message}")]
    Backend {
        operation: &'static str,
        table: String,
        message: String,
    },

    #[error("item for {id} in {table} is malformed: {reason}")]
    Malformed {
        id: String,
        table: String,
        reason: String,
    },
}

/// Who is in the tracked channel right now, and since when.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Timestamp>, StoreError>;

    /// Overwrites any session already held for `id`.
    async fn put(&self, id: &str, joined_at: Timestamp) -> Result<(), StoreError>;

    /// Removing a missing session succeeds.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

/// Append-only log of finished intervals, keyed by `(id, start_at)`.
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn put(&self, interval: &WorkInterval) -> Result<(), StoreError>;
}
