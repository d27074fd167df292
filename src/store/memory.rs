use super::{HistorySink, SessionStore, StoreError};
use crate::clock::Timestamp;
use crate::interval::WorkInterval;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

const TABLE: &str = "memory";

fn injected(operation: &'static str) -> StoreError {
    StoreError::Backend {
        operation,
        table: TABLE.to_string(),
        message: "injected failure".to_string(),
    }
}

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Timestamp>>,
    failing: RwLock<HashSet<&'static str>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later call of `operation` ("get", "put" or "delete") fail.
    pub async fn fail(&self, operation: &'static str) {
        self.failing.write().await.insert(operation);
    }

    pub async fn snapshot(&self) -> HashMap<String, Timestamp> {
        self.sessions.read().await.clone()
    }

    async fn check(&self, operation: &'static str) -> Result<(), StoreError> {
        if self.failing.read().await.contains(operation) {
            return Err(injected(operation));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &str) -> Result<Option<Timestamp>, StoreError> {
        self.check("get").await?;
        Ok(self.sessions.read().await.get(id).copied())
    }

    async fn put(&self, id: &str, joined_at: Timestamp) -> Result<(), StoreError> {
        self.check("put").await?;
        self.sessions.write().await.insert(id.to_string(), joined_at);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.check("delete").await?;
        self.sessions.write().await.remove(id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryHistorySink {
    records: RwLock<Vec<WorkInterval>>,
    failing_starts: RwLock<HashSet<Timestamp>>,
}

impl MemoryHistorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects writes of intervals starting at `start_at`.
    pub async fn fail_at(&self, start_at: &str) {
        self.failing_starts.write().await.insert(start_at.parse().unwrap());
    }

    pub async fn records(&self) -> Vec<WorkInterval> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl HistorySink for MemoryHistorySink {
    async fn put(&self, interval: &WorkInterval) -> Result<(), StoreError> {
        if self.failing_starts.read().await.contains(&interval.start_at) {
            return Err(injected("put"));
        }
        self.records.write().await.push(interval.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn deleting_an_absent_session_is_harmless() {
        let store = MemorySessionStore::new();
        store.put("A", ts("2024-01-01 10:00:00")).await.unwrap();

        store.delete("nobody").await.unwrap();
        store.delete("nobody").await.unwrap();

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("A"), Some(&ts("2024-01-01 10:00:00")));
    }

    #[tokio::test]
    async fn injected_failures_only_hit_the_named_operation() {
        let store = MemorySessionStore::new();
        store.fail("get").await;

        assert!(store.get("A").await.is_err());
        store.put("A", ts("2024-01-01 10:00:00")).await.unwrap();
        store.delete("A").await.unwrap();
    }
}
