use std::collections::VecDeque;

use apilog_core::error::StorageError;
use apilog_core::record::LogRecord;
use apilog_core::store::LogBackend;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Process-lifetime ring buffer. Lost on restart.
pub struct MemoryLogStore {
    records: RwLock<VecDeque<LogRecord>>,
    capacity: usize,
}

impl MemoryLogStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: RwLock::new(VecDeque::new()),
            capacity,
        }
    }
}

#[async_trait]
impl LogBackend for MemoryLogStore {
    async fn append(&self, record: &LogRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        // A replayed id (client retry through the relay) is already stored.
        if records.iter().any(|r| r.id == record.id) {
            return Ok(());
        }
        records.push_back(record.clone());
        while records.len() > self.capacity {
            records.pop_front();
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<LogRecord>, StorageError> {
        Ok(self.records.read().await.iter().cloned().collect())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.records.write().await.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_evicts_oldest_first() {
        let store = MemoryLogStore::new(2);
        for path in ["a", "b", "c"] {
            let record = LogRecord::new("GET", format!("https://api.test/{path}"), json!(null), 200, None);
            store.append(&record).await.unwrap();
        }
        let urls: Vec<String> = store.list().await.unwrap().into_iter().map(|r| r.url).collect();
        assert_eq!(urls, ["https://api.test/b", "https://api.test/c"]);
    }

    #[tokio::test]
    async fn test_huge_capacity_allocates_lazily() {
        let store = MemoryLogStore::new(usize::MAX / 2);
        assert_eq!(store.capacity(), usize::MAX / 2);
        assert!(store.list().await.unwrap().is_empty());
    }
}
