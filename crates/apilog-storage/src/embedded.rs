use apilog_core::error::StorageError;
use apilog_core::record::LogRecord;
use apilog_core::store::LogBackend;
use async_trait::async_trait;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use tokio::sync::Mutex;
use tracing::debug;

/// Version tag kept in the `meta` partition.
pub const EMBEDDED_FORMAT_VERSION: u8 = 1;

const VERSION_KEY: &[u8] = b"format_version";

/// Embedded LSM database keyed by record id, with an ordered index.
///
/// Appends are incremental: the new record and the evictions it causes go
/// into one write batch, so the bound holds even if the process dies mid-way.
pub struct EmbeddedLogStore {
    keyspace: Keyspace,
    records: PartitionHandle,
    by_seq: PartitionHandle,
    capacity: usize,
    /// Next insertion sequence; the guard also serializes writers.
    next_seq: Mutex<u64>,
}

impl EmbeddedLogStore {
    pub fn open(path: impl AsRef<std::path::Path>, capacity: usize) -> Result<Self, StorageError> {
        let keyspace = Config::new(path)
            .open()
            .map_err(|e| StorageError::Open(e.to_string()))?;

        let records = keyspace
            .open_partition("records", PartitionCreateOptions::default())
            .map_err(|e| StorageError::Open(e.to_string()))?;

        let by_seq = keyspace
            .open_partition("by_seq", PartitionCreateOptions::default())
            .map_err(|e| StorageError::Open(e.to_string()))?;

        let meta = keyspace
            .open_partition("meta", PartitionCreateOptions::default())
            .map_err(|e| StorageError::Open(e.to_string()))?;

        match meta
            .get(VERSION_KEY)
            .map_err(|e| StorageError::Open(e.to_string()))?
        {
            Some(v) if v.as_ref() == [EMBEDDED_FORMAT_VERSION] => {}
            Some(v) => {
                return Err(StorageError::Open(format!(
                    "unsupported embedded log format {:?}",
                    v.as_ref()
                )));
            }
            None => meta
                .insert(VERSION_KEY, [EMBEDDED_FORMAT_VERSION])
                .map_err(|e| StorageError::Open(e.to_string()))?,
        }

        let next_seq = match by_seq
            .last_key_value()
            .map_err(|e| StorageError::Open(e.to_string()))?
        {
            Some((key, _)) => decode_seq(&key)? + 1,
            None => 0,
        };

        Ok(Self {
            keyspace,
            records,
            by_seq,
            capacity,
            next_seq: Mutex::new(next_seq),
        })
    }

    /// Hand the journal to the OS so another process (or a reopen) sees it.
    fn persist(&self) -> Result<(), StorageError> {
        self.keyspace
            .persist(PersistMode::Buffer)
            .map_err(|e| StorageError::Write(e.to_string()))
    }
}

/// The `by_seq` key: insertion sequence as big-endian bytes, so key order is
/// insertion order. Wall-clock timestamps are not used because they can tie
/// or step backwards.
fn seq_key(seq: u64) -> [u8; 8] {
    seq.to_be_bytes()
}

fn decode_seq(key: &[u8]) -> Result<u64, StorageError> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| StorageError::Read("invalid key in by_seq index".into()))?;
    Ok(u64::from_be_bytes(bytes))
}

#[async_trait]
impl LogBackend for EmbeddedLogStore {
    async fn append(&self, record: &LogRecord) -> Result<(), StorageError> {
        let serialized =
            serde_json::to_vec(record).map_err(|e| StorageError::Serialization(e.to_string()))?;

        let mut next_seq = self.next_seq.lock().await;

        if self
            .records
            .contains_key(record.id.as_bytes())
            .map_err(|e| StorageError::Read(e.to_string()))?
        {
            debug!(id = %record.id, "api call log already stored");
            return Ok(());
        }

        let retained = self
            .by_seq
            .len()
            .map_err(|e| StorageError::Read(e.to_string()))?;
        let excess = (retained + 1).saturating_sub(self.capacity);

        let mut batch = self.keyspace.batch();
        for entry in self.by_seq.iter().take(excess) {
            let (key, id) = entry.map_err(|e| StorageError::Read(e.to_string()))?;
            batch.remove(&self.by_seq, key);
            batch.remove(&self.records, id);
        }
        batch.insert(&self.records, record.id.as_bytes(), &serialized);
        batch.insert(&self.by_seq, seq_key(*next_seq), record.id.as_bytes());
        batch
            .commit()
            .map_err(|e| StorageError::Write(e.to_string()))?;
        self.persist()?;

        *next_seq += 1;
        if excess > 0 {
            debug!(evicted = excess, "evicted oldest api call logs");
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<LogRecord>, StorageError> {
        let mut results = Vec::new();
        for entry in self.by_seq.iter() {
            let (_key, id) = entry.map_err(|e| StorageError::Read(e.to_string()))?;
            let Some(value) = self
                .records
                .get(&id)
                .map_err(|e| StorageError::Read(e.to_string()))?
            else {
                continue;
            };
            let record: LogRecord = serde_json::from_slice(&value)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            results.push(record);
        }
        Ok(results)
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.next_seq.lock().await;

        let mut batch = self.keyspace.batch();
        for entry in self.by_seq.keys() {
            let key = entry.map_err(|e| StorageError::Read(e.to_string()))?;
            batch.remove(&self.by_seq, key);
        }
        for entry in self.records.keys() {
            let key = entry.map_err(|e| StorageError::Read(e.to_string()))?;
            batch.remove(&self.records, key);
        }
        batch
            .commit()
            .map_err(|e| StorageError::Write(e.to_string()))?;
        self.persist()
    }

    fn name(&self) -> &str {
        "embedded"
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn make_record(i: usize) -> LogRecord {
        LogRecord::new(
            "GET",
            format!("https://api.test/v2/billing/customers/{i}"),
            json!({"index": i}),
            200,
            None,
        )
    }

    #[tokio::test]
    async fn test_sequence_resumes_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = EmbeddedLogStore::open(dir.path(), 3).unwrap();
            for i in 0..2 {
                store.append(&make_record(i)).await.unwrap();
            }
        }

        let store = EmbeddedLogStore::open(dir.path(), 3).unwrap();
        for i in 2..4 {
            store.append(&make_record(i)).await.unwrap();
        }
        let indexes: Vec<u64> = store
            .list()
            .await
            .unwrap()
            .iter()
            .map(|r| r.response["index"].as_u64().unwrap())
            .collect();
        assert_eq!(indexes, [1, 2, 3]);
    }

    #[tokio::test]
    async fn test_eviction_removes_record_bodies() {
        let dir = tempfile::tempdir().unwrap();
        let store = EmbeddedLogStore::open(dir.path(), 2).unwrap();
        let first = make_record(0);
        store.append(&first).await.unwrap();
        store.append(&make_record(1)).await.unwrap();
        store.append(&make_record(2)).await.unwrap();

        assert!(store.records.get(first.id.as_bytes()).unwrap().is_none());
        assert_eq!(store.records.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_out_of_order_timestamps_keep_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = EmbeddedLogStore::open(dir.path(), 10).unwrap();

        let mut later = make_record(0);
        later.timestamp = later.timestamp + chrono::TimeDelta::seconds(60);
        let earlier = make_record(1);
        store.append(&later).await.unwrap();
        store.append(&earlier).await.unwrap();

        let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, [later.id, earlier.id]);
    }
}
