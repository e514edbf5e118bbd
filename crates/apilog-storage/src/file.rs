use std::path::{Path, PathBuf};

use apilog_core::error::StorageError;
use apilog_core::record::LogRecord;
use apilog_core::store::LogBackend;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

/// Version tag written into every log file.
pub const FILE_FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct LogFile {
    version: u32,
    records: Vec<LogRecord>,
}

/// JSON file rewritten wholesale on every change.
///
/// Intended for a single writing process; the mutex only orders writers
/// inside this one.
pub struct FileLogStore {
    path: PathBuf,
    capacity: usize,
    write_lock: Mutex<()>,
}

impl FileLogStore {
    /// Create the parent directory if needed. The file itself appears on the
    /// first write.
    pub fn open(path: impl AsRef<Path>, capacity: usize) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Open(e.to_string()))?;
        }
        Ok(Self {
            path,
            capacity,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing, unreadable or corrupt file reads as an empty log.
    async fn load(&self) -> Vec<LogRecord> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "unreadable log file, treating as empty");
                return Vec::new();
            }
        };
        match serde_json::from_slice::<LogFile>(&bytes) {
            Ok(file) if file.version == FILE_FORMAT_VERSION => file.records,
            Ok(file) => {
                warn!(
                    path = %self.path.display(),
                    version = file.version,
                    "unsupported log file version, treating as empty"
                );
                Vec::new()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "corrupt log file, treating as empty");
                Vec::new()
            }
        }
    }

    /// Write through a sibling temp file so a crash never leaves half a document.
    async fn save(&self, records: Vec<LogRecord>) -> Result<(), StorageError> {
        let file = LogFile {
            version: FILE_FORMAT_VERSION,
            records,
        };
        let bytes =
            serde_json::to_vec_pretty(&file).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| StorageError::Write(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StorageError::Write(e.to_string()))
    }
}

#[async_trait]
impl LogBackend for FileLogStore {
    async fn append(&self, record: &LogRecord) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await;
        if records.iter().any(|r| r.id == record.id) {
            return Ok(());
        }
        records.push(record.clone());
        let excess = records.len().saturating_sub(self.capacity);
        records.drain(..excess);
        self.save(records).await
    }

    async fn list(&self) -> Result<Vec<LogRecord>, StorageError> {
        Ok(self.load().await)
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        self.save(Vec::new()).await
    }

    fn name(&self) -> &str {
        "file"
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn make_record(path: &str) -> LogRecord {
        LogRecord::new(
            "POST",
            format!("https://api.test/{path}"),
            json!({"id": path}),
            201,
            Some(json!({"amount": 1250})),
        )
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api-logs.json");

        let record = make_record("a");
        FileLogStore::open(&path, 10)
            .unwrap()
            .append(&record)
            .await
            .unwrap();

        let reopened = FileLogStore::open(&path, 10).unwrap();
        assert_eq!(reopened.list().await.unwrap(), vec![record]);
    }

    #[tokio::test]
    async fn test_file_carries_version_tag() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLogStore::open(dir.path().join("logs.json"), 10).unwrap();
        store.append(&make_record("a")).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(raw["version"], FILE_FORMAT_VERSION);
        assert_eq!(raw["records"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_empty_and_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = FileLogStore::open(&path, 10).unwrap();
        assert!(store.list().await.unwrap().is_empty());

        let record = make_record("b");
        store.append(&record).await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec![record]);
    }

    #[tokio::test]
    async fn test_unknown_version_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.json");
        std::fs::write(&path, br#"{"version":99,"records":[]}"#).unwrap();

        let store = FileLogStore::open(&path, 10).unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        // The target path is a directory, so the final rename must fail.
        let path = dir.path().join("occupied");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("child"), b"x").unwrap();

        let store = FileLogStore::open(&path, 10).unwrap();
        let err = store.append(&make_record("c")).await.unwrap_err();
        assert!(matches!(err, StorageError::Write(_)));
    }
}
