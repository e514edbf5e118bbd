use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::LogRecord;

/// Abstraction over call log storage backends.
///
/// Every backend holds at most [`capacity`](LogBackend::capacity) records and
/// evicts in insertion order (FIFO) once that bound is exceeded.
#[async_trait]
pub trait LogBackend: Send + Sync {
    /// Persist a record, then evict the oldest entries beyond capacity.
    async fn append(&self, record: &LogRecord) -> Result<(), StorageError>;

    /// All retained records, oldest first (insertion order).
    async fn list(&self) -> Result<Vec<LogRecord>, StorageError>;

    /// Remove every record. Clearing an empty store succeeds.
    async fn clear(&self) -> Result<(), StorageError>;

    /// Human-readable name of this backend (e.g., "memory", "sqlite").
    fn name(&self) -> &str;

    /// Maximum number of retained records.
    fn capacity(&self) -> usize;
}
