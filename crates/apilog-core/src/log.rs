use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::record::LogRecord;
use crate::store::LogBackend;

/// Result of a best-effort store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Stored,
    /// The backend failed; the caller carries on without the log.
    Degraded(String),
}

impl Outcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stored => f.write_str("stored"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
        }
    }
}

/// What `append` produced: the record as built, and whether it was kept.
#[derive(Debug, Clone)]
pub struct Appended {
    pub record: LogRecord,
    pub outcome: Outcome,
}

/// What `read` produced. On failure `records` is empty.
#[derive(Debug, Clone)]
pub struct Listing {
    pub records: Vec<LogRecord>,
    pub outcome: Outcome,
}

/// Best-effort front of a [`LogBackend`].
///
/// None of these methods fail: a storage problem is reported on the tracing
/// channel and as an [`Outcome::Degraded`], so logging can never break the
/// billing call being logged. Cloning shares the same backend.
#[derive(Clone)]
pub struct CallLog {
    backend: Arc<dyn LogBackend>,
}

impl CallLog {
    pub fn new(backend: Arc<dyn LogBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn capacity(&self) -> usize {
        self.backend.capacity()
    }

    /// Record one downstream call.
    pub async fn append(
        &self,
        method: &str,
        url: &str,
        response: Value,
        status: u16,
        request_body: Option<Value>,
    ) -> Appended {
        let record = LogRecord::new(method, url, response, status, request_body);
        let outcome = self.append_record(&record).await;
        Appended { record, outcome }
    }

    /// Store an already-built record (the relay path receives these whole).
    pub async fn append_record(&self, record: &LogRecord) -> Outcome {
        match self.backend.append(record).await {
            Ok(()) => Outcome::Stored,
            Err(e) => {
                warn!(
                    backend = self.backend.name(),
                    id = %record.id,
                    error = %e,
                    "failed to store api call log"
                );
                Outcome::Degraded(e.to_string())
            }
        }
    }

    /// Retained records, oldest first, with the read outcome.
    pub async fn read(&self) -> Listing {
        match self.backend.list().await {
            Ok(records) => Listing {
                records,
                outcome: Outcome::Stored,
            },
            Err(e) => {
                warn!(backend = self.backend.name(), error = %e, "failed to read api call logs");
                Listing {
                    records: Vec::new(),
                    outcome: Outcome::Degraded(e.to_string()),
                }
            }
        }
    }

    /// Retained records, oldest first. Empty on read failure.
    pub async fn list(&self) -> Vec<LogRecord> {
        self.read().await.records
    }

    /// Retained records, newest first. Empty on read failure.
    pub async fn list_newest_first(&self) -> Vec<LogRecord> {
        let mut records = self.list().await;
        records.reverse();
        records
    }

    pub async fn clear(&self) -> Outcome {
        match self.backend.clear().await {
            Ok(()) => Outcome::Stored,
            Err(e) => {
                warn!(backend = self.backend.name(), error = %e, "failed to clear api call logs");
                Outcome::Degraded(e.to_string())
            }
        }
    }
}

impl fmt::Debug for CallLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallLog")
            .field("backend", &self.backend.name())
            .field("capacity", &self.backend.capacity())
            .finish()
    }
}
