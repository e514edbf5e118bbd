use std::path::Path;
use std::sync::{Arc, Mutex};

use apilog_core::error::StorageError;
use apilog_core::record::LogRecord;
use apilog_core::store::LogBackend;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, params};

/// Schema version stored in `PRAGMA user_version`.
pub const SQLITE_SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS api_logs (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
    id           TEXT NOT NULL UNIQUE,
    timestamp    TEXT NOT NULL,
    method       TEXT NOT NULL,
    url          TEXT NOT NULL,
    request_body TEXT,
    response     TEXT NOT NULL,
    status       INTEGER NOT NULL,
    created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);
";

/// Relational table of call records.
///
/// Insert and overflow cleanup run in one transaction, so the bound is strict
/// even with several writers on the same database. Overflow is decided by the
/// autoincrement `seq`, never by `created_at`: the database clock and the
/// record's own `timestamp` may disagree, and neither is an insertion order.
pub struct SqliteLogStore {
    conn: Arc<Mutex<Connection>>,
    capacity: usize,
}

impl SqliteLogStore {
    pub fn open(path: impl AsRef<Path>, capacity: usize) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|e| StorageError::Open(e.to_string()))?;
        migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            capacity,
        })
    }

    /// Run blocking database work off the async executor.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| StorageError::Open("sqlite connection poisoned".into()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StorageError::Write(format!("sqlite task failed: {e}")))?
    }
}

fn migrate(conn: &Connection) -> Result<(), StorageError> {
    let version: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| StorageError::Open(e.to_string()))?;
    match version {
        0 => {
            conn.execute_batch(&format!(
                "BEGIN;{SCHEMA}PRAGMA user_version = {SQLITE_SCHEMA_VERSION};COMMIT;"
            ))
            .map_err(|e| StorageError::Open(e.to_string()))
        }
        SQLITE_SCHEMA_VERSION => Ok(()),
        other => Err(StorageError::Open(format!(
            "unsupported api_logs schema version {other}"
        ))),
    }
}

fn write_err(e: rusqlite::Error) -> StorageError {
    StorageError::Write(e.to_string())
}

fn read_err(e: rusqlite::Error) -> StorageError {
    StorageError::Read(e.to_string())
}

fn ser_err(e: serde_json::Error) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Raw column values of one `api_logs` row.
type RawRow = (String, String, String, String, Option<String>, String, i64);

fn decode_row(row: RawRow) -> Result<LogRecord, StorageError> {
    let (id, timestamp, method, url, request_body, response, status) = row;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map_err(|e| StorageError::Serialization(format!("timestamp of {id}: {e}")))?
        .with_timezone(&Utc);
    let request_body = request_body
        .map(|body| serde_json::from_str(&body))
        .transpose()
        .map_err(ser_err)?;
    let response = serde_json::from_str(&response).map_err(ser_err)?;
    let status = u16::try_from(status)
        .map_err(|_| StorageError::Serialization(format!("status of {id} out of range: {status}")))?;
    Ok(LogRecord {
        id,
        timestamp,
        method,
        url,
        request_body,
        response,
        status,
    })
}

#[async_trait]
impl LogBackend for SqliteLogStore {
    async fn append(&self, record: &LogRecord) -> Result<(), StorageError> {
        let timestamp = record
            .timestamp
            .to_rfc3339_opts(SecondsFormat::AutoSi, true);
        let request_body = record
            .request_body
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(ser_err)?;
        let response = serde_json::to_string(&record.response).map_err(ser_err)?;
        let id = record.id.clone();
        let method = record.method.clone();
        let url = record.url.clone();
        let status = i64::from(record.status);
        let keep = i64::try_from(self.capacity).unwrap_or(i64::MAX);

        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(write_err)?;
            let inserted = tx
                .execute(
                    "INSERT OR IGNORE INTO api_logs
                         (id, timestamp, method, url, request_body, response, status)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![id, timestamp, method, url, request_body, response, status],
                )
                .map_err(write_err)?;
            // Replayed id: nothing new to bound.
            if inserted == 0 {
                return tx.commit().map_err(write_err);
            }
            tx.execute(
                "DELETE FROM api_logs
                 WHERE seq NOT IN (SELECT seq FROM api_logs ORDER BY seq DESC LIMIT ?1)",
                params![keep],
            )
            .map_err(write_err)?;
            tx.commit().map_err(write_err)
        })
        .await
    }

    async fn list(&self) -> Result<Vec<LogRecord>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, timestamp, method, url, request_body, response, status
                     FROM api_logs ORDER BY seq ASC",
                )
                .map_err(read_err)?;
            let rows = stmt
                .query_map([], |row| -> rusqlite::Result<RawRow> {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                })
                .map_err(read_err)?;

            let mut records = Vec::new();
            for row in rows {
                records.push(decode_row(row.map_err(read_err)?)?);
            }
            Ok(records)
        })
        .await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM api_logs", [])
                .map(|_| ())
                .map_err(write_err)
        })
        .await
    }

    fn name(&self) -> &str {
        "sqlite"
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}
