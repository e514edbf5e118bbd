use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Default number of records a store retains before evicting the oldest.
pub const DEFAULT_CAPACITY: usize = 100;

static NEXT_SEQ: AtomicU64 = AtomicU64::new(0);

/// One observed call to the downstream billing API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// HTTP verb as sent ("GET", "PUT", ...).
    pub method: String,
    /// Target URL. Secrets must already be stripped (see [`crate::redact_url`]).
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<Value>,
    /// Response payload: parsed JSON, or a JSON string for non-JSON bodies.
    pub response: Value,
    pub status: u16,
}

impl LogRecord {
    /// Stamp a new record with a fresh id and the current instant.
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        response: Value,
        status: u16,
        request_body: Option<Value>,
    ) -> Self {
        Self {
            id: next_record_id(),
            timestamp: Utc::now(),
            method: method.into(),
            url: url.into(),
            request_body,
            response,
            status,
        }
    }
}

/// `{unix_millis}-{seq}-{nonce}`.
///
/// The process-wide sequence keeps ids distinct within one millisecond; the
/// random nonce keeps separate processes (e.g. a relay and its clients) apart.
pub fn next_record_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let seq = NEXT_SEQ.fetch_add(1, Ordering::Relaxed);
    let nonce: u32 = rand::random();
    format!("{millis}-{seq:x}-{nonce:08x}")
}

/// Serialize an arbitrary payload for logging.
///
/// Never fails: a value that cannot be represented as JSON is replaced by an
/// error marker so the rest of the record is still kept.
pub fn to_payload<T: Serialize + ?Sized>(value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(v) => v,
        Err(e) => json!({
            "error": "unserializable payload",
            "detail": e.to_string(),
        }),
    }
}

/// Interpret a raw response body: JSON when it parses, otherwise the text.
pub fn body_payload(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}
