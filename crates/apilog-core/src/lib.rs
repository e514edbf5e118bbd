pub mod error;
pub mod log;
pub mod record;
pub mod redact;
pub mod store;

pub use error::{ConfigError, StorageError};
pub use log::{Appended, CallLog, Listing, Outcome};
pub use record::{DEFAULT_CAPACITY, LogRecord, body_payload, next_record_id, to_payload};
pub use redact::{REDACTED, redact_url};
pub use store::LogBackend;
