mod config;
mod embedded;
mod file;
mod memory;
mod relay;
mod sqlite;

pub use config::{BackendKind, EMBEDDED_DIR_NAME, LOG_FILE_NAME, StoreConfig, open_backend};
pub use embedded::{EMBEDDED_FORMAT_VERSION, EmbeddedLogStore};
pub use file::{FILE_FORMAT_VERSION, FileLogStore};
pub use memory::MemoryLogStore;
pub use relay::{DEFAULT_RELAY_TIMEOUT, RelayLogStore};
pub use sqlite::{SQLITE_SCHEMA_VERSION, SqliteLogStore};
