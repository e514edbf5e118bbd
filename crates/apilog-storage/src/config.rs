use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use apilog_core::error::ConfigError;
use apilog_core::record::DEFAULT_CAPACITY;
use apilog_core::store::LogBackend;
use tracing::info;

use crate::embedded::EmbeddedLogStore;
use crate::file::FileLogStore;
use crate::memory::MemoryLogStore;
use crate::relay::{DEFAULT_RELAY_TIMEOUT, RelayLogStore};
use crate::sqlite::SqliteLogStore;

/// File name of the JSON store inside the data directory.
pub const LOG_FILE_NAME: &str = "api-logs.json";
/// Directory of the embedded database inside the data directory.
pub const EMBEDDED_DIR_NAME: &str = "api-logs.db";

/// Which persistence strategy backs the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Memory,
    File,
    Embedded,
    Relay,
    Sqlite,
}

impl BackendKind {
    pub const ALL: [BackendKind; 5] = [
        Self::Memory,
        Self::File,
        Self::Embedded,
        Self::Relay,
        Self::Sqlite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::File => "file",
            Self::Embedded => "embedded",
            Self::Relay => "relay",
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::Invalid(format!("unknown backend {s:?}")))
    }
}

/// Everything needed to build a backend at start-up.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub kind: BackendKind,
    pub capacity: usize,
    /// Home of the file and embedded stores.
    pub data_dir: PathBuf,
    /// Base URL of an `apilog-relay` server (relay backend).
    pub relay_url: Option<String>,
    /// Database file of the relational store.
    pub database: Option<PathBuf>,
    /// Bound on each relay round trip.
    pub timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            capacity: DEFAULT_CAPACITY,
            data_dir: PathBuf::from("."),
            relay_url: None,
            database: None,
            timeout: DEFAULT_RELAY_TIMEOUT,
        }
    }
}

/// Build the configured backend once, at process start.
///
/// Every misconfiguration surfaces here, never later as lost records.
pub fn open_backend(config: &StoreConfig) -> Result<Arc<dyn LogBackend>, ConfigError> {
    if config.capacity == 0 {
        return Err(ConfigError::Invalid("capacity must be at least 1".into()));
    }

    let backend: Arc<dyn LogBackend> = match config.kind {
        BackendKind::Memory => Arc::new(MemoryLogStore::new(config.capacity)),
        BackendKind::File => Arc::new(FileLogStore::open(
            config.data_dir.join(LOG_FILE_NAME),
            config.capacity,
        )?),
        BackendKind::Embedded => {
            std::fs::create_dir_all(&config.data_dir)
                .map_err(|e| ConfigError::Invalid(format!("data dir: {e}")))?;
            Arc::new(EmbeddedLogStore::open(
                config.data_dir.join(EMBEDDED_DIR_NAME),
                config.capacity,
            )?)
        }
        BackendKind::Relay => {
            let url = config
                .relay_url
                .as_deref()
                .ok_or(ConfigError::Missing("relay url"))?;
            Arc::new(RelayLogStore::new(url, config.timeout, config.capacity)?)
        }
        BackendKind::Sqlite => {
            let database = config
                .database
                .as_ref()
                .ok_or(ConfigError::Missing("database path"))?;
            Arc::new(SqliteLogStore::open(database, config.capacity)?)
        }
    };

    info!(
        backend = backend.name(),
        capacity = backend.capacity(),
        "api call log ready"
    );
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parses_case_insensitively() {
        assert_eq!("SQLite".parse::<BackendKind>().unwrap(), BackendKind::Sqlite);
        assert_eq!("embedded".parse::<BackendKind>().unwrap(), BackendKind::Embedded);
        assert!("postgres".parse::<BackendKind>().is_err());
        for kind in BackendKind::ALL {
            assert_eq!(kind.to_string().parse::<BackendKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_missing_remote_settings_fail_fast() {
        let relay = StoreConfig {
            kind: BackendKind::Relay,
            ..StoreConfig::default()
        };
        assert!(matches!(
            open_backend(&relay),
            Err(ConfigError::Missing("relay url"))
        ));

        let sqlite = StoreConfig {
            kind: BackendKind::Sqlite,
            ..StoreConfig::default()
        };
        assert!(matches!(
            open_backend(&sqlite),
            Err(ConfigError::Missing("database path"))
        ));
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let config = StoreConfig {
            capacity: 0,
            ..StoreConfig::default()
        };
        assert!(matches!(open_backend(&config), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_builds_each_local_backend() {
        let dir = tempfile::tempdir().unwrap();
        for kind in [
            BackendKind::Memory,
            BackendKind::File,
            BackendKind::Embedded,
            BackendKind::Sqlite,
        ] {
            let config = StoreConfig {
                kind,
                data_dir: dir.path().join("data"),
                database: Some(dir.path().join("logs.sqlite3")),
                ..StoreConfig::default()
            };
            let backend = open_backend(&config).unwrap();
            assert_eq!(backend.name(), kind.as_str());
            assert_eq!(backend.capacity(), DEFAULT_CAPACITY);
        }
    }
}
