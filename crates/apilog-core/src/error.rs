use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to open storage: {0}")]
    Open(String),
    #[error("failed to write: {0}")]
    Write(String),
    #[error("failed to read: {0}")]
    Read(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("remote store error: {0}")]
    Remote(String),
}

/// Raised while building a backend. Unlike [`StorageError`], these are fatal:
/// a misconfigured store must fail at start-up instead of silently dropping
/// records later.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error(transparent)]
    Open(#[from] StorageError),
}
