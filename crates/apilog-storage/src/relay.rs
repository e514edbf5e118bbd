use std::time::Duration;

use apilog_core::error::{ConfigError, StorageError};
use apilog_core::record::LogRecord;
use apilog_core::store::LogBackend;
use async_trait::async_trait;
use reqwest::{Client, Response, Url};

/// Default bound on every relay round trip.
pub const DEFAULT_RELAY_TIMEOUT: Duration = Duration::from_secs(5);

/// Stateless client of an `apilog-relay` server.
///
/// Holds no records: every operation is one HTTP call to `<base>/api/logs`,
/// and the server-side backend enforces the bound.
pub struct RelayLogStore {
    client: Client,
    endpoint: Url,
    capacity: usize,
}

impl RelayLogStore {
    /// `capacity` is informational here; the server's backend decides what is kept.
    pub fn new(base_url: &str, timeout: Duration, capacity: usize) -> Result<Self, ConfigError> {
        let mut base =
            Url::parse(base_url).map_err(|e| ConfigError::Invalid(format!("relay url: {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "relay url must be http(s), got {}",
                base.scheme()
            )));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join("api/logs")
            .map_err(|e| ConfigError::Invalid(format!("relay url: {e}")))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("http client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            capacity,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn remote(e: reqwest::Error) -> StorageError {
    StorageError::Remote(e.to_string())
}

async fn check_status(response: Response) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StorageError::Remote(format!("relay returned {status}: {body}")))
}

#[async_trait]
impl LogBackend for RelayLogStore {
    async fn append(&self, record: &LogRecord) -> Result<(), StorageError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(record)
            .send()
            .await
            .map_err(remote)?;
        check_status(response).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<LogRecord>, StorageError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .send()
            .await
            .map_err(remote)?;
        check_status(response)
            .await?
            .json::<Vec<LogRecord>>()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let response = self
            .client
            .delete(self.endpoint.clone())
            .send()
            .await
            .map_err(remote)?;
        check_status(response).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "relay"
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base_path() {
        let store = RelayLogStore::new("http://127.0.0.1:3000", DEFAULT_RELAY_TIMEOUT, 100).unwrap();
        assert_eq!(store.endpoint().as_str(), "http://127.0.0.1:3000/api/logs");

        let store =
            RelayLogStore::new("https://demo.test/presales", DEFAULT_RELAY_TIMEOUT, 100).unwrap();
        assert_eq!(store.endpoint().as_str(), "https://demo.test/presales/api/logs");
    }

    #[test]
    fn test_rejects_bad_urls() {
        assert!(matches!(
            RelayLogStore::new("not a url", DEFAULT_RELAY_TIMEOUT, 100),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RelayLogStore::new("ftp://relay.test", DEFAULT_RELAY_TIMEOUT, 100),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_relay_is_a_remote_error() {
        // Nothing listens on the discard port.
        let store =
            RelayLogStore::new("http://127.0.0.1:9", Duration::from_millis(500), 100).unwrap();
        assert!(matches!(store.list().await, Err(StorageError::Remote(_))));
        assert!(matches!(store.clear().await, Err(StorageError::Remote(_))));
    }
}
