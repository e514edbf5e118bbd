use std::sync::Arc;
use std::time::Duration;

use apilog_core::{CallLog, LogBackend};
use apilog_storage::{MemoryLogStore, RelayLogStore};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct RunningRelay {
    base_url: String,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<anyhow::Result<()>>,
}

async fn start_relay(backend: Arc<dyn LogBackend>) -> RunningRelay {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let (shutdown, shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(apilog_relay::serve_on(listener, backend, async {
        shutdown_rx.await.ok();
    }));
    RunningRelay {
        base_url,
        shutdown,
        handle,
    }
}

fn client(base_url: &str) -> CallLog {
    let store = RelayLogStore::new(base_url, Duration::from_secs(2), 3).unwrap();
    CallLog::new(Arc::new(store))
}

#[tokio::test]
async fn test_relay_forwards_append_list_clear() {
    let relay = start_relay(Arc::new(MemoryLogStore::new(3))).await;
    let log = client(&relay.base_url);

    let mut appended = Vec::new();
    for (method, path, status) in [
        ("GET", "a", 200),
        ("POST", "b", 201),
        ("PUT", "c", 200),
        ("DELETE", "d", 204),
    ] {
        let url = format!("https://api.test/{path}");
        let result = log
            .append(method, &url, json!({"path": path}), status, Some(json!({"n": 1})))
            .await;
        assert!(result.outcome.is_stored(), "{}", result.outcome);
        appended.push(result.record);
    }

    // The server's backend applied the bound; records survive the wire intact.
    assert_eq!(log.list().await, appended[1..]);

    assert!(log.clear().await.is_stored());
    assert!(log.clear().await.is_stored());
    assert!(log.list().await.is_empty());

    drop(log);
    relay.shutdown.send(()).ok();
    relay.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_two_clients_share_one_log() {
    let relay = start_relay(Arc::new(MemoryLogStore::new(10))).await;
    let first = client(&relay.base_url);
    let second = client(&relay.base_url);

    first
        .append("GET", "https://api.test/one", json!(null), 200, None)
        .await;
    second
        .append("GET", "https://api.test/two", json!(null), 200, None)
        .await;

    let urls: Vec<String> = first.list().await.into_iter().map(|r| r.url).collect();
    assert_eq!(urls, ["https://api.test/one", "https://api.test/two"]);

    relay.shutdown.send(()).ok();
}

#[tokio::test]
async fn test_unreachable_relay_never_fails_the_caller() {
    let relay = start_relay(Arc::new(MemoryLogStore::new(10))).await;
    let base_url = relay.base_url.clone();
    relay.shutdown.send(()).ok();
    relay.handle.await.unwrap().unwrap();

    let log = client(&base_url);
    let result = log
        .append("POST", "https://api.test/charge", json!({"id": "ch_1"}), 201, None)
        .await;
    assert!(!result.outcome.is_stored());
    assert_eq!(result.record.status, 201);

    let listing = log.read().await;
    assert!(listing.records.is_empty());
    assert!(!listing.outcome.is_stored());
    assert!(!log.clear().await.is_stored());

    // Appends keep working once a relay is back on a fresh port.
    let relay = start_relay(Arc::new(MemoryLogStore::new(10))).await;
    let log = client(&relay.base_url);
    assert!(
        log.append("GET", "https://api.test/again", json!(null), 200, None)
            .await
            .outcome
            .is_stored()
    );
    assert_eq!(log.list().await.len(), 1);
    relay.shutdown.send(()).ok();
}
