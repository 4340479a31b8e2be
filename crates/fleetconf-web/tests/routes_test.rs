//! Admin API tests driven through the router with `oneshot`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use fleetconf_core::{
    BoundedLogQueue, ConfigError, LogSink, MemorySnapshotStore, RestartRequester, SnapshotStore,
    StorageKeys,
};
use fleetconf_web::{create_router, AgentState, ReconcileStatistics, TriggerSource};
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use tower::ServiceExt;

#[derive(Default)]
struct CountingRestart(AtomicUsize);

impl RestartRequester for CountingRestart {
    fn request(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Store whose reads always fail.
struct BrokenStore;

impl SnapshotStore for BrokenStore {
    fn read(&self, key: &str) -> Result<Option<String>, ConfigError> {
        Err(ConfigError::local_store(key, "flash read error"))
    }

    fn write(&self, key: &str, _text: &str) -> Result<(), ConfigError> {
        Err(ConfigError::persist(key, "flash write error"))
    }

    fn delete(&self, key: &str) -> Result<(), ConfigError> {
        Err(ConfigError::persist(key, "flash erase error"))
    }
}

struct Harness {
    app: Router,
    store: Arc<MemorySnapshotStore>,
    restart: Arc<CountingRestart>,
    logs: Arc<BoundedLogQueue>,
    triggers: mpsc::Receiver<TriggerSource>,
}

fn harness_with(store: Arc<dyn SnapshotStore>, memory: Arc<MemorySnapshotStore>) -> Harness {
    let (tx, rx) = mpsc::channel(1);
    let restart = Arc::new(CountingRestart::default());
    let logs = Arc::new(BoundedLogQueue::new(4));
    let state = Arc::new(AgentState {
        store,
        keys: StorageKeys::default(),
        trigger: tx,
        restart: restart.clone(),
        stats: Arc::new(ReconcileStatistics::new()),
        logs: logs.clone(),
    });
    Harness {
        app: create_router(state),
        store: memory,
        restart,
        logs,
        triggers: rx,
    }
}

fn harness() -> Harness {
    let store = Arc::new(MemorySnapshotStore::new());
    harness_with(store.clone(), store)
}

async fn send(app: &Router, method: Method, uri: &str, body: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

// ============================================================================
// Stored documents
// ============================================================================

#[tokio::test]
async fn test_show_absent_document_is_404() {
    let h = harness();
    let (status, _) = send(&h.app, Method::GET, "/config/effective", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_show_unknown_document_is_404() {
    let h = harness();
    let (status, _) = send(&h.app, Method::GET, "/config/secrets", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_show_returns_stored_text() {
    let h = harness();
    h.store.write("config-remote.json", r#"{"b":1,"a":2}"#).unwrap();

    let (status, body) = send(&h.app, Method::GET, "/config/remote", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"b":1,"a":2}"#);

    let (status, body) = send(&h.app, Method::GET, "/config/remote?pretty=true", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "{\n  \"b\": 1,\n  \"a\": 2\n}");
}

#[tokio::test]
async fn test_show_unreadable_is_500() {
    let memory = Arc::new(MemorySnapshotStore::new());
    let h = harness_with(Arc::new(BrokenStore), memory);
    let (status, body) = send(&h.app, Method::GET, "/config/bootstrap", "").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("flash read error"));
}

#[tokio::test]
async fn test_put_bootstrap_stores_canonical_form() {
    let h = harness();
    let (status, _) = send(
        &h.app,
        Method::PUT,
        "/config/bootstrap",
        "{ \"ssid\" : \"farm\",\n  \"mode\": \"ap\" }",
    )
    .await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(
        h.store.read("config-bootstrap.json").unwrap().as_deref(),
        Some(r#"{"ssid":"farm","mode":"ap"}"#)
    );
}

#[tokio::test]
async fn test_put_bootstrap_rejects_bad_bodies() {
    let h = harness();

    let (status, _) = send(&h.app, Method::PUT, "/config/bootstrap", "{\"ssid\":").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&h.app, Method::PUT, "/config/bootstrap", "[1,2]").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let large = format!(r#"{{"blob":"{}"}}"#, "x".repeat(5000));
    let (status, body) = send(&h.app, Method::PUT, "/config/bootstrap", &large).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body, "Too large");

    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_put_other_documents_not_allowed() {
    let h = harness();
    let (status, _) = send(&h.app, Method::PUT, "/config/effective", "{}").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let h = harness();
    h.store.write("config.json", "{}").unwrap();

    let (status, _) = send(&h.app, Method::DELETE, "/config/effective", "").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&h.app, Method::DELETE, "/config/effective", "").await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert_eq!(h.store.read("config.json").unwrap(), None);
}

// ============================================================================
// Reconcile trigger
// ============================================================================

#[tokio::test]
async fn test_reconcile_trigger_queues_admin_run() {
    let mut h = harness();
    let (status, _) = send(&h.app, Method::POST, "/config/reconcile", "").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(h.triggers.try_recv().unwrap(), TriggerSource::Admin);

    // Pending run already queued: still accepted, not queued twice.
    send(&h.app, Method::POST, "/config/reconcile", "").await;
    let (status, _) = send(&h.app, Method::POST, "/config/reconcile", "").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(h.triggers.try_recv().is_ok());
    assert!(h.triggers.try_recv().is_err());
}

#[tokio::test]
async fn test_reconcile_without_scheduler_is_503() {
    let h = harness();
    drop(h.triggers);
    let (status, _) = send(&h.app, Method::POST, "/config/reconcile", "").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

// ============================================================================
// Device
// ============================================================================

#[tokio::test]
async fn test_restart_requests_once_per_call() {
    let h = harness();
    let (status, _) = send(&h.app, Method::PUT, "/device/restart", "").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(h.restart.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_status_reports_counters() {
    let h = harness();
    for line in ["a", "b", "c", "d", "e"] {
        h.logs.append(line);
    }

    let (status, body) = send(&h.app, Method::GET, "/device/status", "").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["runs"], 0);
    assert_eq!(json["lastRun"], serde_json::Value::Null);
    assert_eq!(json["droppedLogEntries"], 1);
}

#[tokio::test]
async fn test_logs_drained_in_order() {
    let h = harness();
    h.logs.append("INFO fleetconf: first");
    h.logs.append("WARN fleetconf: second");

    let (status, body) = send(&h.app, Method::GET, "/device/logs", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        r#"{"entries":["INFO fleetconf: first","WARN fleetconf: second"],"dropped":0}"#
    );

    let (_, body) = send(&h.app, Method::GET, "/device/logs", "").await;
    assert_eq!(body, r#"{"entries":[],"dropped":0}"#);
}
