use std::sync::Arc;

use axum::body::{Body, to_bytes};
use http::{Request, StatusCode};
use serde_json::Value;
use shared::models::{NormalizedItem, SyncStatus, VendorId, VendorSyncState};
use tower::ServiceExt;

use crate::api::build_app;
use crate::core::{Config, ServerState};
use crate::db::{RedbStore, Store};
use crate::feed::testing::ScriptedFeed;
use crate::feed::{FeedConfig, VendorConfig, VendorEntry, VendorRegistry};

fn entry(id: &str, feed: Arc<ScriptedFeed>) -> VendorEntry {
    VendorEntry {
        config: VendorConfig {
            id: VendorId::from(id),
            name: id.to_uppercase(),
            trust_weight: 40,
            sync_interval_secs: None,
            feed: FeedConfig::HttpJson {
                base_url: "http://localhost".into(),
                api_key: None,
            },
        },
        feed,
    }
}

async fn state_with(feed: Arc<ScriptedFeed>) -> ServerState {
    let store: Arc<dyn Store> = Arc::new(RedbStore::open_in_memory().unwrap());
    let registry = VendorRegistry::from_entries(vec![entry("acme", feed)]).unwrap();
    ServerState::assemble(Config::with_work_dir("/tmp/unused"), store, registry)
        .await
        .unwrap()
}

async fn call(state: &ServerState, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = build_app(state.clone())
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn wait_for(state: &ServerState, status: SyncStatus) -> VendorSyncState {
    loop {
        let current = state.orchestrator.status(&VendorId::from("acme")).await.unwrap();
        if current.status == status {
            return current;
        }
        tokio::task::yield_now().await;
    }
}

fn item(sku: &str, upc: &str) -> NormalizedItem {
    NormalizedItem {
        vendor_sku: sku.into(),
        upc: upc.into(),
        name: Some(format!("Item {sku}")),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_health_reports_gate_load() {
    let state = state_with(Arc::new(ScriptedFeed::default())).await;
    let (status, body) = call(&state, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["vendors"], 1);
    assert_eq!(body["gate"]["max_concurrent"], 4);
    assert_eq!(body["gate"]["in_flight"], 0);
}

#[tokio::test]
async fn test_status_of_fresh_vendor_is_idle() {
    let state = state_with(Arc::new(ScriptedFeed::default())).await;

    let (status, body) = call(&state, "GET", "/api/vendors/sync", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["vendor_id"], "acme");
    assert_eq!(body[0]["status"], "idle");

    let (status, body) = call(&state, "GET", "/api/vendors/acme/sync", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "idle");
}

#[tokio::test]
async fn test_unknown_vendor_is_404() {
    let state = state_with(Arc::new(ScriptedFeed::default())).await;

    let (status, body) = call(&state, "GET", "/api/vendors/nobody/sync", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 4001);

    let (status, _) = call(&state, "POST", "/api/vendors/nobody/sync", Some(r#"{"strategy":"full"}"#)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_start_sync_accepts_then_conflicts_while_running() {
    let feed = Arc::new(ScriptedFeed::new(vec![vec![item("A-1", "012345678905")]]));
    let release = feed.hold();
    let state = state_with(feed).await;

    let (status, body) = call(&state, "POST", "/api/vendors/acme/sync", Some(r#"{"strategy":"full"}"#)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "in_progress");
    assert_eq!(body["strategy"], "full");

    let (status, body) = call(&state, "POST", "/api/vendors/acme/sync", Some(r#"{"strategy":"incremental"}"#)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 4002);

    release.notify_one();
    let done = wait_for(&state, SyncStatus::Completed).await;
    assert_eq!(done.last_stats.map(|s| s.created), Some(1));
}

#[tokio::test]
async fn test_start_sync_defaults_to_full_and_rejects_bad_strategy() {
    let state = state_with(Arc::new(ScriptedFeed::default())).await;

    let (status, body) = call(&state, "POST", "/api/vendors/acme/sync", Some(r#"{"strategy":"everything"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 2);

    let (status, body) = call(&state, "POST", "/api/vendors/acme/sync", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["strategy"], "full");
    wait_for(&state, SyncStatus::Completed).await;
}

#[tokio::test]
async fn test_clear_error_after_failed_job() {
    let feed = Arc::new(ScriptedFeed::default());
    feed.fail_next(crate::feed::FeedError::Authorization("401 Unauthorized".into()));
    let state = state_with(feed).await;

    let (status, _) = call(&state, "POST", "/api/vendors/acme/sync", Some(r#"{"strategy":"full"}"#)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let failed = wait_for(&state, SyncStatus::Error).await;
    assert!(failed.last_error.unwrap().contains("401"));

    let (status, body) = call(&state, "POST", "/api/vendors/acme/sync/clear-error", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "idle");
    assert_eq!(body["last_error"], Value::Null);
}

#[tokio::test]
async fn test_clear_error_while_running_is_conflict() {
    let feed = Arc::new(ScriptedFeed::default());
    let release = feed.hold();
    let state = state_with(feed).await;

    call(&state, "POST", "/api/vendors/acme/sync", None).await;
    let (status, body) = call(&state, "POST", "/api/vendors/acme/sync/clear-error", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 4003);

    release.notify_one();
    wait_for(&state, SyncStatus::Completed).await;
}
