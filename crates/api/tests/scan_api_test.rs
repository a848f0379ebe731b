use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use scanner_api::{create_routes, AppState};
use scanner_core::ApiConfig;
use scanner_domain::services::ScanService;
use scanner_testing_utils::{InMemoryScanStore, ScanBuilder, ScriptedWorkUnit};
use scanner_worker::{InlineExecutor, JobExecutor, SteppedWorkUnit, WorkUnit};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use uuid::Uuid;

fn create_test_app(work_unit: Arc<dyn WorkUnit>) -> (Router, InMemoryScanStore) {
    let store = InMemoryScanStore::new();
    let scans = Arc::new(ScanService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
    ));
    let executor = Arc::new(JobExecutor::new(Arc::new(store.clone()), work_unit));
    let inline = Arc::new(InlineExecutor::new(executor, CancellationToken::new()));

    let state = AppState {
        scans,
        inline,
        api: Arc::new(ApiConfig::default()),
    };
    (create_routes(state), store)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_scan(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = create_test_app(Arc::new(ScriptedWorkUnit::succeeding()));
    let (status, body) = send(&app, get("/healthz")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"]["status"], "ok");
}

#[tokio::test]
async fn test_health_check_reports_unavailable_store() {
    let (app, store) = create_test_app(Arc::new(ScriptedWorkUnit::succeeding()));
    store.set_unhealthy(true);

    let (status, body) = send(&app, get("/healthz")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"]["status"], "unavailable");
}

#[tokio::test]
async fn test_enqueue_returns_accepted_and_status_is_queued() {
    let (app, store) = create_test_app(Arc::new(ScriptedWorkUnit::succeeding()));

    let (status, body) = send(
        &app,
        post_scan("/scan", json!({ "url": "https://example.com/page" })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let scan_id: Uuid = body["scan_id"].as_str().unwrap().parse().unwrap();
    assert_eq!(store.scan_count(), 1);

    let (status, body) = send(&app, get(&format!("/scans/{scan_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], scan_id.to_string());
    assert_eq!(body["status"], "queued");
    assert_eq!(body["progress"], 0.0);
}

#[tokio::test]
async fn test_invalid_target_is_bad_request() {
    let (app, store) = create_test_app(Arc::new(ScriptedWorkUnit::succeeding()));

    for url in ["", "not a url", "ftp://example.com/file"] {
        let (status, body) = send(&app, post_scan("/scan", json!({ "url": url }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "url: {url}");
        assert_eq!(body["success"], false);
    }
    assert_eq!(store.scan_count(), 0);
}

#[tokio::test]
async fn test_unknown_scan_is_not_found() {
    let (app, _) = create_test_app(Arc::new(ScriptedWorkUnit::succeeding()));

    let (status, body) = send(&app, get(&format!("/scans/{}", Uuid::new_v4()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "SCAN_NOT_FOUND");
}

#[tokio::test(start_paused = true)]
async fn test_wait_runs_scan_inline() {
    let (app, _) = create_test_app(Arc::new(SteppedWorkUnit::new(4, Duration::from_millis(150))));

    let (status, body) = send(
        &app,
        post_scan("/scan?wait=true", json!({ "url": "https://example.com/page" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["progress"], 1.0);
}

#[tokio::test(start_paused = true)]
async fn test_wait_timeout_is_gateway_timeout_and_scan_failed() {
    let (app, store) = create_test_app(Arc::new(ScriptedWorkUnit::hanging()));

    let (status, body) = send(
        &app,
        post_scan(
            "/scan?wait=true&timeout=1",
            json!({ "url": "https://example.com/page" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"]["code"], "SCAN_TIMEOUT");

    assert_eq!(store.count_with_status(scanner_domain::ScanStatus::Failed), 1);
}

#[tokio::test]
async fn test_scan_details_include_failure_reason() {
    let (app, store) = create_test_app(Arc::new(ScriptedWorkUnit::succeeding()));
    let (scan, job) = ScanBuilder::new().failed(0.5, "目标不可达").build();
    let scan_id = scan.id;
    store.seed(scan, job);

    let (status, body) = send(&app, get(&format!("/scans/{scan_id}/details"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "failed");
    assert_eq!(body["progress"], 0.5);
    assert_eq!(body["attempts"], 1);
    assert_eq!(body["last_error"], "目标不可达");
}
