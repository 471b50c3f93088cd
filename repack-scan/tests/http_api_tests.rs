//! HTTP Server & Routing Integration Tests

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use helpers::*;
use http_body_util::BodyExt;
use repack_scan::{build_router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_app(svc: &TestService) -> Router {
    build_router(AppState::new(svc.handle.clone(), svc.event_bus.clone()))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn test_health_reports_module_and_version() {
    let svc = start_default_service();
    let app = test_app(&svc);

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "repack-scan");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_scan_lifecycle_over_http() {
    let svc = start_default_service();
    let app = test_app(&svc);

    let (status, body) = send(&app, "POST", "/scan/start", Some(json!({"path": "/books"}))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(body["session_id"].is_string());

    // Second start conflicts
    let (status, body) = send(&app, "POST", "/scan/start", Some(json!({"path": "/books"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_STATE");

    svc.scan.progress(1);
    svc.scan.result(unsupported("/books/b.rar5"));
    svc.scan.progress(2);
    svc.scan.result(supported("/books/a.cbz"));
    svc.scan.complete();

    let (status, body) = send(&app, "GET", "/scan/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["status"], "Idle");
    assert_eq!(body["session"]["scanned_count"], 2);
    assert_eq!(body["session"]["unsupported_count"], 1);

    let (status, body) = send(&app, "GET", "/results?actionable=true", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"].as_array().unwrap().len(), 1);
    assert_eq!(body["results"][0]["path"], "/books/b.rar5");
    assert_eq!(body["results"][0]["info"]["file_type"], "Rar5");
}

#[tokio::test]
async fn test_start_without_body_or_folder_conflicts() {
    let svc = start_default_service();
    let app = test_app(&svc);

    let (status, _) = send(&app, "POST", "/scan/start", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_engine_failure_maps_to_bad_gateway() {
    let svc = start_default_service();
    let app = test_app(&svc);
    svc.scan.fail_next_start("7zz not installed");

    let (status, body) = send(&app, "POST", "/scan/start", Some(json!({"path": "/books"}))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "ENGINE_FAILURE");

    let (_, health) = send(&app, "GET", "/health", None).await;
    assert_eq!(health["last_error"], "7zz not installed");
}

#[tokio::test]
async fn test_cancel_when_idle_is_not_an_error() {
    let svc = start_default_service();
    let app = test_app(&svc);

    let (status, body) = send(&app, "POST", "/scan/cancel", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancel_requested"], false);
}

#[tokio::test]
async fn test_convert_status_codes() {
    let svc = start_default_service();
    let app = test_app(&svc);
    svc.handle.start_scan(Some("/books".to_string())).await.unwrap();
    svc.scan.result(unsupported("/books/b.rar5"));
    svc.scan.result(supported("/books/a.cbz"));
    svc.scan.complete();

    let (status, body) = send(&app, "POST", "/convert", Some(json!({"path": "/books/missing.cbr"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = send(&app, "POST", "/convert", Some(json!({"path": "/books/a.cbz"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, "POST", "/convert", Some(json!({"path": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "POST", "/convert", Some(json!({"path": "/books/b.rar5"}))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["path"], "/books/b.rar5");
}

#[tokio::test]
async fn test_convert_all_returns_batch_size() {
    let svc = start_default_service();
    let app = test_app(&svc);
    let mut events = svc.event_bus.subscribe();
    svc.handle.start_scan(Some("/books".to_string())).await.unwrap();
    svc.scan.result(unsupported("/books/b1.rar5"));
    svc.scan.result(unsupported("/books/b2.rar5"));
    svc.scan.complete();

    let (status, body) = send(&app, "POST", "/convert/all", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["total"], 2);

    let finished = wait_for_event(&mut events, |e| {
        matches!(e, repack_common::events::RepackEvent::BatchFinished { .. })
    })
    .await;
    match finished {
        repack_common::events::RepackEvent::BatchFinished { converted, .. } => assert_eq!(converted, 2),
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_folder_selection_validates_path() {
    let library = tempfile::TempDir::new().unwrap();
    let file = library.path().join("a.cbr");
    std::fs::write(&file, b"x").unwrap();

    let svc = start_default_service();
    let app = test_app(&svc);

    let missing = library.path().join("nope");
    let (status, _) = send(&app, "POST", "/folder", Some(json!({"path": missing}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "POST", "/folder", Some(json!({"path": file}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/folder", Some(json!({"path": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "POST", "/folder", Some(json!({"path": library.path()}))).await;
    assert_eq!(status, StatusCode::OK);
    let canonical = library.path().canonicalize().unwrap();
    assert_eq!(body["path"], json!(canonical));
}

#[tokio::test]
async fn test_filter_toggle_round_trip() {
    let svc = start_default_service();
    let app = test_app(&svc);

    let (status, body) = send(
        &app,
        "PUT",
        "/results/filter",
        Some(json!({"show_only_actionable": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["show_only_actionable"], true);

    let (_, body) = send(&app, "GET", "/results", None).await;
    assert_eq!(body["show_only_actionable"], true);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let svc = start_default_service();
    let app = test_app(&svc);

    let (status, _) = send(&app, "GET", "/nonexistent", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
