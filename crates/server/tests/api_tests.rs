//! HTTP API tests, driven in-process through the router.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use domsentry_server::store::MemoryStore;
use domsentry_server::{router, AppState, SharedState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn state() -> SharedState {
    AppState::new(Arc::new(MemoryStore::new()), "memory", Some("domsentry@self".into()))
}

async fn send(state: &SharedState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn message(state: &SharedState, body: Value) -> (StatusCode, Value) {
    send(state, "POST", "/api/message", Some(body)).await
}

#[tokio::test]
async fn test_health_reports_ok() {
    let state = state();
    let (status, body) = send(&state, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"]["backend"], "memory");
}

#[tokio::test]
async fn test_page_mutation_then_get_alerts() {
    let state = state();
    let (status, body) = message(
        &state,
        json!({
            "type": "pageMutation",
            "payload": {
                "url": "https://example.com/",
                "hostname": "example.com",
                "timestamp": 1_704_500_000_000_i64,
                "level": "medium",
                "reasons": ["Scripts were injected into the page."],
                "counts": {"added": 1}
            }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true}));

    let (_, body) = message(&state, json!({"type": "getAlerts"})).await;
    let alerts = body["alerts"].as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["level"], "medium");
    assert_eq!(alerts[0]["counts"]["added"], 1);
    assert_eq!(alerts[0]["title"], "example.com");
    assert!(alerts[0]["security"]["urlChanges"].is_array());

    let (_, body) = send(&state, "GET", "/api/alerts", None).await;
    assert_eq!(body["alerts"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_set_and_clear_alerts() {
    let state = state();
    let (_, body) = message(
        &state,
        json!({"type": "setAlerts", "alerts": [{"url": "https://a.test/"}, {"url": "https://b.test/"}]}),
    )
    .await;
    assert_eq!(body["ok"], true);

    let (_, badge) = send(&state, "GET", "/api/badge", None).await;
    assert_eq!(badge, json!({"text": "!", "color": "#D97706"}));

    message(&state, json!({"type": "clearAlerts"})).await;
    let (_, body) = message(&state, json!({"type": "getAlerts"})).await;
    assert_eq!(body["alerts"], json!([]));

    let (_, badge) = message(&state, json!({"type": "getBadge"})).await;
    assert_eq!(badge["text"], "");
}

#[tokio::test]
async fn test_unknown_and_malformed_messages_rejected() {
    let state = state();
    let (status, body) = message(&state, json!({"type": "selfDestruct"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("unknown_message_type"));

    let (status, body) = message(&state, json!({"type": "extensionInstalled"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("invalid_message"));
}

#[tokio::test]
async fn test_inventory_lifecycle_drives_badge() {
    let state = state();
    let ext = |id: &str, name: &str| {
        json!({"id": id, "name": name, "type": "extension", "enabled": true,
               "hostPermissions": ["moz-extension://abc/*"]})
    };

    // first sync: nothing is new
    let (_, body) = message(
        &state,
        json!({"type": "getList", "sync": true, "extensions": [ext("b", "Beta"), ext("a", "Alpha"), ext("domsentry@self", "Self")]}),
    )
    .await;
    assert_eq!(body["newCount"], 0);
    let names: Vec<_> = body["extensions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Alpha", "Beta"]);

    message(&state, json!({"type": "extensionInstalled", "extension": ext("c", "Gamma")})).await;
    let (_, badge) = message(&state, json!({"type": "getBadge"})).await;
    assert_eq!(badge, json!({"text": "1", "color": "#E76F51"}));

    message(&state, json!({"type": "clearNew"})).await;
    message(&state, json!({"type": "extensionUninstalled", "id": "a"})).await;
    let (_, body) = message(&state, json!({"type": "getList"})).await;
    assert_eq!(body["newCount"], 0);
    assert_eq!(body["extensions"].as_array().unwrap().len(), 2);
}
