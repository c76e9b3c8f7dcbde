//! Integration tests for API routes.
//!
//! Uses `tower::ServiceExt` to test Axum routes without a real HTTP server,
//! backed by the in-memory queue store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use serde_json::{Value, json};
use tower::ServiceExt;

use courier_api::routes::create_router;
use courier_api::state::AppState;
use courier_common::config::AppConfig;
use courier_common::types::{Message, Payload};
use courier_notifier::{MemoryQueueStore, QueueStore};

// ============================================================
// Helpers
// ============================================================

fn test_config() -> AppConfig {
    AppConfig::from_lookup(|key| match key {
        "NOTIFIER_MAIN_QUEUE" => Some("api:notifications".to_string()),
        "NOTIFIER_DLQ" => Some("api:notifications:dlq".to_string()),
        _ => None,
    })
    .unwrap()
}

fn build_test_state() -> (AppState, Arc<MemoryQueueStore>) {
    let store = Arc::new(MemoryQueueStore::new());
    (AppState::new(store.clone(), test_config()), store)
}

async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn seed_dead_letters(state: &AppState, ids: &[&str]) {
    for id in ids {
        let mut message = Message::new(*id, Payload::new());
        message.attempt_count = 3;
        state
            .dead_letters
            .send_to_dead_letter(message, "webhook down")
            .await
            .unwrap();
    }
}

// ============================================================
// Routes
// ============================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (state, store) = build_test_state();
    store.push_tail("api:notifications", "{}").await.unwrap();

    let response = create_router(state).oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "courier-api");
    assert_eq!(json["queues"]["api:notifications"], 1);
    assert_eq!(json["queues"]["api:notifications:dlq"], 0);
}

#[tokio::test]
async fn test_enqueue_notification() {
    let (state, store) = build_test_state();

    let response = create_router(state)
        .oneshot(post_json(
            "/api/notifications",
            json!({
                "id": "n-1",
                "tenantId": "tenant-1",
                "userId": "host-1",
                "data": {"mobileNumber": "+15550100", "customMessage": "Meeting at 10"}
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["id"], "n-1");
    assert_eq!(json["depth"], 1);

    let items = store.items("api:notifications").await;
    let queued: Message = serde_json::from_str(&items[0]).unwrap();
    assert_eq!(queued.id, "n-1");
    assert_eq!(queued.attempt_count, 0);
    assert_eq!(queued.payload.get("tenantId"), Some(&json!("tenant-1")));
    assert_eq!(queued.payload.get("data").unwrap()["mobileNumber"], "+15550100");
}

#[tokio::test]
async fn test_enqueue_generates_id() {
    let (state, _) = build_test_state();

    let response = create_router(state)
        .oneshot(post_json("/api/notifications", json!({"data": {}})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(!json["id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_enqueue_rejects_non_object_data() {
    let (state, store) = build_test_state();

    let response = create_router(state)
        .oneshot(post_json("/api/notifications", json!({"data": "hello"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.len("api:notifications").await.unwrap(), 0);
}

#[tokio::test]
async fn test_list_dead_letters() {
    let (state, _) = build_test_state();
    seed_dead_letters(&state, &["a", "b", "c"]).await;

    let response = create_router(state)
        .oneshot(get("/api/dlq?limit=2"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["size"], 3);
    let entries = json["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["originalMessage"]["id"], "a");
    assert_eq!(entries[0]["reason"], "webhook down");
}

#[tokio::test]
async fn test_replay_dead_letters() {
    let (state, store) = build_test_state();
    seed_dead_letters(&state, &["a", "b", "c"]).await;

    let response = create_router(state.clone())
        .oneshot(post_json("/api/dlq/replay", json!({"count": 2})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["replayed"], 2);
    assert_eq!(store.len("api:notifications:dlq").await.unwrap(), 1);

    let replayed: Vec<Message> = store
        .items("api:notifications")
        .await
        .iter()
        .map(|raw| serde_json::from_str(raw).unwrap())
        .collect();
    assert_eq!(replayed[0].id, "a");
    assert_eq!(replayed[1].id, "b");
    assert!(replayed.iter().all(|m| m.attempt_count == 0));
}

#[tokio::test]
async fn test_replay_more_than_available() {
    let (state, _) = build_test_state();
    seed_dead_letters(&state, &["only"]).await;

    let response = create_router(state)
        .oneshot(post_json("/api/dlq/replay", json!({"count": 10})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["replayed"], 1);
}

#[tokio::test]
async fn test_replay_defaults_to_one() {
    let (state, store) = build_test_state();
    seed_dead_letters(&state, &["a", "b"]).await;

    let response = create_router(state)
        .oneshot(post_json("/api/dlq/replay", json!({})))
        .await
        .unwrap();

    assert_eq!(body_json(response).await["replayed"], 1);
    assert_eq!(store.len("api:notifications:dlq").await.unwrap(), 1);
}

#[tokio::test]
async fn test_replay_rejects_invalid_count() {
    let (state, store) = build_test_state();
    seed_dead_letters(&state, &["a"]).await;

    for count in [0, -3] {
        let response = create_router(state.clone())
            .oneshot(post_json("/api/dlq/replay", json!({"count": count})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
    assert_eq!(store.len("api:notifications:dlq").await.unwrap(), 1);
}

#[tokio::test]
async fn test_replay_large_count_over_unreadable_entry() {
    let (state, store) = build_test_state();
    store
        .push_tail("api:notifications:dlq", "{garbage")
        .await
        .unwrap();
    seed_dead_letters(&state, &["a"]).await;

    let response = create_router(state)
        .oneshot(post_json("/api/dlq/replay", json!({"count": 1_000_000})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["replayed"], 1);
    assert_eq!(
        store.items("api:notifications:dlq").await,
        vec!["{garbage".to_string()]
    );
    assert_eq!(store.len("api:notifications").await.unwrap(), 1);
}
