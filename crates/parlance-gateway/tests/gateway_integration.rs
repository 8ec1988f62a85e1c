//! End-to-end tests for the gateway over a live server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use parlance_engine::SessionEngine;
use parlance_gateway::GatewayServer;
use parlance_store::MemoryStore;

async fn start_test_server() -> String {
    let store = Arc::new(MemoryStore::new());
    let engine = Arc::new(SessionEngine::new(store.clone(), store));
    let app = GatewayServer::build(engine);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let addr_str = format!("127.0.0.1:{}", addr.port());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Small yield to let the server task start
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    addr_str
}

async fn create_session(addr: &str, body: serde_json::Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://{addr}/sessions"))
        .json(&body)
        .send()
        .await
        .unwrap()
}

async fn add_event(addr: &str, session_id: &str, body: serde_json::Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://{addr}/sessions/{session_id}/events"))
        .json(&body)
        .send()
        .await
        .unwrap()
}

fn content_type(resp: &reqwest::Response) -> String {
    resp.headers()
        .get("content-type")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

// --- Health ---

#[tokio::test]
async fn test_health_endpoint() {
    let addr = start_test_server().await;
    let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = serde_json::from_str(&resp.text().await.unwrap()).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "parlance");
}

// --- Content type ---

#[tokio::test]
async fn test_responses_carry_json_content_type() {
    let addr = start_test_server().await;

    let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(content_type(&resp), "application/json");

    let resp = create_session(
        &addr,
        serde_json::json!({"sessionId": "call-1", "language": "en"}),
    )
    .await;
    assert_eq!(resp.status(), 200);
    assert_eq!(content_type(&resp), "application/json");

    // Error replies are JSON as well.
    let resp = reqwest::get(format!("http://{addr}/sessions/ghost")).await.unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(content_type(&resp), "application/json");

    let resp = create_session(
        &addr,
        serde_json::json!({"sessionId": "", "language": "en"}),
    )
    .await;
    assert_eq!(resp.status(), 400);
    assert_eq!(content_type(&resp), "application/json");
}

// --- Session creation ---

#[tokio::test]
async fn test_create_session_returns_wire_shape() {
    let addr = start_test_server().await;
    let resp = create_session(
        &addr,
        serde_json::json!({"sessionId": "call-1", "language": "en"}),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["sessionId"], "call-1");
    assert_eq!(body["status"], "initiated");
    assert_eq!(body["language"], "en");
    assert!(body["startedAt"].is_string());
    assert!(body["endedAt"].is_null());
    assert_eq!(body["metadata"], serde_json::json!({}));
}

#[tokio::test]
async fn test_create_session_with_status_and_metadata() {
    let addr = start_test_server().await;
    let resp = create_session(
        &addr,
        serde_json::json!({
            "sessionId": "call-1",
            "language": "es-AR",
            "status": "active",
            "metadata": {"campaign": "q3-renewals"}
        }),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "active");
    assert_eq!(body["metadata"]["campaign"], "q3-renewals");
}

#[tokio::test]
async fn test_create_session_is_idempotent() {
    let addr = start_test_server().await;
    create_session(
        &addr,
        serde_json::json!({"sessionId": "call-1", "language": "en"}),
    )
    .await;

    let resp = create_session(
        &addr,
        serde_json::json!({"sessionId": "call-1", "language": "fr", "status": "active"}),
    )
    .await;
    assert_eq!(resp.status(), 200);

    // The original record wins.
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["language"], "en");
    assert_eq!(body["status"], "initiated");
}

#[tokio::test]
async fn test_create_session_validation() {
    let addr = start_test_server().await;

    let resp = create_session(
        &addr,
        serde_json::json!({"sessionId": "", "language": "en"}),
    )
    .await;
    assert_eq!(resp.status(), 400);

    let resp = create_session(
        &addr,
        serde_json::json!({"sessionId": "call-1", "language": "en", "status": "completed"}),
    )
    .await;
    assert_eq!(resp.status(), 400);

    // Missing language is a deserialization failure.
    let resp = create_session(&addr, serde_json::json!({"sessionId": "call-1"})).await;
    assert_eq!(resp.status(), 400);

    // Unknown keys are rejected.
    let resp = create_session(
        &addr,
        serde_json::json!({"sessionId": "call-1", "language": "en", "channel": "voice"}),
    )
    .await;
    assert_eq!(resp.status(), 400);

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/sessions"))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

// --- Event ingestion ---

#[tokio::test]
async fn test_add_event_and_replay() {
    let addr = start_test_server().await;
    create_session(
        &addr,
        serde_json::json!({"sessionId": "call-1", "language": "en"}),
    )
    .await;

    let resp = add_event(
        &addr,
        "call-1",
        serde_json::json!({"eventId": "evt-1", "type": "user_speech", "payload": {"text": "hi"}}),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["sessionId"], "call-1");
    assert_eq!(body["eventId"], "evt-1");
    assert_eq!(body["type"], "user_speech");
    assert_eq!(body["payload"]["text"], "hi");
    assert!(body["timestamp"].is_string());

    // Replay with a different payload returns the stored row.
    let resp = add_event(
        &addr,
        "call-1",
        serde_json::json!({"eventId": "evt-1", "type": "user_speech", "payload": {"text": "changed"}}),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["payload"]["text"], "hi");

    let resp = reqwest::get(format!("http://{addr}/sessions/call-1")).await.unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["events"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_add_event_honors_explicit_timestamp() {
    let addr = start_test_server().await;
    create_session(
        &addr,
        serde_json::json!({"sessionId": "call-1", "language": "en"}),
    )
    .await;

    let resp = add_event(
        &addr,
        "call-1",
        serde_json::json!({
            "eventId": "evt-1",
            "type": "system",
            "payload": {},
            "timestamp": "2025-06-01T12:00:00Z"
        }),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["timestamp"]
        .as_str()
        .unwrap()
        .starts_with("2025-06-01T12:00:00"));
}

#[tokio::test]
async fn test_add_event_error_paths() {
    let addr = start_test_server().await;

    let resp = add_event(
        &addr,
        "ghost",
        serde_json::json!({"eventId": "evt-1", "type": "system", "payload": {}}),
    )
    .await;
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Session with ID ghost not found");

    create_session(
        &addr,
        serde_json::json!({"sessionId": "call-1", "language": "en"}),
    )
    .await;

    // Unknown kind fails deserialization.
    let resp = add_event(
        &addr,
        "call-1",
        serde_json::json!({"eventId": "evt-1", "type": "agent_speech", "payload": {}}),
    )
    .await;
    assert_eq!(resp.status(), 400);

    let resp = add_event(
        &addr,
        "call-1",
        serde_json::json!({"eventId": "evt-1", "type": "system", "payload": "scalar"}),
    )
    .await;
    assert_eq!(resp.status(), 400);

    let resp = add_event(
        &addr,
        "call-1",
        serde_json::json!({"eventId": " ", "type": "system", "payload": {}}),
    )
    .await;
    assert_eq!(resp.status(), 400);

    // Unknown keys are rejected.
    let resp = add_event(
        &addr,
        "call-1",
        serde_json::json!({"eventId": "evt-1", "type": "system", "payload": {}, "speaker": "bot"}),
    )
    .await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_add_event_to_completed_session() {
    let addr = start_test_server().await;
    create_session(
        &addr,
        serde_json::json!({"sessionId": "call-1", "language": "en"}),
    )
    .await;
    reqwest::Client::new()
        .post(format!("http://{addr}/sessions/call-1/complete"))
        .send()
        .await
        .unwrap();

    let resp = add_event(
        &addr,
        "call-1",
        serde_json::json!({"eventId": "evt-1", "type": "system", "payload": {}}),
    )
    .await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Cannot add events to a completed session");
}

// --- Session detail ---

#[tokio::test]
async fn test_get_session_detail_paginates() {
    let addr = start_test_server().await;
    create_session(
        &addr,
        serde_json::json!({"sessionId": "call-1", "language": "en"}),
    )
    .await;
    for i in 0..5 {
        add_event(
            &addr,
            "call-1",
            serde_json::json!({
                "eventId": format!("evt-{i}"),
                "type": "user_speech",
                "payload": {"seq": i},
                "timestamp": format!("2025-06-01T12:00:0{i}Z")
            }),
        )
        .await;
    }

    let resp = reqwest::get(format!("http://{addr}/sessions/call-1?page=2&limit=2"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["sessionId"], "call-1");

    let events = body["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["eventId"], "evt-2");
    assert_eq!(events[1]["eventId"], "evt-3");

    // Past the end: still 200, empty page.
    let resp = reqwest::get(format!("http://{addr}/sessions/call-1?page=9&limit=2"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["events"].as_array().unwrap().is_empty());

    // The largest values the query string can carry behave the same way.
    let resp = reqwest::get(format!(
        "http://{addr}/sessions/call-1?page=4294967295&limit=4294967295"
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["events"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_get_session_detail_rejects_bad_pagination() {
    let addr = start_test_server().await;
    create_session(
        &addr,
        serde_json::json!({"sessionId": "call-1", "language": "en"}),
    )
    .await;

    let resp = reqwest::get(format!("http://{addr}/sessions/call-1?page=0"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = reqwest::get(format!("http://{addr}/sessions/call-1?limit=zero"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_get_unknown_session() {
    let addr = start_test_server().await;
    let resp = reqwest::get(format!("http://{addr}/sessions/ghost")).await.unwrap();
    assert_eq!(resp.status(), 404);
}

// --- Completion ---

#[tokio::test]
async fn test_complete_session_flow() {
    let addr = start_test_server().await;
    create_session(
        &addr,
        serde_json::json!({"sessionId": "call-1", "language": "en"}),
    )
    .await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/sessions/call-1/complete"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "completed");
    assert!(body["endedAt"].is_string());
    let ended_at = body["endedAt"].clone();

    // Completing again is a no-op returning the same record.
    let resp = client
        .post(format!("http://{addr}/sessions/call-1/complete"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["endedAt"], ended_at);

    let resp = client
        .post(format!("http://{addr}/sessions/ghost/complete"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
