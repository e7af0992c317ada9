//! Integration tests for the HTTP API and WebSocket event stream.
//!
//! Each test spawns a real server on a free port and talks to it over
//! HTTP and WebSocket, the way a renderer would.

use std::net::TcpListener;
use std::time::Duration;

use futures::SinkExt;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tungstenite::Message;
use tutor_orchestrator::{create_router, AppState, Config, EventKind, LessonEvent, Phase};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Helper to find an available port for testing.
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

/// Spawns the test server and returns its base address.
async fn spawn_test_server(state: AppState) -> (String, tokio::task::JoinHandle<()>) {
    let port = find_available_port();
    let addr = format!("127.0.0.1:{port}");

    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    (addr, handle)
}

async fn connect_client(addr: &str) -> WsClient {
    let (ws_stream, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("Failed to connect to WebSocket");
    ws_stream
}

/// Receives the next lesson event, answering pings along the way.
async fn receive_event(client: &mut WsClient) -> LessonEvent {
    loop {
        let msg = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("Timeout waiting for message")
            .expect("Stream ended")
            .expect("WebSocket error");

        match msg {
            Message::Text(text) => {
                return serde_json::from_str(&text).expect("Failed to parse event");
            }
            Message::Ping(data) => {
                client
                    .send(Message::Pong(data))
                    .await
                    .expect("Failed to send pong");
            }
            Message::Pong(_) => {}
            other => panic!("Expected text message, got: {other:?}"),
        }
    }
}

async fn create_session(http: &reqwest::Client, addr: &str, persona: Option<&str>) -> String {
    let mut body = json!({
        "unit": { "id": "SN-101", "title": "Sales Negotiation" },
        "learnerId": "learner-7"
    });
    if let Some(persona) = persona {
        body["personaKey"] = json!(persona);
    }

    let response = http
        .post(format!("http://{addr}/api/sessions"))
        .json(&body)
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);

    let value: Value = response.json().await.expect("Invalid JSON");
    value["sessionId"]
        .as_str()
        .expect("missing sessionId")
        .to_string()
}

async fn post_turn(
    http: &reqwest::Client,
    addr: &str,
    session_id: &str,
    utterance: &str,
) -> (reqwest::StatusCode, Value) {
    let response = http
        .post(format!("http://{addr}/api/sessions/{session_id}/turns"))
        .json(&json!({ "utterance": utterance }))
        .send()
        .await
        .expect("Request failed");
    let status = response.status();
    let value = response.json().await.expect("Invalid JSON");
    (status, value)
}

// ============================================================================
// HTTP Tests
// ============================================================================

#[tokio::test]
async fn test_personas_endpoint_lists_catalog() {
    let (addr, _handle) = spawn_test_server(AppState::new(Config::default())).await;

    let value: Value = reqwest::get(format!("http://{addr}/api/personas"))
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON");

    let personas = value.as_array().expect("expected array");
    assert!(personas.iter().any(|p| p["key"] == "explainer"));
    assert!(personas.iter().any(|p| p["key"] == "council"));
}

#[tokio::test]
async fn test_full_lesson_over_http() {
    let (addr, _handle) = spawn_test_server(AppState::new(Config::default())).await;
    let http = reqwest::Client::new();
    let session_id = create_session(&http, &addr, None).await;

    let mut last = Value::Null;
    for i in 0..8 {
        let (status, body) = post_turn(&http, &addr, &session_id, &format!("answer {i}")).await;
        assert_eq!(status, reqwest::StatusCode::OK);
        last = body;
    }

    assert_eq!(last["turn"]["phase"], "COMPLETE");
    assert_eq!(last["turn"]["complete"], true);
    assert_eq!(last["turn"]["events"].as_array().map(Vec::len), Some(2));
    assert_eq!(last["turn"]["events"][0]["actor"]["id"], "learner-7");

    let (status, body) = post_turn(&http, &addr, &session_id, "one more").await;
    assert_eq!(status, reqwest::StatusCode::CONFLICT);
    assert!(body["error"]
        .as_str()
        .expect("missing error")
        .contains("already complete"));

    let session: Value = http
        .get(format!("http://{addr}/api/sessions/{session_id}"))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(session["exchangeCount"], 8);
    assert_eq!(session["phase"], "COMPLETE");
}

#[tokio::test]
async fn test_persona_switch_over_http() {
    let (addr, _handle) = spawn_test_server(AppState::new(Config::default())).await;
    let http = reqwest::Client::new();
    let session_id = create_session(&http, &addr, Some("coach")).await;
    let url = format!("http://{addr}/api/sessions/{session_id}/persona");

    let first: Value = http
        .post(&url)
        .json(&json!({ "personaKey": "questioner" }))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(first["switched"], true);
    assert_eq!(first["session"]["activePersonaKey"], "questioner");

    let again: Value = http
        .post(&url)
        .json(&json!({ "personaKey": "questioner" }))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(again["switched"], false);
    assert_eq!(
        again["session"]["personaHistory"].as_array().map(Vec::len),
        Some(1)
    );

    let unknown = http
        .post(&url)
        .json(&json!({ "personaKey": "wizard" }))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(unknown.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_deleted_session_is_gone() {
    let (addr, _handle) = spawn_test_server(AppState::new(Config::default())).await;
    let http = reqwest::Client::new();
    let session_id = create_session(&http, &addr, None).await;

    let deleted = http
        .delete(format!("http://{addr}/api/sessions/{session_id}"))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(deleted.status(), reqwest::StatusCode::NO_CONTENT);

    let (status, _) = post_turn(&http, &addr, &session_id, "hello").await;
    assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
}

// ============================================================================
// WebSocket Tests
// ============================================================================

#[tokio::test]
async fn test_client_receives_connected_event_with_sessions() {
    let (addr, _handle) = spawn_test_server(AppState::new(Config::default())).await;
    let http = reqwest::Client::new();
    let session_id = create_session(&http, &addr, None).await;

    let mut client = connect_client(&addr).await;
    let event = receive_event(&mut client).await;

    assert!(
        matches!(
            &event,
            LessonEvent::Connected(payload) if payload.session_ids == vec![session_id.clone()]
        ),
        "Expected Connected event, got: {event:?}"
    );
}

#[tokio::test]
async fn test_turn_events_stream_to_clients() {
    let (addr, _handle) = spawn_test_server(AppState::new(Config::default())).await;
    let http = reqwest::Client::new();
    let session_id = create_session(&http, &addr, None).await;

    let mut client1 = connect_client(&addr).await;
    let mut client2 = connect_client(&addr).await;
    receive_event(&mut client1).await;
    receive_event(&mut client2).await;

    let (status, _) = post_turn(&http, &addr, &session_id, "How can I improve?").await;
    assert_eq!(status, reqwest::StatusCode::OK);

    for client in [&mut client1, &mut client2] {
        match receive_event(client).await {
            LessonEvent::TurnProcessed(payload) => {
                assert_eq!(payload.session_id, session_id);
                assert_eq!(payload.phase, Phase::Teach2);
                assert!(payload.transitioned);
                assert_eq!(payload.indicators.len(), 1);
            }
            other => panic!("Expected TurnProcessed, got: {other:?}"),
        }
        match receive_event(client).await {
            LessonEvent::Telemetry(payload) => {
                assert_eq!(payload.event.kind, EventKind::PhaseAdvance);
            }
            other => panic!("Expected Telemetry, got: {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_persona_switch_streams_handover() {
    let (addr, _handle) = spawn_test_server(AppState::new(Config::default())).await;
    let http = reqwest::Client::new();
    let session_id = create_session(&http, &addr, None).await;

    let mut client = connect_client(&addr).await;
    receive_event(&mut client).await;

    http.post(format!("http://{addr}/api/sessions/{session_id}/persona"))
        .json(&json!({ "personaKey": "coach" }))
        .send()
        .await
        .expect("Request failed");

    match receive_event(&mut client).await {
        LessonEvent::PersonaSwitched(payload) => {
            assert_eq!(payload.from, "explainer");
            assert_eq!(payload.to, "coach");
            assert_eq!(payload.phase, Phase::Teach1);
        }
        other => panic!("Expected PersonaSwitched, got: {other:?}"),
    }
    match receive_event(&mut client).await {
        LessonEvent::Telemetry(payload) => {
            assert_eq!(payload.event.kind, EventKind::PersonaSwitch);
        }
        other => panic!("Expected Telemetry, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_completion_streams_lesson_complete() {
    let (addr, _handle) = spawn_test_server(AppState::new(Config::default())).await;
    let http = reqwest::Client::new();
    let session_id = create_session(&http, &addr, None).await;

    for i in 0..7 {
        post_turn(&http, &addr, &session_id, &format!("answer {i}")).await;
    }

    let mut client = connect_client(&addr).await;
    receive_event(&mut client).await;

    post_turn(&http, &addr, &session_id, "final answer").await;

    let mut names = Vec::new();
    for _ in 0..4 {
        names.push(receive_event(&mut client).await.event_name());
    }
    assert_eq!(
        names,
        vec!["turn_processed", "telemetry", "telemetry", "lesson_complete"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_turns_stream_in_order() {
    let (addr, _handle) = spawn_test_server(AppState::new(Config::default())).await;
    let http = reqwest::Client::new();
    let session_id = create_session(&http, &addr, None).await;

    let mut client = connect_client(&addr).await;
    receive_event(&mut client).await;

    let turns: Vec<_> = (0..5)
        .map(|i| {
            let http = http.clone();
            let addr = addr.clone();
            let session_id = session_id.clone();
            tokio::spawn(async move {
                post_turn(&http, &addr, &session_id, &format!("answer {i}"))
                    .await
                    .0
            })
        })
        .collect();
    for status in futures::future::join_all(turns).await {
        assert_eq!(status.expect("task failed"), reqwest::StatusCode::OK);
    }

    let mut exchanges = Vec::new();
    let mut sequences = Vec::new();
    for _ in 0..10 {
        match receive_event(&mut client).await {
            LessonEvent::TurnProcessed(payload) => exchanges.push(payload.exchange_count),
            LessonEvent::Telemetry(payload) => sequences.push(payload.event.sequence),
            other => panic!("Unexpected event: {other:?}"),
        }
    }

    assert_eq!(exchanges, vec![1, 2, 3, 4, 5]);
    assert_eq!(sequences.len(), 5);
    assert!(sequences.windows(2).all(|pair| pair[0] < pair[1]));
}
