//! Integration tests for the WebSocket channel: welcome, join snapshot,
//! message fanout, poll flow, likes, typing, heartbeat, and departure.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use agora_server::config::Config;
use agora_server::state::AppState;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Start the server on a random port and return (addr, state).
async fn start_test_server() -> (SocketAddr, AppState) {
    let mut config = Config::default();
    if let Some(poll) = config.poll.as_mut() {
        poll.reset_key = Some("test-key".to_string());
    }

    let state = AppState::new(&config);
    let app = agora_server::routes::build_router(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

async fn connect(addr: &SocketAddr) -> WsStream {
    let (ws_stream, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .expect("Failed to connect to WebSocket");
    ws_stream
}

async fn send_event(ws: &mut WsStream, event: Value) {
    ws.send(Message::Text(event.to_string()))
        .await
        .expect("Failed to send event");
}

/// Read frames until an event with the given type tag arrives.
async fn next_event_of(ws: &mut WsStream, kind: &str) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .unwrap_or_else(|_| panic!("Timed out waiting for {kind}"))
            .expect("Stream ended")
            .expect("WebSocket error");
        if let Message::Text(text) = msg {
            let event: Value = serde_json::from_str(&text).expect("Valid JSON event");
            if event["type"] == kind {
                return event;
            }
        }
    }
}

/// Join the hub and return the initial snapshot.
async fn join(ws: &mut WsStream, handle: &str) -> Value {
    send_event(ws, json!({ "type": "join", "handle": handle })).await;
    next_event_of(ws, "initialSnapshot").await
}

#[tokio::test]
async fn test_welcome_is_sent_on_connect() {
    let (addr, _state) = start_test_server().await;
    let mut ws = connect(&addr).await;

    let welcome = next_event_of(&mut ws, "welcome").await;
    assert!(welcome["serverTime"].is_string());
}

#[tokio::test]
async fn test_join_delivers_snapshot_and_announces() {
    let (addr, _state) = start_test_server().await;

    let mut first = connect(&addr).await;
    join(&mut first, "@alice").await;

    let mut second = connect(&addr).await;
    let snapshot = join(&mut second, "@bob").await;

    // Snapshot reflects the seeded poll and both online sessions
    assert_eq!(snapshot["poll"]["total"], 250);
    assert_eq!(snapshot["poll"]["options"].as_array().unwrap().len(), 2);
    assert_eq!(snapshot["onlineCount"], 2);
    assert_eq!(snapshot["roster"].as_array().unwrap().len(), 2);
    // Alice's join announcement is already in the recent tail
    assert!(!snapshot["recentMessages"].as_array().unwrap().is_empty());

    // The earlier session sees the arrival (joiner excluded from the fanout)
    let joined = next_event_of(&mut first, "userJoined").await;
    assert_eq!(joined["user"]["handle"], "@bob");
    assert_eq!(joined["onlineCount"], 2);
}

#[tokio::test]
async fn test_join_without_handle_is_rejected() {
    let (addr, _state) = start_test_server().await;
    let mut ws = connect(&addr).await;

    send_event(&mut ws, json!({ "type": "join", "name": "Nameless" })).await;
    let error = next_event_of(&mut ws, "error").await;
    assert_eq!(error["kind"], "invalidInput");
}

#[tokio::test]
async fn test_message_fanout_and_ack() {
    let (addr, _state) = start_test_server().await;

    let mut alice = connect(&addr).await;
    join(&mut alice, "@alice").await;
    let mut bob = connect(&addr).await;
    join(&mut bob, "@bob").await;

    send_event(&mut alice, json!({ "type": "sendMessage", "text": "  hello room  " })).await;

    // Sender gets an acknowledgement
    let ack = next_event_of(&mut alice, "messageSent").await;
    assert!(ack["id"].as_str().unwrap().starts_with("msg_"));

    // Everyone receives the message; text arrives trimmed
    loop {
        let event = next_event_of(&mut bob, "newMessage").await;
        if event["message"]["kind"] == "user" {
            assert_eq!(event["message"]["text"], "hello room");
            assert_eq!(event["message"]["handle"], "@alice");
            assert_eq!(event["message"]["likes"], 0);
            break;
        }
    }
}

#[tokio::test]
async fn test_actions_before_join_are_rejected() {
    let (addr, _state) = start_test_server().await;
    let mut ws = connect(&addr).await;

    send_event(&mut ws, json!({ "type": "sendMessage", "text": "hi" })).await;
    let error = next_event_of(&mut ws, "error").await;
    assert_eq!(error["kind"], "notRegistered");

    send_event(&mut ws, json!({ "type": "vote", "option": "yes" })).await;
    let error = next_event_of(&mut ws, "error").await;
    assert_eq!(error["kind"], "notRegistered");
}

#[tokio::test]
async fn test_invalid_message_text_is_rejected() {
    let (addr, _state) = start_test_server().await;
    let mut ws = connect(&addr).await;
    join(&mut ws, "@alice").await;

    send_event(&mut ws, json!({ "type": "sendMessage", "text": "   " })).await;
    let error = next_event_of(&mut ws, "error").await;
    assert_eq!(error["kind"], "validationError");

    send_event(&mut ws, json!({ "type": "sendMessage", "text": "x".repeat(501) })).await;
    let error = next_event_of(&mut ws, "error").await;
    assert_eq!(error["kind"], "validationError");
}

#[tokio::test]
async fn test_vote_switch_and_duplicate_flow() {
    let (addr, _state) = start_test_server().await;
    let mut ws = connect(&addr).await;
    join(&mut ws, "@alice").await;

    // First vote counts
    send_event(&mut ws, json!({ "type": "vote", "option": "yes" })).await;
    let update = next_event_of(&mut ws, "pollUpdate").await;
    assert_eq!(update["poll"]["total"], 251);
    assert_eq!(update["poll"]["options"][0]["votes"], 151);

    // Same option again is rejected
    send_event(&mut ws, json!({ "type": "vote", "option": "yes" })).await;
    let error = next_event_of(&mut ws, "error").await;
    assert_eq!(error["kind"], "duplicateVote");

    // Switching moves one vote, total unchanged
    send_event(&mut ws, json!({ "type": "vote", "option": "no" })).await;
    let update = next_event_of(&mut ws, "pollUpdate").await;
    assert_eq!(update["poll"]["total"], 251);
    assert_eq!(update["poll"]["options"][0]["votes"], 150);
    assert_eq!(update["poll"]["options"][1]["votes"], 101);

    // Unknown labels are rejected
    send_event(&mut ws, json!({ "type": "vote", "option": "maybe" })).await;
    let error = next_event_of(&mut ws, "error").await;
    assert_eq!(error["kind"], "invalidOption");
}

#[tokio::test]
async fn test_vote_emits_a_vote_notice_message() {
    let (addr, _state) = start_test_server().await;
    let mut ws = connect(&addr).await;
    join(&mut ws, "@alice").await;

    send_event(&mut ws, json!({ "type": "vote", "option": "yes" })).await;

    loop {
        let event = next_event_of(&mut ws, "newMessage").await;
        if event["message"]["kind"] == "vote-notice" {
            assert_eq!(event["message"]["handle"], "@alice");
            break;
        }
    }
}

#[tokio::test]
async fn test_like_is_idempotent_over_the_wire() {
    let (addr, _state) = start_test_server().await;
    let mut ws = connect(&addr).await;
    join(&mut ws, "@alice").await;

    send_event(&mut ws, json!({ "type": "sendMessage", "text": "like me" })).await;
    let ack = next_event_of(&mut ws, "messageSent").await;
    let id = ack["id"].as_str().unwrap().to_string();

    send_event(&mut ws, json!({ "type": "likeMessage", "messageId": id })).await;
    let liked = next_event_of(&mut ws, "messageLiked").await;
    assert_eq!(liked["messageId"], id.as_str());
    assert_eq!(liked["likeCount"], 1);

    // Second like reports the unchanged count
    send_event(&mut ws, json!({ "type": "likeMessage", "messageId": id })).await;
    let liked = next_event_of(&mut ws, "messageLiked").await;
    assert_eq!(liked["likeCount"], 1);
}

#[tokio::test]
async fn test_typing_reaches_everyone_else() {
    let (addr, _state) = start_test_server().await;

    let mut alice = connect(&addr).await;
    join(&mut alice, "@alice").await;
    let mut bob = connect(&addr).await;
    join(&mut bob, "@bob").await;

    send_event(&mut alice, json!({ "type": "typing" })).await;
    let typing = next_event_of(&mut bob, "userTyping").await;
    assert_eq!(typing["handle"], "@alice");

    // The typist does not hear their own indicator: the next event alice
    // sees after a heartbeat is the ack, with no userTyping in between
    send_event(&mut alice, json!({ "type": "heartbeat" })).await;
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), alice.next())
            .await
            .expect("Expected heartbeat ack")
            .expect("Stream ended")
            .expect("WebSocket error");
        if let Message::Text(text) = msg {
            let event: Value = serde_json::from_str(&text).unwrap();
            assert_ne!(event["type"], "userTyping", "typist must not echo");
            if event["type"] == "heartbeatAck" {
                break;
            }
        }
    }
}

#[tokio::test]
async fn test_heartbeat_acks_and_refreshes_activity() {
    let (addr, state) = start_test_server().await;
    let mut ws = connect(&addr).await;
    join(&mut ws, "@alice").await;

    send_event(&mut ws, json!({ "type": "heartbeat" })).await;
    let ack = next_event_of(&mut ws, "heartbeatAck").await;
    assert!(ack["serverTime"].is_string());

    assert_eq!(state.registry.online_count(), 1);
}

#[tokio::test]
async fn test_poll_reset_requires_the_capability_key() {
    let (addr, _state) = start_test_server().await;
    let mut ws = connect(&addr).await;
    join(&mut ws, "@alice").await;

    send_event(&mut ws, json!({ "type": "vote", "option": "yes" })).await;
    next_event_of(&mut ws, "pollUpdate").await;

    // Wrong key: rejected
    send_event(&mut ws, json!({ "type": "resetPoll", "key": "wrong" })).await;
    let error = next_event_of(&mut ws, "error").await;
    assert_eq!(error["kind"], "notAuthorized");

    // Missing key: rejected
    send_event(&mut ws, json!({ "type": "resetPoll" })).await;
    let error = next_event_of(&mut ws, "error").await;
    assert_eq!(error["kind"], "notAuthorized");

    // Correct key: baseline restored
    send_event(&mut ws, json!({ "type": "resetPoll", "key": "test-key" })).await;
    let update = next_event_of(&mut ws, "pollUpdate").await;
    assert_eq!(update["poll"]["total"], 250);
    assert_eq!(update["poll"]["options"][0]["votes"], 150);
}

#[tokio::test]
async fn test_undecodable_events_get_a_structured_reply() {
    let (addr, _state) = start_test_server().await;
    let mut ws = connect(&addr).await;

    ws.send(Message::Text("not json".to_string()))
        .await
        .expect("Failed to send");
    let error = next_event_of(&mut ws, "error").await;
    assert_eq!(error["kind"], "invalidPayload");

    send_event(&mut ws, json!({ "type": "unknownEvent" })).await;
    let error = next_event_of(&mut ws, "error").await;
    assert_eq!(error["kind"], "invalidPayload");
}

#[tokio::test]
async fn test_disconnect_announces_departure_exactly_once() {
    let (addr, state) = start_test_server().await;

    let mut alice = connect(&addr).await;
    join(&mut alice, "@alice").await;
    let mut bob = connect(&addr).await;
    join(&mut bob, "@bob").await;

    // Bob sends one message, then disconnects
    send_event(&mut bob, json!({ "type": "sendMessage", "text": "bye" })).await;
    next_event_of(&mut bob, "messageSent").await;
    bob.close(None).await.expect("Failed to close");

    let left = next_event_of(&mut alice, "userLeft").await;
    assert_eq!(left["user"]["handle"], "@bob");
    assert_eq!(left["onlineCount"], 1);

    // No second departure: the next thing alice hears after a heartbeat is
    // the ack
    send_event(&mut alice, json!({ "type": "heartbeat" })).await;
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), alice.next())
            .await
            .expect("Expected heartbeat ack")
            .expect("Stream ended")
            .expect("WebSocket error");
        if let Message::Text(text) = msg {
            let event: Value = serde_json::from_str(&text).unwrap();
            assert_ne!(event["type"], "userLeft", "departure must fire once");
            if event["type"] == "heartbeatAck" {
                break;
            }
        }
    }

    // Presence excludes the departed session; bob's message survives in the
    // log with its attribution
    assert_eq!(state.registry.online_count(), 1);
    let tail = state.log.tail(10);
    assert!(tail
        .iter()
        .any(|m| m.handle == "@bob" && m.text == "bye"));
}
