//! Integration tests for the read-only HTTP query surface.

use serde_json::Value;
use std::net::SocketAddr;
use tokio::net::TcpListener;

use agora_server::config::Config;
use agora_server::hub::log::ChatMessage;
use agora_server::hub::registry::JoinInfo;
use agora_server::state::AppState;

/// Start the server on a random port and return (base_url, state).
async fn start_test_server() -> (String, AppState) {
    let state = AppState::new(&Config::default());
    let app = agora_server::routes::build_router(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), state)
}

async fn get_json(url: &str) -> Value {
    reqwest::get(url)
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Valid JSON body")
}

#[tokio::test]
async fn test_health_check() {
    let (base_url, _state) = start_test_server().await;
    let body = reqwest::get(format!("{}/health", base_url))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_stats_aggregates_all_components() {
    let (base_url, state) = start_test_server().await;

    let stats = get_json(&format!("{}/api/stats", base_url)).await;
    assert_eq!(stats["onlineCount"], 0);
    assert_eq!(stats["messageCount"], 0);
    assert_eq!(stats["voteTotal"], 250, "seeded poll baseline");
    assert!(stats["uptimeSecs"].as_i64().unwrap() >= 0);

    // Mutate through the components; the endpoint reflects it
    state.registry.register("c1", JoinInfo {
        handle: Some("@alice".to_string()),
        ..JoinInfo::default()
    })
    .unwrap();
    state.log.append(ChatMessage::system("hello".to_string()));
    state.poll.vote("c1", "yes").unwrap();

    let stats = get_json(&format!("{}/api/stats", base_url)).await;
    assert_eq!(stats["onlineCount"], 1);
    assert_eq!(stats["messageCount"], 1);
    assert_eq!(stats["voteTotal"], 251);
}

#[tokio::test]
async fn test_poll_endpoint_is_read_only() {
    let (base_url, _state) = start_test_server().await;

    let poll = get_json(&format!("{}/api/poll", base_url)).await;
    assert_eq!(poll["total"], 250);
    assert_eq!(poll["options"][0]["label"], "yes");
    assert_eq!(poll["options"][0]["votes"], 150);
    assert_eq!(poll["options"][0]["percentage"], 60);
    assert_eq!(poll["options"][1]["label"], "no");
    assert_eq!(poll["options"][1]["percentage"], 40);

    // Reading did not change anything
    let again = get_json(&format!("{}/api/poll", base_url)).await;
    assert_eq!(again["total"], 250);
}

#[tokio::test]
async fn test_roster_lists_online_sessions() {
    let (base_url, state) = start_test_server().await;

    let roster = get_json(&format!("{}/api/roster", base_url)).await;
    assert!(roster.as_array().unwrap().is_empty());

    state.registry.register("c1", JoinInfo {
        handle: Some("@alice".to_string()),
        ..JoinInfo::default()
    })
    .unwrap();
    state.registry.register("c2", JoinInfo {
        handle: Some("@bob".to_string()),
        ..JoinInfo::default()
    })
    .unwrap();
    state.registry.mark_offline("c2");

    let roster = get_json(&format!("{}/api/roster", base_url)).await;
    let entries = roster.as_array().unwrap();
    assert_eq!(entries.len(), 1, "offline sessions are excluded");
    assert_eq!(entries[0]["handle"], "@alice");
    // Public fields only: no identity or activity timestamps leak
    assert!(entries[0].get("identity").is_none());
    assert!(entries[0].get("lastActive").is_none());
}

#[tokio::test]
async fn test_history_pages_newest_first() {
    let (base_url, state) = start_test_server().await;

    for i in 0..5 {
        state.log.append(ChatMessage::system(format!("message {i}")));
    }

    let page = get_json(&format!("{}/api/messages?offset=0&limit=2", base_url)).await;
    let messages = page["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["text"], "message 4", "newest first");
    assert_eq!(messages[1]["text"], "message 3");
    assert_eq!(page["total"], 5);
    assert_eq!(page["hasMore"], true);

    let page = get_json(&format!("{}/api/messages?offset=4&limit=2", base_url)).await;
    assert_eq!(page["messages"].as_array().unwrap().len(), 1);
    assert_eq!(page["messages"][0]["text"], "message 0");
    assert_eq!(page["hasMore"], false);

    // Past the end: empty page, never an error
    let page = get_json(&format!("{}/api/messages?offset=50&limit=2", base_url)).await;
    assert!(page["messages"].as_array().unwrap().is_empty());
    assert_eq!(page["hasMore"], false);

    // Defaults apply when parameters are omitted
    let page = get_json(&format!("{}/api/messages", base_url)).await;
    assert_eq!(page["messages"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_history_limit_is_clamped() {
    let (base_url, state) = start_test_server().await;

    for i in 0..150 {
        state.log.append(ChatMessage::system(format!("message {i}")));
    }

    let page = get_json(&format!("{}/api/messages?limit=1000", base_url)).await;
    assert_eq!(
        page["messages"].as_array().unwrap().len(),
        100,
        "page size is clamped to the maximum"
    );
    assert_eq!(page["hasMore"], true);
}
