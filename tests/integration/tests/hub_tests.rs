//! Hub tests driving registration and fan-out directly, without sockets

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use integration_tests::MemoryStore;
use relay_common::HubConfig;
use relay_core::{ConversationId, MessageId, UserId};
use relay_gateway::connection::SessionId;
use relay_gateway::protocol::Frame;
use relay_gateway::Hub;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::timeout;

fn start(store: &Arc<MemoryStore>) -> Hub {
    Hub::start(store.clone(), &HubConfig::default())
}

async fn open(hub: &Hub, user: i64, capacity: usize) -> (SessionId, mpsc::Receiver<Frame>) {
    let (tx, rx) = mpsc::channel(capacity);
    let session_id = SessionId::generate();
    hub.register(UserId::new(user), session_id, tx).await;
    (session_id, rx)
}

/// Receive frames until one matches, failing after a few seconds
async fn recv_matching(rx: &mut mpsc::Receiver<Frame>, pred: impl Fn(&Value) -> bool) -> Result<Value> {
    let wait = async {
        while let Some(frame) = rx.recv().await {
            let value: Value = serde_json::from_str(&frame)?;
            if pred(&value) {
                return Ok(value);
            }
        }
        Err(anyhow!("queue closed"))
    };
    timeout(Duration::from_secs(3), wait).await?
}

/// Everything queued within `window`
async fn drain(rx: &mut mpsc::Receiver<Frame>, window: Duration) -> Vec<Value> {
    let mut frames = Vec::new();
    while let Ok(Some(frame)) = timeout(window, rx.recv()).await {
        if let Ok(value) = serde_json::from_str(&frame) {
            frames.push(value);
        }
    }
    frames
}

fn is_presence(value: &Value, user: i64, status: &str) -> bool {
    value["type"] == "presence" && value["user_id"] == user && value["status"] == status
}

#[tokio::test]
async fn test_full_queue_drops_only_that_session() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    store.add_conversation(10, &[2]);
    let hub = start(&store);

    let (_slow_id, mut slow) = open(&hub, 2, 1).await;
    let (_fast_id, mut fast) = open(&hub, 2, 16).await;

    for n in 0..3 {
        hub.broadcast_system_message(ConversationId::new(10), format!("notice {n}"))
            .await;
    }

    // Queries are handled after the deliveries queued before them
    assert_eq!(hub.session_count(UserId::new(2)).await, 1);

    let first = slow.recv().await.ok_or_else(|| anyhow!("slow queue empty"))?;
    assert!(first.contains("notice 0"));
    assert!(slow.recv().await.is_none());

    let fast_frames = drain(&mut fast, Duration::from_millis(100)).await;
    let contents: Vec<&str> = fast_frames
        .iter()
        .filter_map(|v| v["content"].as_str())
        .collect();
    assert_eq!(contents, vec!["notice 0", "notice 1", "notice 2"]);
    assert!(fast_frames.iter().all(|v| v["system"] == true));
    Ok(())
}

#[tokio::test]
async fn test_overflow_of_last_session_announces_offline() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    store.add_conversation(10, &[1, 2]);
    let hub = start(&store);

    let (_watcher, mut watcher) = open(&hub, 1, 64).await;
    let (_stuck, _stuck_rx) = open(&hub, 2, 1).await;

    let mut sent = 0;
    while hub.is_online(UserId::new(2)).await {
        assert!(sent < 10, "user 2 never overflowed");
        hub.broadcast_system_message(ConversationId::new(10), "ping").await;
        sent += 1;
    }

    let offline = recv_matching(&mut watcher, |v| is_presence(v, 2, "offline")).await?;
    assert_eq!(offline["username"], "user2");
    Ok(())
}

#[tokio::test]
async fn test_double_unregister_announces_offline_once() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    store.add_conversation(10, &[1, 2]);
    let hub = start(&store);

    let (_watcher, mut watcher) = open(&hub, 1, 64).await;
    let (session, _rx) = open(&hub, 2, 8).await;

    hub.unregister(UserId::new(2), session).await;
    hub.unregister(UserId::new(2), session).await;
    assert!(!hub.is_online(UserId::new(2)).await);

    let frames = drain(&mut watcher, Duration::from_millis(300)).await;
    let offline = frames.iter().filter(|v| is_presence(v, 2, "offline")).count();
    assert_eq!(offline, 1);
    Ok(())
}

#[tokio::test]
async fn test_slow_online_announcement_cannot_follow_offline() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    store.add_conversation(10, &[1, 2]);
    let hub = start(&store);
    let (_peer, mut peer) = open(&hub, 2, 64).await;

    // The online announcement stalls on its profile lookup past the disconnect
    store.delay_next_profile(1, Duration::from_millis(200));
    let (session, _rx) = open(&hub, 1, 8).await;
    hub.unregister(UserId::new(1), session).await;

    let frames = drain(&mut peer, Duration::from_millis(500)).await;
    let statuses: Vec<&str> = frames
        .iter()
        .filter(|v| v["type"] == "presence" && v["user_id"] == 1)
        .filter_map(|v| v["status"].as_str())
        .collect();
    assert_eq!(statuses.last(), Some(&"offline"), "presence seen: {statuses:?}");
    assert!(!hub.is_online(UserId::new(1)).await);
    Ok(())
}

#[tokio::test]
async fn test_read_receipt_skips_reader() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    store.add_conversation(10, &[1, 2]);
    store.add_message(55, 10);
    let hub = start(&store);

    let (_a, mut author) = open(&hub, 1, 64).await;
    let (_r, mut reader) = open(&hub, 2, 64).await;

    hub.broadcast_read_receipt(MessageId::new(55), UserId::new(2)).await;

    let receipt = recv_matching(&mut author, |v| v["type"] == "read_receipt").await?;
    assert_eq!(receipt["message_id"], 55);
    assert_eq!(receipt["reader_id"], 2);
    assert_eq!(receipt["conversation_id"], 10);

    let frames = drain(&mut reader, Duration::from_millis(200)).await;
    assert!(frames.iter().all(|v| v["type"] != "read_receipt"));
    Ok(())
}

#[tokio::test]
async fn test_unknown_message_receipt_is_dropped() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    store.add_conversation(10, &[1, 2]);
    let hub = start(&store);

    let (_a, mut author) = open(&hub, 1, 64).await;
    hub.broadcast_read_receipt(MessageId::new(404), UserId::new(2)).await;

    let frames = drain(&mut author, Duration::from_millis(200)).await;
    assert!(frames.iter().all(|v| v["type"] != "read_receipt"));
    Ok(())
}

#[tokio::test]
async fn test_store_failure_abandons_broadcast() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    store.add_conversation(10, &[1]);
    let hub = start(&store);
    let (_s, mut rx) = open(&hub, 1, 8).await;
    drain(&mut rx, Duration::from_millis(50)).await;

    store.set_offline(true);
    hub.broadcast_system_message(ConversationId::new(10), "lost").await;
    assert!(drain(&mut rx, Duration::from_millis(200)).await.is_empty());

    // The hub keeps serving once the store recovers
    store.set_offline(false);
    hub.broadcast_system_message(ConversationId::new(10), "back").await;
    let frame = recv_matching(&mut rx, |v| v["type"] == "message").await?;
    assert_eq!(frame["content"], "back");
    Ok(())
}

#[tokio::test]
async fn test_shutdown_closes_every_queue() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let hub = start(&store);

    let (_a, mut first) = open(&hub, 1, 8).await;
    let (_b, mut second) = open(&hub, 2, 8).await;

    assert_eq!(hub.shutdown().await, 2);
    assert!(first.recv().await.is_none());
    assert!(second.recv().await.is_none());

    // Commands after shutdown are dropped quietly
    assert!(hub.stats().await.is_none());
    assert_eq!(hub.session_count(UserId::new(1)).await, 0);
    Ok(())
}
