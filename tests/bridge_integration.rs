//! Bridge manager against an in-process WebSocket server.

use futures::{SinkExt, StreamExt};
use glass_pilot_lib::bridge::{BridgeEvent, BridgeManager, BridgeState};
use glass_pilot_lib::config::BridgeConfig;
use glass_pilot_lib::error::Error;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

fn config(url: String, base_ms: u64) -> BridgeConfig {
    BridgeConfig {
        url,
        reconnect_base_ms: base_ms,
        ..BridgeConfig::default()
    }
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<BridgeEvent>) -> BridgeEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("bridge event within 5s")
        .expect("event channel open")
}

#[tokio::test]
async fn streams_chunks_and_drops_malformed_frames() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (request_tx, mut request_rx) = mpsc::unbounded_channel::<Value>();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        ws.send(Message::Text(json!({"type": "connected"}).to_string()))
            .await
            .unwrap();

        while let Some(Ok(msg)) = ws.next().await {
            let Message::Text(text) = msg else { continue };
            let request: Value = serde_json::from_str(&text).unwrap();
            let id = request["id"].as_str().unwrap_or_default().to_string();
            request_tx.send(request).unwrap();

            for frame in [
                json!({"type": "llm_chunk", "id": id, "content": "Hel"}).to_string(),
                "{not json".to_string(),
                json!({"type": "mystery"}).to_string(),
                json!({"type": "chunk", "id": id, "payload": {"delta": "lo"}}).to_string(),
                json!({"type": "llm_done", "id": id}).to_string(),
            ] {
                ws.send(Message::Text(frame)).await.unwrap();
            }
        }
    });

    let bridge = BridgeManager::new(config(format!("ws://{addr}"), 2000), "tests");
    let mut events = bridge.take_events().unwrap();
    assert!(bridge.take_events().is_none());

    bridge.connect().await.unwrap();
    assert_eq!(bridge.state(), BridgeState::Open);
    // Already open: a second connect is a no-op.
    bridge.connect().await.unwrap();

    assert_eq!(next_event(&mut events).await, BridgeEvent::Opened);
    assert!(matches!(
        next_event(&mut events).await,
        BridgeEvent::Lifecycle { ref kind, .. } if kind == "connected"
    ));

    let id = bridge
        .send_llm_request("explain this", "fn main() {}")
        .await
        .unwrap();

    let request = request_rx.recv().await.unwrap();
    assert_eq!(request["type"], "llm_request");
    assert_eq!(request["id"], id.as_str());
    assert_eq!(request["payload"]["prompt"], "explain this");
    assert_eq!(request["payload"]["options"]["stream"], true);
    assert_eq!(request["payload"]["options"]["taskType"], "chat");
    assert_eq!(request["payload"]["context"]["selectedText"], "fn main() {}");
    assert_eq!(request["metadata"]["source"], "tests");
    assert!(request["timestamp"].as_u64().is_some());

    let mut content = String::new();
    loop {
        match next_event(&mut events).await {
            BridgeEvent::Chunk { id: chunk_id, content: c } => {
                assert_eq!(chunk_id.as_deref(), Some(id.as_str()));
                content.push_str(&c);
            }
            BridgeEvent::Done { id: done_id } => {
                assert_eq!(done_id.as_deref(), Some(id.as_str()));
                break;
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(content, "Hello");
    assert_eq!(bridge.state(), BridgeState::Open);

    bridge.disconnect().await.unwrap();
    assert_eq!(bridge.state(), BridgeState::Disconnected);
    assert!(matches!(
        bridge.send_llm_request("again", "").await,
        Err(Error::NotConnected)
    ));
}

#[tokio::test]
async fn server_close_triggers_reconnect_and_resets_counter() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        // First connection is closed straight away; the second stays up.
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        let _ = ws.close(None).await;
        drop(ws);

        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        while ws.next().await.is_some() {}
    });

    let bridge = BridgeManager::new(config(format!("ws://{addr}"), 20), "tests");
    let mut events = bridge.take_events().unwrap();
    bridge.connect().await.unwrap();

    assert_eq!(next_event(&mut events).await, BridgeEvent::Opened);
    assert!(matches!(next_event(&mut events).await, BridgeEvent::Closed { .. }));
    assert_eq!(next_event(&mut events).await, BridgeEvent::Opened);

    let status = bridge.status();
    assert_eq!(status.state, BridgeState::Open);
    assert_eq!(status.reconnect_attempts, 0);
    assert!(status.next_retry_ms.is_none());

    bridge.disconnect().await.unwrap();
}

#[tokio::test]
async fn gives_up_after_ceiling_until_explicit_reconnect() {
    let dead = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap()
    };
    let bridge = BridgeManager::new(config(format!("ws://{dead}"), 10), "tests");
    let mut events = bridge.take_events().unwrap();

    assert!(bridge.connect().await.is_err());

    let mut closes = 0;
    let attempts = loop {
        match next_event(&mut events).await {
            BridgeEvent::Closed { .. } => closes += 1,
            BridgeEvent::Exhausted { attempts } => break attempts,
            other => panic!("unexpected event {other:?}"),
        }
    };
    assert_eq!(attempts, 5);
    // The first failure plus five scheduled retries.
    assert_eq!(closes, 6);

    let status = bridge.status();
    assert_eq!(status.state, BridgeState::Disconnected);
    assert_eq!(status.reconnect_attempts, 5);
    assert!(status.next_retry_ms.is_none());
    assert!(status.last_error.is_some());

    // Nothing else is scheduled.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(events.try_recv().is_err());

    // An explicit reconnect starts counting again.
    assert!(bridge.reconnect().await.is_err());
    let attempts = bridge.status().reconnect_attempts;
    assert!((1..5).contains(&attempts), "attempts = {attempts}");
    bridge.disconnect().await.unwrap();
}

#[tokio::test]
async fn concurrent_connects_open_a_single_socket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&accepted);
    tokio::spawn(async move {
        loop {
            let (tcp, _) = listener.accept().await.unwrap();
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                // Slow handshake keeps the first connect in Connecting.
                tokio::time::sleep(Duration::from_millis(200)).await;
                let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
                while ws.next().await.is_some() {}
            });
        }
    });

    let bridge = BridgeManager::new(config(format!("ws://{addr}"), 2000), "tests");
    let (first, second) = tokio::join!(bridge.connect(), bridge.connect());
    first.unwrap();
    second.unwrap();

    // Let the no-op caller's attempt (if any) reach the server.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(bridge.state(), BridgeState::Open);
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
    bridge.disconnect().await.unwrap();
}

#[tokio::test]
async fn reconnect_during_retry_handshake_recovers() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    // While set, connections are accepted but the handshake never completes.
    let stall = Arc::new(AtomicBool::new(true));

    let gate = Arc::clone(&stall);
    tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            let (tcp, _) = listener.accept().await.unwrap();
            if gate.load(Ordering::SeqCst) {
                held.push(tcp);
                continue;
            }
            tokio::spawn(async move {
                let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
                while ws.next().await.is_some() {}
            });
        }
    });

    let bridge = BridgeManager::new(
        BridgeConfig {
            connect_timeout_ms: 500,
            ..config(format!("ws://{addr}"), 50)
        },
        "tests",
    );

    // Times out, then the 50ms retry starts its own stalled handshake.
    assert!(bridge.connect().await.is_err());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(bridge.state(), BridgeState::Connecting);
    assert_eq!(bridge.status().reconnect_attempts, 1);

    stall.store(false, Ordering::SeqCst);
    bridge.reconnect().await.unwrap();
    assert_eq!(bridge.state(), BridgeState::Open);

    // The aborted retry leaves nothing behind that could close us again.
    tokio::time::sleep(Duration::from_millis(700)).await;
    let status = bridge.status();
    assert_eq!(status.state, BridgeState::Open);
    assert_eq!(status.reconnect_attempts, 0);
    bridge.disconnect().await.unwrap();
}
