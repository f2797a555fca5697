//! Integration tests for the server, handler, and full connection flow.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use outpost::prelude::*;
use outpost_protocol::{Codec, DelimitedCodec, FactionTag, PeerRecord, SettlementEntry};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port and returns its address and state.
async fn start_server(store: Arc<MemoryStore>) -> (String, Arc<ServerState>) {
    let server = OutpostServer::builder()
        .bind("127.0.0.1:0")
        .store(store)
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let state = server.state();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    (addr, state)
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, record: &PeerRecord) {
    let wire = DelimitedCodec::default().encode_peer(record);
    ws.send(Message::text(wire)).await.expect("send");
}

async fn recv(ws: &mut ClientWs) -> ServerRecord {
    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("timed out waiting for a record")
        .expect("stream ended")
        .expect("recv");
    let text = msg.into_text().expect("text frame");
    DelimitedCodec::default()
        .decode_server(&text)
        .expect("decode")
}

/// Connects, handshakes and returns the initial settlement sync.
async fn login(addr: &str, username: &str) -> (ClientWs, ServerRecord) {
    let mut ws = connect(addr).await;
    send(
        &mut ws,
        &PeerRecord::Connect {
            username: username.into(),
            credential: "secret".into(),
        },
    )
    .await;
    let sync = recv(&mut ws).await;
    (ws, sync)
}

async fn expect_closed(ws: &mut ClientWs) {
    loop {
        let next = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for close");
        match next {
            None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
            Some(Ok(other)) => panic!("expected close, got {other:?}"),
        }
    }
}

/// Polls until `check` holds or a second passes.
async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never held");
}

fn with_home(username: &str, tile: u32) -> ClientRecord {
    let mut record = ClientRecord::new(username, "secret");
    record.home_tile = Some(TileId(tile));
    record
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_handshake_new_user_registers() {
    let store = Arc::new(MemoryStore::new());
    let (addr, state) = start_server(store.clone()).await;

    let (_ws, sync) = login(&addr, "Alice").await;

    assert_eq!(sync, ServerRecord::sync(Vec::new()));
    assert!(store.client("Alice").is_some());
    assert!(state.registry().lock().await.is_connected("Alice"));
}

#[tokio::test]
async fn test_handshake_wrong_credential_rejected() {
    let store = Arc::new(MemoryStore::new().with_client(ClientRecord::new("Alice", "right")));
    let (addr, _state) = start_server(store).await;
    let mut ws = connect(&addr).await;

    send(
        &mut ws,
        &PeerRecord::Connect {
            username: "Alice".into(),
            credential: "wrong".into(),
        },
    )
    .await;

    assert_eq!(
        recv(&mut ws).await,
        ServerRecord::Disconnect(DisconnectReason::Credentials)
    );
    expect_closed(&mut ws).await;
}

#[tokio::test]
async fn test_handshake_banned_address_rejected() {
    let (addr, state) = start_server(Arc::new(MemoryStore::new())).await;
    state
        .registry()
        .lock()
        .await
        .insert_ban(IpAddr::V4(Ipv4Addr::LOCALHOST), "Bob");

    let mut ws = connect(&addr).await;
    send(
        &mut ws,
        &PeerRecord::Connect {
            username: "Bob".into(),
            credential: "secret".into(),
        },
    )
    .await;

    assert_eq!(
        recv(&mut ws).await,
        ServerRecord::Disconnect(DisconnectReason::Banned)
    );
}

#[tokio::test]
async fn test_handshake_duplicate_login_rejected() {
    let (addr, _state) = start_server(Arc::new(MemoryStore::new())).await;
    let (_first, _) = login(&addr, "Alice").await;

    let (_second, reply) = login(&addr, "Alice").await;
    assert_eq!(reply, ServerRecord::Disconnect(DisconnectReason::AlreadyConnected));
}

// =========================================================================
// Settlements
// =========================================================================

#[tokio::test]
async fn test_initial_sync_excludes_own_settlement() {
    let store = Arc::new(
        MemoryStore::new()
            .with_client(with_home("Alice", 5))
            .with_client(with_home("Bob", 9)),
    );
    let (addr, _state) = start_server(store).await;

    let (_ws, sync) = login(&addr, "Alice").await;
    assert_eq!(
        sync,
        ServerRecord::sync(vec![SettlementEntry {
            tile: TileId(9),
            name: "Bob's Settlement".into(),
            faction: FactionTag::Neutral,
        }])
    );
}

#[tokio::test]
async fn test_new_settlement_broadcast_to_others() {
    let store = Arc::new(MemoryStore::new());
    let (addr, state) = start_server(store.clone()).await;
    let (mut alice, _) = login(&addr, "Alice").await;
    let (mut bob, _) = login(&addr, "Bob").await;

    send(&mut alice, &PeerRecord::NewSettlement { tile: TileId(42) }).await;

    assert_eq!(
        recv(&mut bob).await,
        ServerRecord::SettlementAdd {
            tile: TileId(42),
            base_name: "Alice".into(),
        }
    );
    assert_eq!(state.roster().lock().await.owner(TileId(42)), Some("Alice"));
    assert_eq!(store.client("Alice").and_then(|c| c.home_tile), Some(TileId(42)));

    send(&mut alice, &PeerRecord::AbandonSettlement).await;
    assert_eq!(
        recv(&mut bob).await,
        ServerRecord::SettlementRemove { tile: TileId(42) }
    );
    assert!(state.roster().lock().await.is_empty());
}

// =========================================================================
// Chat, liveness, gifts
// =========================================================================

#[tokio::test]
async fn test_chat_relayed_to_other_peer() {
    let (addr, state) = start_server(Arc::new(MemoryStore::new())).await;
    let (mut alice, _) = login(&addr, "Alice").await;
    let (mut bob, _) = login(&addr, "Bob").await;

    send(&mut alice, &PeerRecord::Chat { text: "hi all".into() }).await;

    assert_eq!(
        recv(&mut bob).await,
        ServerRecord::Chat {
            sender: "Alice".into(),
            text: "hi all".into(),
        }
    );
    eventually(|| {
        let state = state.clone();
        async move { state.chat().lock().await.len() == 1 }
    })
    .await;
}

#[tokio::test]
async fn test_ping_answered_with_pong() {
    let (addr, _state) = start_server(Arc::new(MemoryStore::new())).await;
    let (mut ws, _) = login(&addr, "Alice").await;

    send(&mut ws, &PeerRecord::Ping).await;
    assert_eq!(recv(&mut ws).await, ServerRecord::Pong);
}

#[tokio::test]
async fn test_queued_gifts_delivered_on_login() {
    let mut alice = ClientRecord::new("Alice", "secret");
    alice.gift_queue.push(GiftedItem {
        item_id: "Silver".into(),
        quantity: 100,
        quality: "Normal".into(),
    });
    let store = Arc::new(MemoryStore::new().with_client(alice));
    let (addr, _state) = start_server(store.clone()).await;

    let (mut ws, _) = login(&addr, "Alice").await;
    match recv(&mut ws).await {
        ServerRecord::GiftedItems(item) => assert_eq!(item.item_id, "Silver"),
        other => panic!("expected GiftedItems, got {other:?}"),
    }
    assert!(store.client("Alice").expect("saved").gift_queue.is_empty());
}

// =========================================================================
// Moderation through the console
// =========================================================================

#[tokio::test]
async fn test_kick_closes_connection() {
    let (addr, state) = start_server(Arc::new(MemoryStore::new())).await;
    let (mut ws, _) = login(&addr, "Alice").await;

    let mut console = Console::new(state.clone());
    console.execute("kick Alice").await.expect("kick");

    assert_eq!(
        recv(&mut ws).await,
        ServerRecord::Disconnect(DisconnectReason::Kicked)
    );
    expect_closed(&mut ws).await;

    eventually(|| {
        let state = state.clone();
        async move { !state.registry().lock().await.is_connected("Alice") }
    })
    .await;
}

#[tokio::test]
async fn test_exit_disconnects_everyone() {
    let (addr, state) = start_server(Arc::new(MemoryStore::new())).await;
    let (mut ws, _) = login(&addr, "Alice").await;

    let mut console = Console::new(state.clone());
    assert_eq!(console.execute("exit").await, Ok(Reply::Exit));

    assert_eq!(
        recv(&mut ws).await,
        ServerRecord::Disconnect(DisconnectReason::Closing)
    );
    expect_closed(&mut ws).await;
    assert!(state.is_shutting_down());

    // The accept loop releases the port once it stops.
    eventually(|| {
        let addr = addr.clone();
        async move { tokio::net::TcpStream::connect(&addr).await.is_err() }
    })
    .await;
}
