//! Device channel end-to-end tests
//!
//! Each test starts the real listener on an ephemeral port and talks to it
//! with a WebSocket client, the way an agent does.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use rl_core::auth::AuthAssertion;
use rl_core::config::ServerConfig;
use rl_core::time::current_time_millis;
use rl_core::DeviceCredential;
use rl_protocol::{close_code, codec, ChannelMessage};
use rl_server::{server, ServerState};

const SECRET: &str = "change-me-secret-123";
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Start a server with one registered device
async fn start_server(configure: impl FnOnce(&mut ServerConfig)) -> (Arc<ServerState>, SocketAddr) {
    let mut config = ServerConfig::default();
    config
        .devices
        .insert("laptop".to_string(), "device-secret".to_string());
    configure(&mut config);

    let state = Arc::new(ServerState::new(config, SECRET));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server_state = Arc::clone(&state);
    tokio::spawn(async move {
        server::serve_on(listener, server_state).await.unwrap();
    });

    (state, addr)
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{}/ws", addr))
        .await
        .expect("Failed to open device channel");
    ws
}

async fn send(ws: &mut Client, message: &ChannelMessage) {
    ws.send(Message::Text(codec::encode(message).unwrap()))
        .await
        .unwrap();
}

/// Next frame that is not transport-level ping/pong
async fn next_frame(ws: &mut Client) -> Message {
    loop {
        let frame = timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("Timed out waiting for a frame")
            .expect("Channel ended")
            .expect("Receive failed");
        if !matches!(frame, Message::Ping(_) | Message::Pong(_)) {
            return frame;
        }
    }
}

async fn recv(ws: &mut Client) -> ChannelMessage {
    match next_frame(ws).await {
        Message::Text(text) => codec::decode(&text).unwrap(),
        other => panic!("Expected a text frame, got {:?}", other),
    }
}

async fn recv_close_code(ws: &mut Client) -> u16 {
    match next_frame(ws).await {
        Message::Close(Some(frame)) => u16::from(frame.code),
        other => panic!("Expected a close frame, got {:?}", other),
    }
}

fn auth(secret: &str) -> ChannelMessage {
    let assertion = AuthAssertion::new(
        &DeviceCredential::new("laptop", secret),
        current_time_millis(),
    );
    ChannelMessage::Auth {
        device_id: assertion.device_id,
        signature: assertion.signature,
        timestamp: assertion.timestamp,
    }
}

async fn authenticated_client(addr: SocketAddr) -> Client {
    let mut ws = connect(addr).await;
    send(&mut ws, &auth("device-secret")).await;
    assert_eq!(
        recv(&mut ws).await,
        ChannelMessage::AuthOk {
            device_id: "laptop".to_string()
        }
    );
    ws
}

#[tokio::test]
async fn test_lock_and_unlock_are_pushed() {
    let (state, addr) = start_server(|_| {}).await;
    let mut ws = authenticated_client(addr).await;

    state
        .coordinator
        .set_locked(Some(SECRET), true, Some("test".to_string()), "admin")
        .await
        .unwrap();
    assert_eq!(
        recv(&mut ws).await,
        ChannelMessage::Lock {
            message: Some("test".to_string())
        }
    );

    state
        .coordinator
        .set_locked(Some(SECRET), false, None, "admin")
        .await
        .unwrap();
    assert_eq!(recv(&mut ws).await, ChannelMessage::Unlock);
}

#[tokio::test]
async fn test_oversized_lock_leaves_channel_usable() {
    let (state, addr) = start_server(|_| {}).await;
    let mut ws = authenticated_client(addr).await;

    let result = state
        .coordinator
        .set_locked(Some(SECRET), true, Some("x".repeat(70 * 1024)), "admin")
        .await;
    assert!(result.is_err());

    // Nothing was broadcast, and the channel still answers
    send(&mut ws, &ChannelMessage::Ping).await;
    assert_eq!(recv(&mut ws).await, ChannelMessage::Pong);

    state
        .coordinator
        .set_locked(Some(SECRET), true, Some("fits".to_string()), "admin")
        .await
        .unwrap();
    assert_eq!(
        recv(&mut ws).await,
        ChannelMessage::Lock {
            message: Some("fits".to_string())
        }
    );
}

#[tokio::test]
async fn test_message_edit_does_not_repeat_commands() {
    let (state, addr) = start_server(|_| {}).await;
    let mut ws = authenticated_client(addr).await;

    state
        .coordinator
        .set_locked(Some(SECRET), false, None, "admin")
        .await
        .unwrap();
    assert_eq!(recv(&mut ws).await, ChannelMessage::Unlock);

    // Unlocked edit: no second UNLOCK, the PONG comes first
    state
        .coordinator
        .set_message(Some(SECRET), Some("new text".to_string()))
        .await
        .unwrap();
    send(&mut ws, &ChannelMessage::Ping).await;
    assert_eq!(recv(&mut ws).await, ChannelMessage::Pong);

    state
        .coordinator
        .set_locked(Some(SECRET), true, None, "admin")
        .await
        .unwrap();
    assert_eq!(
        recv(&mut ws).await,
        ChannelMessage::Lock {
            message: Some("new text".to_string())
        }
    );

    // Locked edit: the new text is forwarded
    state
        .coordinator
        .set_message(Some(SECRET), Some("back at 3".to_string()))
        .await
        .unwrap();
    assert_eq!(
        recv(&mut ws).await,
        ChannelMessage::Lock {
            message: Some("back at 3".to_string())
        }
    );
}

#[tokio::test]
async fn test_unauthenticated_channel_gets_no_commands() {
    let (state, addr) = start_server(|_| {}).await;
    let mut ws = connect(addr).await;

    state
        .coordinator
        .set_locked(Some(SECRET), true, None, "admin")
        .await
        .unwrap();

    // The next thing this channel sees is the PONG, not a LOCK
    send(&mut ws, &ChannelMessage::Ping).await;
    assert_eq!(recv(&mut ws).await, ChannelMessage::Pong);
}

#[tokio::test]
async fn test_bad_signature_is_rejected_and_closed() {
    let (state, addr) = start_server(|_| {}).await;
    let mut ws = connect(addr).await;

    send(&mut ws, &auth("guessed")).await;
    assert_eq!(
        recv(&mut ws).await,
        ChannelMessage::error("auth failed: bad signature")
    );
    assert_eq!(recv_close_code(&mut ws).await, close_code::AUTH_REJECTED);

    // Rejection leaves the lock state alone
    assert!(!state.coordinator.get_state().await.locked);
}

#[tokio::test]
async fn test_unknown_device_is_rejected() {
    let (_state, addr) = start_server(|config| config.devices.clear()).await;
    let mut ws = connect(addr).await;

    send(&mut ws, &auth("device-secret")).await;
    assert_eq!(
        recv(&mut ws).await,
        ChannelMessage::error("auth failed: unknown device")
    );
    assert_eq!(recv_close_code(&mut ws).await, close_code::AUTH_REJECTED);
}

#[tokio::test]
async fn test_auth_timeout_closes_channel() {
    let (_state, addr) = start_server(|config| {
        config.auth_timeout = Duration::from_millis(200);
    })
    .await;
    let mut ws = connect(addr).await;

    assert_eq!(recv_close_code(&mut ws).await, close_code::AUTH_TIMEOUT);
}

#[tokio::test]
async fn test_idle_timeout_closes_channel() {
    let (_state, addr) = start_server(|config| {
        config.idle_timeout = Duration::from_millis(300);
    })
    .await;
    let mut ws = authenticated_client(addr).await;

    assert_eq!(recv_close_code(&mut ws).await, close_code::IDLE_TIMEOUT);
}

#[tokio::test]
async fn test_undecodable_frames_are_dropped() {
    let (_state, addr) = start_server(|_| {}).await;
    let mut ws = connect(addr).await;

    ws.send(Message::Text("{not json".to_string())).await.unwrap();
    ws.send(Message::Text(r#"{"type":"REBOOT"}"#.to_string()))
        .await
        .unwrap();

    send(&mut ws, &ChannelMessage::Ping).await;
    assert_eq!(recv(&mut ws).await, ChannelMessage::Pong);
}

#[tokio::test]
async fn test_sessions_are_tracked() {
    let (state, addr) = start_server(|_| {}).await;
    let mut ws = authenticated_client(addr).await;

    let devices = state.sessions.list();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].device_id.as_deref(), Some("laptop"));

    ws.close(None).await.unwrap();

    // The pool entry goes away once the server side notices
    timeout(RECV_TIMEOUT, async {
        while !state.sessions.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Session was not removed");
}

#[tokio::test]
async fn test_shutdown_closes_channels() {
    let (state, addr) = start_server(|_| {}).await;
    let mut ws = authenticated_client(addr).await;

    state.shutdown.cancel();
    assert_eq!(recv_close_code(&mut ws).await, 1001);
}
