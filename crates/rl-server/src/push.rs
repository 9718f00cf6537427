//! Server side of the device channel
//!
//! Agents open a WebSocket at `/ws` and must send `AUTH` within the auth
//! timeout. Once authenticated, the channel forwards every lock state change
//! from the coordinator as `LOCK` or `UNLOCK`. `PING` is answered with
//! `PONG` in any state, and a channel without inbound traffic for the idle
//! timeout is closed.
//!
//! The per-message decisions live in [`ChannelSession`], which has no I/O;
//! [`handle_socket`] drives it from the socket, the broadcast receiver and
//! the liveness deadline.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use rl_core::auth::{self, AuthAssertion};
use rl_core::time::current_time_millis;
use rl_core::DeviceId;
use rl_protocol::{close_code, codec, ChannelMessage, LockState, MAX_MESSAGE_SIZE};

use crate::auth::DeviceRegistry;
use crate::connection::{DeviceSession, Liveness};
use crate::state::ServerState;

/// Close code sent when the server shuts down
const GOING_AWAY: u16 = 1001;

/// What the driver should do after a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Nothing to send
    Ignore,
    /// Send a message and keep the channel open
    Send(ChannelMessage),
    /// The agent proved its identity; send `AUTH_OK`
    Authenticated(DeviceId),
    /// Send a message, then close with `code` and `reason`
    Close {
        message: ChannelMessage,
        code: u16,
        reason: String,
    },
}

/// Protocol state of one device channel
pub struct ChannelSession {
    registry: Arc<DeviceRegistry>,
    auth_window: Duration,
    device_id: Option<DeviceId>,
    /// Last command forwarded to the agent
    forwarded: Option<ChannelMessage>,
}

impl ChannelSession {
    pub fn new(registry: Arc<DeviceRegistry>, auth_window: Duration) -> Self {
        Self {
            registry,
            auth_window,
            device_id: None,
            forwarded: None,
        }
    }

    /// The authenticated device, if any
    pub fn device_id(&self) -> Option<&DeviceId> {
        self.device_id.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.device_id.is_some()
    }

    /// Handle one decoded message received at `now` (ms)
    pub fn on_message(&mut self, message: ChannelMessage, now: u64) -> Reply {
        match message {
            ChannelMessage::Auth {
                device_id,
                signature,
                timestamp,
            } => {
                if let Some(current) = &self.device_id {
                    tracing::debug!("Ignoring repeated AUTH on channel of {}", current);
                    return Reply::Send(ChannelMessage::error("already authenticated"));
                }

                let assertion = AuthAssertion {
                    device_id,
                    timestamp,
                    signature,
                };
                match auth::verify(&assertion, self.registry.as_ref(), now, self.auth_window) {
                    Ok(id) => {
                        self.device_id = Some(id.clone());
                        Reply::Authenticated(id)
                    }
                    Err(e) => {
                        tracing::warn!("Rejected AUTH for {}: {}", assertion.device_id, e);
                        Reply::Close {
                            message: ChannelMessage::error(format!("auth failed: {}", e)),
                            code: close_code::AUTH_REJECTED,
                            reason: e.to_string(),
                        }
                    }
                }
            }

            ChannelMessage::Ping => Reply::Send(ChannelMessage::Pong),

            other => {
                tracing::debug!(
                    "Ignoring unexpected {} from agent",
                    other.message_type().as_str()
                );
                Reply::Ignore
            }
        }
    }

    /// Command to forward for a coordinator update, if the channel may see
    /// it and it differs from the last one forwarded.
    ///
    /// A message edit while unlocked maps to the same `UNLOCK` as before and
    /// is not sent again.
    pub fn on_update(&mut self, state: &LockState) -> Option<ChannelMessage> {
        if !self.is_authenticated() {
            return None;
        }
        let command = ChannelMessage::command_for(state);
        if self.forwarded.as_ref() == Some(&command) {
            return None;
        }
        self.forwarded = Some(command.clone());
        Some(command)
    }
}

/// `GET /ws`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(server): State<Arc<ServerState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Response {
    let peer = connect_info
        .map(|ConnectInfo(addr)| addr)
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 0)));

    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, server, peer))
}

/// Run a device channel until it closes
pub async fn handle_socket(socket: WebSocket, server: Arc<ServerState>, peer: SocketAddr) {
    let session = server.sessions.open(peer);
    tracing::info!("Device channel {} opened from {}", session.id, peer);

    let result = run_channel(socket, &server, &session).await;
    server.sessions.close(&session.id);

    let device = session
        .device_id()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "unauthenticated".to_string());
    match result {
        Ok(reason) => {
            tracing::info!("Device channel {} ({}) closed: {}", session.id, device, reason)
        }
        Err(e) => tracing::warn!("Device channel {} ({}) failed: {:#}", session.id, device, e),
    }
}

type Sink = SplitSink<WebSocket, Message>;

async fn run_channel(
    socket: WebSocket,
    server: &ServerState,
    session: &DeviceSession,
) -> Result<String> {
    let (mut sink, mut stream) = socket.split();
    let mut channel = ChannelSession::new(Arc::clone(&server.devices), server.config.auth_window);
    let mut liveness = Liveness::new(server.config.auth_timeout, server.config.idle_timeout);
    let mut updates = server.coordinator.subscribe();

    loop {
        let (deadline, expiry) = liveness.deadline(channel.is_authenticated());

        tokio::select! {
            _ = server.shutdown.cancelled() => {
                close(&mut sink, GOING_AWAY, "server shutting down").await;
                return Ok("server shutdown".to_string());
            }

            _ = tokio::time::sleep_until(deadline) => {
                close(&mut sink, expiry.close_code(), expiry.reason()).await;
                return Ok(expiry.reason().to_string());
            }

            frame = stream.next() => {
                let frame = match frame {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) => return Err(e).context("receive failed"),
                    None => return Ok("disconnected".to_string()),
                };
                liveness.touch();
                session.touch();

                let text = match frame {
                    Message::Text(text) => text,
                    Message::Close(_) => return Ok("closed by agent".to_string()),
                    // Transport-level ping/pong is answered by the socket itself
                    Message::Ping(_) | Message::Pong(_) => continue,
                    Message::Binary(data) => {
                        tracing::debug!("Dropping {} byte binary frame from {}", data.len(), session.peer);
                        continue;
                    }
                };

                let message = match codec::decode(&text) {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::debug!("Dropping undecodable frame from {}: {}", session.peer, e);
                        continue;
                    }
                };
                tracing::trace!("Received {} from {}", message.message_type().as_str(), session.peer);

                match channel.on_message(message, current_time_millis()) {
                    Reply::Ignore => {}
                    Reply::Send(reply) => send(&mut sink, &reply).await?,
                    Reply::Authenticated(device_id) => {
                        session.authenticate(device_id.clone());
                        tracing::info!("Device {} authenticated on channel {}", device_id, session.id);
                        send(&mut sink, &ChannelMessage::AuthOk {
                            device_id: device_id.to_string(),
                        })
                        .await?;
                    }
                    Reply::Close { message, code, reason } => {
                        send(&mut sink, &message).await?;
                        close(&mut sink, code, &reason).await;
                        return Ok(format!("auth rejected: {}", reason));
                    }
                }
            }

            update = updates.recv() => {
                let state = match update {
                    Ok(state) => state,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Skipped states are stale; the current one is all the agent needs
                        tracing::warn!("Device channel {} lagged by {} updates", session.id, n);
                        server.coordinator.snapshot().await
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Ok("coordinator closed".to_string());
                    }
                };

                if let Some(command) = channel.on_update(&state) {
                    tracing::debug!(
                        "Pushing {} to {}",
                        command.message_type().as_str(),
                        session.peer
                    );
                    send(&mut sink, &command).await?;
                }
            }
        }
    }
}

async fn send(sink: &mut Sink, message: &ChannelMessage) -> Result<()> {
    let text = codec::encode(message)?;
    sink.send(Message::Text(text))
        .await
        .context("send failed")
}

async fn close(sink: &mut Sink, code: u16, reason: &str) {
    let frame = CloseFrame {
        code,
        reason: reason.to_string().into(),
    };
    if let Err(e) = sink.send(Message::Close(Some(frame))).await {
        tracing::debug!("Failed to send close frame: {}", e);
    }
}
