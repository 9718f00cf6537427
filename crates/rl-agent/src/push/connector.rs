//! Device channel connector
//!
//! Opens the WebSocket to the server, drives a [`PushSession`] over it,
//! keeps it alive with `PING`s and hands control to the
//! [`ReconnectScheduler`] whenever the connection is lost.

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use rl_core::config::AgentConfig;
use rl_core::error::{ConfigError, TransportError};
use rl_core::time::current_time_millis;
use rl_core::DeviceCredential;
use rl_protocol::{codec, ChannelMessage, ProtocolError};

use super::reconnect::ReconnectScheduler;
use super::session::{CloseReason, PushSession, SessionEvent, SessionState};
use crate::dispatch::Dispatcher;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Errors that end a device channel
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The server refused the credential; retrying it as-is is pointless
    #[error("Authentication rejected by server: {0}")]
    AuthRejected(String),

    /// Connection-level failure; the scheduler retries
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A message could not be encoded
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The agent is not configured for push
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Keeps a device channel open for as long as the agent runs
pub struct PushConnector {
    config: AgentConfig,
    credential: DeviceCredential,
    url: String,
    dispatcher: Dispatcher,
}

impl PushConnector {
    /// Create a connector; fails if the credential or server URL is unusable
    pub fn new(config: AgentConfig, dispatcher: Dispatcher) -> Result<Self, ConnectionError> {
        let credential = config.credential()?;
        let url = config.websocket_url()?;
        Ok(Self {
            config,
            credential,
            url,
            dispatcher,
        })
    }

    /// Device channel URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Connect, and reconnect after every loss, until cancelled.
    ///
    /// Returns `Ok` on cancellation and `Err(AuthRejected)` if the server
    /// refuses the credential.
    pub async fn run(&self, scheduler: &mut ReconnectScheduler) -> Result<(), ConnectionError> {
        loop {
            match self.run_session(scheduler).await {
                Ok(CloseReason::Shutdown) => return Ok(()),
                Ok(reason) => tracing::warn!("Device channel closed: {:?}", reason),
                Err(ConnectionError::AuthRejected(reason)) => {
                    tracing::error!(
                        "Server rejected device {}: {}",
                        self.credential.device_id,
                        reason
                    );
                    return Err(ConnectionError::AuthRejected(reason));
                }
                Err(e) => tracing::warn!("Device channel failed: {}", e),
            }

            if !scheduler.wait().await {
                return Ok(());
            }
        }
    }

    /// One connection, from connect to close
    async fn run_session(
        &self,
        scheduler: &mut ReconnectScheduler,
    ) -> Result<CloseReason, ConnectionError> {
        let cancel = scheduler.cancel_token();
        let connect_timeout = self.config.connect_timeout;

        tracing::debug!("Connecting to {}", self.url);
        let connect = tokio::time::timeout(connect_timeout, connect_async(self.url.as_str()));
        let (mut ws, _) = tokio::select! {
            _ = cancel.cancelled() => return Ok(CloseReason::Shutdown),
            result = connect => result
                .map_err(|_| TransportError::Timeout(connect_timeout))?
                .map_err(|e| TransportError::Connect(e.to_string()))?,
        };
        tracing::info!("Connected to {}", self.url);

        let mut session = PushSession::new(self.credential.clone());
        let auth = session.open(current_time_millis());
        send(&mut ws, &auth).await?;

        let ping_interval = self.config.ping_interval;
        let mut keepalive = interval_at(Instant::now() + ping_interval, ping_interval);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_traffic = Instant::now();

        loop {
            let deadline = last_traffic + self.config.liveness_timeout;

            tokio::select! {
                _ = cancel.cancelled() => {
                    session.close(CloseReason::Shutdown);
                    if let Err(e) = ws.close(None).await {
                        tracing::debug!("Close on shutdown failed: {}", e);
                    }
                    return Ok(CloseReason::Shutdown);
                }

                _ = tokio::time::sleep_until(deadline) => {
                    tracing::warn!(
                        "No traffic from server for {:?}, dropping channel",
                        self.config.liveness_timeout
                    );
                    session.close(CloseReason::LivenessTimeout);
                    return Ok(CloseReason::LivenessTimeout);
                }

                _ = keepalive.tick(), if session.is_authenticated() => {
                    tracing::trace!("Sending PING");
                    send(&mut ws, &ChannelMessage::Ping).await?;
                }

                frame = ws.next() => {
                    let frame = match frame {
                        Some(Ok(frame)) => frame,
                        Some(Err(e)) => return Err(TransportError::Closed(e.to_string()).into()),
                        None => {
                            session.on_close(None, "");
                            return Ok(closed_reason(&session));
                        }
                    };
                    last_traffic = Instant::now();

                    match frame {
                        Message::Text(text) => {
                            let message = match codec::decode(&text) {
                                Ok(message) => message,
                                Err(e) => {
                                    tracing::debug!("Dropping undecodable frame: {}", e);
                                    continue;
                                }
                            };
                            let event = session.on_message(message);
                            self.handle_event(event, scheduler, &mut keepalive).await?;
                        }
                        Message::Close(frame) => {
                            let (code, reason) = frame
                                .map(|f| (Some(u16::from(f.code)), f.reason.to_string()))
                                .unwrap_or((None, String::new()));
                            if let SessionEvent::Rejected(reason) = session.on_close(code, &reason) {
                                return Err(ConnectionError::AuthRejected(reason));
                            }
                            return Ok(closed_reason(&session));
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    async fn handle_event(
        &self,
        event: SessionEvent,
        scheduler: &mut ReconnectScheduler,
        keepalive: &mut Interval,
    ) -> Result<(), ConnectionError> {
        match event {
            SessionEvent::None => {}
            SessionEvent::Authenticated => {
                tracing::info!("Device {} authenticated", self.credential.device_id);
                scheduler.reset();
                keepalive.reset();
            }
            SessionEvent::Lock(message) => self.dispatcher.raise(&message).await,
            SessionEvent::Unlock => self.dispatcher.lower().await,
            SessionEvent::Rejected(reason) => return Err(ConnectionError::AuthRejected(reason)),
        }
        Ok(())
    }
}

fn closed_reason(session: &PushSession) -> CloseReason {
    match session.state() {
        SessionState::Closed(reason) => reason.clone(),
        other => CloseReason::Disconnected(format!("ended while {:?}", other)),
    }
}

async fn send(ws: &mut Socket, message: &ChannelMessage) -> Result<(), ConnectionError> {
    let text = codec::encode(message)?;
    ws.send(Message::Text(text))
        .await
        .map_err(|e| TransportError::Closed(e.to_string()))?;
    Ok(())
}
