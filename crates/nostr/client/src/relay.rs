//! Single relay connection management
//!
//! Provides an async WebSocket connection to one Nostr relay: connect with a
//! timeout, send client messages, receive relay messages, and publish an event
//! while waiting for the relay's `OK` confirmation.

use crate::error::{ClientError, Result};
use crate::message::{ClientMessage, Filter, RelayMessage};
use futures::{SinkExt, StreamExt};
use nostr::Event;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Disconnected
    Disconnected,
    /// Currently connecting
    Connecting,
    /// Connected and ready
    Connected,
}

/// Confirmation result for event publishing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishConfirmation {
    /// Event ID that was published
    pub event_id: String,
    /// Whether the relay accepted the event
    pub accepted: bool,
    /// Message from the relay (empty if accepted, error message if rejected)
    pub message: String,
}

/// Relay connection configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Connection timeout
    pub connect_timeout: Duration,
    /// How long to wait for an `OK` after sending an event
    pub confirmation_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            confirmation_timeout: Duration::from_secs(10),
        }
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Relay connection
pub struct RelayConnection {
    url: Url,
    config: RelayConfig,
    state: ConnectionState,
    ws: Option<WsStream>,
}

impl RelayConnection {
    /// Create a new relay connection (does not connect yet)
    pub fn new(url: &str) -> Result<Self> {
        Self::with_config(url, RelayConfig::default())
    }

    /// Create a new relay connection with custom config
    pub fn with_config(url: &str, config: RelayConfig) -> Result<Self> {
        let url = Url::parse(url)?;

        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(ClientError::InvalidUrl(format!(
                "URL must use ws:// or wss:// scheme, got: {}",
                url.scheme()
            )));
        }

        Ok(Self {
            url,
            config,
            state: ConnectionState::Disconnected,
            ws: None,
        })
    }

    /// Relay URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Connect to the relay
    pub async fn connect(&mut self) -> Result<()> {
        if self.state != ConnectionState::Disconnected {
            return Err(ClientError::AlreadyConnected);
        }
        self.state = ConnectionState::Connecting;

        debug!("Connecting to relay: {}", self.url);
        let connect_start = Instant::now();

        let ws_stream = match timeout(
            self.config.connect_timeout,
            connect_async(self.url.as_str()),
        )
        .await
        {
            Ok(Ok((stream, _))) => stream,
            Ok(Err(e)) => {
                self.state = ConnectionState::Disconnected;
                return Err(ClientError::WebSocket(e.to_string()));
            }
            Err(_) => {
                self.state = ConnectionState::Disconnected;
                return Err(ClientError::Timeout(format!(
                    "Connection timeout after {:?}",
                    self.config.connect_timeout
                )));
            }
        };

        self.ws = Some(ws_stream);
        self.state = ConnectionState::Connected;
        info!(
            "Connected to relay: {} (took {:?})",
            self.url,
            connect_start.elapsed()
        );
        Ok(())
    }

    /// Disconnect from the relay
    pub async fn disconnect(&mut self) -> Result<()> {
        if self.state == ConnectionState::Disconnected {
            return Ok(());
        }

        if let Some(mut stream) = self.ws.take() {
            let _ = stream.close(None).await;
        }

        self.state = ConnectionState::Disconnected;
        debug!("Disconnected from relay: {}", self.url);
        Ok(())
    }

    /// Send a client message to the relay
    pub async fn send(&mut self, msg: &ClientMessage) -> Result<()> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }

        let msg_text = msg.to_json()?;
        debug!("Sending to {}: {}", self.url, msg_text);

        let stream = self.ws.as_mut().ok_or(ClientError::NotConnected)?;
        stream
            .send(Message::Text(msg_text.into()))
            .await
            .map_err(|e| ClientError::WebSocket(e.to_string()))
    }

    /// Receive the next relay message.
    ///
    /// Returns `Ok(None)` once the relay closes the connection. Frames that are
    /// not valid relay messages are skipped.
    pub async fn recv(&mut self) -> Result<Option<RelayMessage>> {
        loop {
            if !self.is_connected() {
                return Err(ClientError::NotConnected);
            }
            let stream = self.ws.as_mut().ok_or(ClientError::NotConnected)?;

            match stream.next().await {
                Some(Ok(Message::Text(text))) => match RelayMessage::from_json(&text) {
                    Ok(msg) => return Ok(Some(msg)),
                    Err(e) => {
                        debug!("Ignoring unparsable frame from {}: {}", self.url, e);
                    }
                },
                Some(Ok(Message::Ping(data))) => {
                    stream
                        .send(Message::Pong(data))
                        .await
                        .map_err(|e| ClientError::WebSocket(e.to_string()))?;
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("Relay closed connection: {}", self.url);
                    self.ws = None;
                    self.state = ConnectionState::Disconnected;
                    return Ok(None);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    self.ws = None;
                    self.state = ConnectionState::Disconnected;
                    return Err(ClientError::WebSocket(e.to_string()));
                }
            }
        }
    }

    /// Publish an event and wait for confirmation from the relay
    ///
    /// Messages other than the matching `OK` are logged and skipped while
    /// waiting.
    pub async fn publish_event(&mut self, event: &Event) -> Result<PublishConfirmation> {
        self.send(&ClientMessage::Event(event.clone())).await?;

        let wait = self.config.confirmation_timeout;
        let url = self.url.to_string();
        let event_id = event.id.clone();

        let confirmation: std::result::Result<Result<PublishConfirmation>, _> = timeout(wait, async {
            loop {
                match self.recv().await? {
                    Some(RelayMessage::Ok {
                        event_id: id,
                        success,
                        message,
                    }) if id == event_id => {
                        return Ok(PublishConfirmation {
                            event_id: id,
                            accepted: success,
                            message,
                        });
                    }
                    Some(RelayMessage::Notice { message }) => {
                        warn!("Notice from {}: {}", url, message);
                    }
                    Some(other) => debug!("Skipping {:?} while awaiting OK from {}", other, url),
                    None => {
                        return Err(ClientError::PublishFailed(
                            "connection closed before confirmation".to_string(),
                        ));
                    }
                }
            }
        })
        .await;

        match confirmation {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout(format!(
                "Event confirmation timeout after {:?}",
                wait
            ))),
        }
    }

    /// Subscribe to events matching filters
    pub async fn subscribe(&mut self, subscription_id: &str, filters: Vec<Filter>) -> Result<()> {
        self.send(&ClientMessage::Req {
            subscription_id: subscription_id.to_string(),
            filters,
        })
        .await
    }

    /// Close a subscription
    pub async fn close_subscription(&mut self, subscription_id: &str) -> Result<()> {
        self.send(&ClientMessage::Close {
            subscription_id: subscription_id.to_string(),
        })
        .await
    }
}

impl std::fmt::Debug for RelayConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConnection")
            .field("url", &self.url.as_str())
            .field("state", &self.state)
            .finish()
    }
}
