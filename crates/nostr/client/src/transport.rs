//! Transport seam between the publish/read logic and the network.
//!
//! `RelayTransport` submits events and opens read sessions against a relay
//! URL. The WebSocket implementation opens a fresh `RelayConnection` per call;
//! tests substitute in-memory transports.

use crate::error::{ClientError, Result};
use crate::message::{Filter, RelayMessage};
use crate::relay::{PublishConfirmation, RelayConfig, RelayConnection};
use async_trait::async_trait;
use nostr::Event;
use tracing::debug;

/// An open connection used by one read.
#[async_trait]
pub trait RelaySession: Send {
    /// Send `["REQ", subscription_id, filter]`.
    async fn subscribe(&mut self, subscription_id: &str, filter: Filter) -> Result<()>;

    /// Next relay message; `Ok(None)` when the relay hung up.
    async fn next_message(&mut self) -> Result<Option<RelayMessage>>;

    /// Send `["CLOSE", subscription_id]`.
    async fn close_subscription(&mut self, subscription_id: &str) -> Result<()>;

    /// Close the underlying connection.
    async fn close(&mut self) -> Result<()>;
}

/// Network access to relays.
#[async_trait]
pub trait RelayTransport: Send + Sync + 'static {
    /// Submit one event to one relay and return the relay's accepted confirmation.
    ///
    /// A rejection (`OK` with `false`) is an error so the caller's retry policy
    /// applies to it.
    async fn publish(&self, relay_url: &str, event: &Event) -> Result<PublishConfirmation>;

    /// Open a read session against one relay.
    async fn open(&self, relay_url: &str) -> Result<Box<dyn RelaySession>>;
}

#[async_trait]
impl RelaySession for RelayConnection {
    async fn subscribe(&mut self, subscription_id: &str, filter: Filter) -> Result<()> {
        RelayConnection::subscribe(self, subscription_id, vec![filter]).await
    }

    async fn next_message(&mut self) -> Result<Option<RelayMessage>> {
        self.recv().await
    }

    async fn close_subscription(&mut self, subscription_id: &str) -> Result<()> {
        RelayConnection::close_subscription(self, subscription_id).await
    }

    async fn close(&mut self) -> Result<()> {
        self.disconnect().await
    }
}

/// WebSocket transport: one short-lived connection per publish or read.
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport {
    config: RelayConfig,
}

impl WebSocketTransport {
    pub fn new(config: RelayConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

#[async_trait]
impl RelayTransport for WebSocketTransport {
    async fn publish(&self, relay_url: &str, event: &Event) -> Result<PublishConfirmation> {
        let mut conn = RelayConnection::with_config(relay_url, self.config.clone())?;
        conn.connect().await?;

        let result = conn.publish_event(event).await;
        let _ = conn.disconnect().await;

        let confirmation = result?;
        if !confirmation.accepted {
            return Err(ClientError::PublishFailed(format!(
                "{} rejected {}: {}",
                relay_url, confirmation.event_id, confirmation.message
            )));
        }

        debug!("{} accepted event {}", relay_url, confirmation.event_id);
        Ok(confirmation)
    }

    async fn open(&self, relay_url: &str) -> Result<Box<dyn RelaySession>> {
        let mut conn = RelayConnection::with_config(relay_url, self.config.clone())?;
        conn.connect().await?;
        Ok(Box::new(conn))
    }
}
