//! Fan-out publishing of topic messages.

use crate::error::{ClientError, Result};
use crate::retry::Executor;
use crate::transport::RelayTransport;
use crate::{TOPIC_MESSAGE_KIND, TOPIC_TAG};
use nostr::{Event, EventTemplate, Keypair, finalize_event};
use std::sync::Arc;
use tracing::{info, warn};

/// A relay that did not accept the event after every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayFailure {
    pub relay_url: String,
    pub reason: String,
}

impl RelayFailure {
    pub fn into_error(self) -> ClientError {
        ClientError::RelayFailure {
            relay_url: self.relay_url,
            reason: self.reason,
        }
    }
}

/// Result of publishing one message to every configured relay.
///
/// `event_ids` holds one entry per accepting relay, in relay list order.
/// Every relay appears exactly once across `event_ids` and `failures`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    pub event_ids: Vec<String>,
    pub failures: Vec<RelayFailure>,
}

impl PublishOutcome {
    /// No relay accepted the event.
    pub fn is_empty(&self) -> bool {
        self.event_ids.is_empty()
    }

    /// Number of relays that accepted the event.
    pub fn accepted(&self) -> usize {
        self.event_ids.len()
    }

    pub fn all_accepted(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn into_event_ids(self) -> Vec<String> {
        self.event_ids
    }
}

/// Signs topic messages and submits them to each relay through an executor.
pub struct RelayPublisher<T: RelayTransport, E: Executor> {
    transport: Arc<T>,
    executor: E,
    relays: Vec<String>,
    topic: String,
}

impl<T: RelayTransport, E: Executor> RelayPublisher<T, E> {
    pub fn new(transport: Arc<T>, executor: E, relays: Vec<String>, topic: impl Into<String>) -> Self {
        Self {
            transport,
            executor,
            relays,
            topic: topic.into(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Build and sign a kind 867 event tagged `["t", topic]`.
    pub fn build_event(&self, keys: &Keypair, message: &str) -> Result<Event> {
        let template = EventTemplate::now(
            TOPIC_MESSAGE_KIND,
            vec![vec![TOPIC_TAG.to_string(), self.topic.clone()]],
            message.to_string(),
        );
        Ok(finalize_event(&template, &keys.private_key)?)
    }

    /// Publish `message` to every relay.
    ///
    /// Per-relay failures are recorded in the outcome; only an empty message
    /// or a signing failure makes the call itself fail.
    pub async fn publish(&self, keys: &Keypair, message: &str) -> Result<PublishOutcome> {
        if message.is_empty() {
            return Err(ClientError::InvalidArgument(
                "message must be a non-empty string".to_string(),
            ));
        }

        let event = self.build_event(keys, message)?;
        let mut outcome = PublishOutcome::default();

        for relay_url in &self.relays {
            let transport = self.transport.as_ref();
            let relay_url = relay_url.as_str();
            let event_ref = &event;
            let task_name = format!("publish {} to {}", event.id, relay_url);

            let result = self
                .executor
                .execute(&task_name, move || transport.publish(relay_url, event_ref))
                .await;

            match result {
                Ok(confirmation) => outcome.event_ids.push(confirmation.event_id),
                Err(e) => {
                    warn!("Giving up on relay {}: {}", relay_url, e);
                    outcome.failures.push(RelayFailure {
                        relay_url: relay_url.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Published event {} to {}/{} relays",
            event.id,
            outcome.accepted(),
            self.relays.len()
        );
        Ok(outcome)
    }
}
