//! Topic adapter: publish and read topic-tagged messages across relays.

use crate::DEFAULT_READ_LIMIT;
use crate::config::{AdapterConfig, AdapterSettings};
use crate::error::{ClientError, Result};
use crate::publisher::{PublishOutcome, RelayPublisher};
use crate::retry::{Executor, RetryQueue};
use crate::subscriber::{ReadItem, RelaySubscriber};
use crate::transport::{RelayTransport, WebSocketTransport};
use nostr::{KeyError, Keypair, Signer, WifSigner};
use std::sync::Arc;
use tracing::info;

/// Publishes and reads messages for one topic on a fixed set of relays.
///
/// Construct with [`TopicAdapter::new`], call [`start`](TopicAdapter::start)
/// with the wallet secret, then [`publish`](TopicAdapter::publish) and
/// [`read`](TopicAdapter::read).
pub struct TopicAdapter<T: RelayTransport = WebSocketTransport, E: Executor = RetryQueue> {
    settings: AdapterSettings,
    signer: Box<dyn Signer>,
    keys: Option<Arc<Keypair>>,
    publisher: RelayPublisher<T, E>,
    subscriber: RelaySubscriber<T>,
}

impl TopicAdapter {
    /// Adapter over WebSocket relays with the configured retry policy.
    pub fn new(config: AdapterConfig) -> Result<Self> {
        let settings = config.resolve()?;
        let transport = WebSocketTransport::new(settings.relay.clone());
        let executor = RetryQueue::new(settings.retry.clone());
        Ok(Self::from_settings(settings, transport, executor))
    }
}

impl<T: RelayTransport, E: Executor> TopicAdapter<T, E> {
    /// Adapter with an explicit transport and executor.
    pub fn with_parts(config: AdapterConfig, transport: T, executor: E) -> Result<Self> {
        let settings = config.resolve()?;
        Ok(Self::from_settings(settings, transport, executor))
    }

    fn from_settings(settings: AdapterSettings, transport: T, executor: E) -> Self {
        let transport = Arc::new(transport);
        let publisher = RelayPublisher::new(
            Arc::clone(&transport),
            executor,
            settings.relays.clone(),
            settings.topic.clone(),
        );
        let subscriber = RelaySubscriber::new(transport, settings.relays.clone(), settings.topic.clone())
            .with_completion(settings.completion)
            .with_read_timeout(settings.read_timeout);

        Self {
            settings,
            signer: Box::new(WifSigner),
            keys: None,
            publisher,
            subscriber,
        }
    }

    /// Replace the key derivation used by `start`.
    pub fn with_signer(mut self, signer: impl Signer + 'static) -> Self {
        self.signer = Box::new(signer);
        self
    }

    /// Derive the signing keypair from the wallet secret.
    pub fn start(&mut self, secret: &str) -> Result<()> {
        let keys = self.signer.derive_keypair(secret).map_err(|e| match e {
            KeyError::EmptySecret => {
                ClientError::InvalidArgument("secret must be a non-empty string".to_string())
            }
            other => ClientError::InvalidArgument(format!("invalid secret: {}", other)),
        })?;

        info!(
            "Topic adapter for {} started with public key {}",
            self.settings.topic,
            keys.public_key_hex()
        );
        self.keys = Some(Arc::new(keys));
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.keys.is_some()
    }

    /// Sign `message` as a topic event and submit it to every relay.
    pub async fn publish(&self, message: &str) -> Result<PublishOutcome> {
        if message.is_empty() {
            return Err(ClientError::InvalidArgument(
                "message must be a non-empty string".to_string(),
            ));
        }
        let keys = self.keys.as_ref().ok_or(ClientError::NotStarted)?;
        self.publisher.publish(keys, message).await
    }

    /// Read up to `limit` stored messages per relay for this topic.
    pub async fn read(&self, limit: usize) -> Result<Vec<ReadItem>> {
        self.subscriber.read(limit).await
    }

    pub async fn read_default(&self) -> Result<Vec<ReadItem>> {
        self.read(DEFAULT_READ_LIMIT).await
    }

    /// NIP-19 `note1…` reference for an event id.
    pub fn encode_note(&self, event_id: &str) -> Result<String> {
        nostr::encode_note(event_id)
            .map_err(|e| ClientError::InvalidArgument(format!("invalid event id: {}", e)))
    }

    pub fn topic(&self) -> &str {
        &self.settings.topic
    }

    pub fn relays(&self) -> &[String] {
        &self.settings.relays
    }

    pub fn settings(&self) -> &AdapterSettings {
        &self.settings
    }

    /// Hex x-only public key, once started.
    pub fn public_key_hex(&self) -> Option<String> {
        self.keys.as_ref().map(|k| k.public_key_hex())
    }

    /// `npub1…` public key, once started.
    pub fn npub(&self) -> Option<String> {
        self.keys.as_ref().and_then(|k| k.npub().ok())
    }
}

impl<T: RelayTransport, E: Executor> std::fmt::Debug for TopicAdapter<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicAdapter")
            .field("topic", &self.settings.topic)
            .field("relays", &self.settings.relays)
            .field("started", &self.is_started())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Filter, RelayMessage};
    use crate::relay::PublishConfirmation;
    use crate::retry::{ImmediateExecutor, RetryConfig};
    use crate::transport::RelaySession;
    use async_trait::async_trait;
    use nostr::Event;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WIF: &str = "L1VZ55UPgF83k4ndU8BBf62eM9prgo4coie5ttZrvS8GBzddzrhD";
    const WIF_PUBKEY: &str = "17162c921dc4d2518f9a101db33695df1afb56ab82f5ff3e5da6eec3ca5cd917";

    /// In-memory relay network: accepts publishes from every relay except
    /// those marked down, and replays stored events on read.
    #[derive(Default)]
    struct MemoryRelays {
        down: Vec<String>,
        stored: Mutex<Vec<Event>>,
        calls: AtomicUsize,
    }

    struct MemorySession {
        events: Vec<Event>,
        pending: Vec<RelayMessage>,
    }

    #[async_trait]
    impl RelaySession for MemorySession {
        async fn subscribe(&mut self, subscription_id: &str, filter: Filter) -> Result<()> {
            let limit = filter.limit.unwrap_or(u64::MAX) as usize;
            self.pending = self
                .events
                .iter()
                .filter(|e| filter.matches(e))
                .take(limit)
                .map(|e| RelayMessage::Event {
                    subscription_id: subscription_id.to_string(),
                    event: e.clone(),
                })
                .collect();
            self.pending.push(RelayMessage::Eose {
                subscription_id: subscription_id.to_string(),
            });
            self.pending.reverse();
            Ok(())
        }

        async fn next_message(&mut self) -> Result<Option<RelayMessage>> {
            Ok(self.pending.pop())
        }

        async fn close_subscription(&mut self, _subscription_id: &str) -> Result<()> {
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl RelayTransport for MemoryRelays {
        async fn publish(&self, relay_url: &str, event: &Event) -> Result<PublishConfirmation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.down.iter().any(|r| r == relay_url) {
                return Err(ClientError::WebSocket("connection refused".to_string()));
            }
            self.stored.lock().unwrap().push(event.clone());
            Ok(PublishConfirmation {
                event_id: event.id.clone(),
                accepted: true,
                message: String::new(),
            })
        }

        async fn open(&self, relay_url: &str) -> Result<Box<dyn RelaySession>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.down.iter().any(|r| r == relay_url) {
                return Err(ClientError::WebSocket("connection refused".to_string()));
            }
            Ok(Box::new(MemorySession {
                events: self.stored.lock().unwrap().clone(),
                pending: Vec::new(),
            }))
        }
    }

    fn config() -> AdapterConfig {
        AdapterConfig::new("test-topic").with_relays(["wss://r1", "wss://r2", "wss://r3"])
    }

    fn adapter(relays: MemoryRelays) -> TopicAdapter<MemoryRelays, ImmediateExecutor> {
        TopicAdapter::with_parts(config(), relays, ImmediateExecutor).unwrap()
    }

    #[test]
    fn test_new_defaults() {
        let adapter = TopicAdapter::new(AdapterConfig::new("news")).unwrap();
        assert_eq!(adapter.topic(), "news");
        assert_eq!(adapter.relays().len(), 3);
        assert!(!adapter.is_started());
        assert_eq!(adapter.public_key_hex(), None);
    }

    #[test]
    fn test_new_without_topic_fails() {
        let result = TopicAdapter::new(AdapterConfig::default());
        assert!(matches!(result, Err(ClientError::InvalidArgument(_))));
    }

    #[test]
    fn test_start_derives_wif_keys() {
        let mut adapter = adapter(MemoryRelays::default());
        adapter.start(WIF).unwrap();

        assert!(adapter.is_started());
        assert_eq!(adapter.public_key_hex().as_deref(), Some(WIF_PUBKEY));
        assert_eq!(
            adapter.npub().as_deref(),
            Some("npub1zutzeysacnf9rru6zqwmxd54mud0k44tst6l70ja5mhv8jjumytsd2x7nu")
        );
    }

    #[test]
    fn test_start_rejects_bad_secrets() {
        let mut adapter = adapter(MemoryRelays::default());

        assert!(adapter.start("").unwrap_err().is_invalid_argument());
        assert!(adapter.start("not-a-wif").unwrap_err().is_invalid_argument());
        assert!(!adapter.is_started());
    }

    #[tokio::test]
    async fn test_publish_before_start() {
        let adapter = adapter(MemoryRelays::default());
        let result = adapter.publish("hello").await;
        assert!(matches!(result, Err(ClientError::NotStarted)));
    }

    #[tokio::test]
    async fn test_publish_empty_message_checked_first() {
        let relays = MemoryRelays::default();
        let mut adapter = adapter(relays);
        adapter.start(WIF).unwrap();

        let result = adapter.publish("").await;
        assert!(matches!(result, Err(ClientError::InvalidArgument(_))));
        assert_eq!(adapter.publisher_calls(), 0);
    }

    #[tokio::test]
    async fn test_read_zero_limit() {
        let adapter = adapter(MemoryRelays::default());
        let result = adapter.read(0).await;
        assert!(matches!(result, Err(ClientError::InvalidArgument(_))));
        assert_eq!(adapter.publisher_calls(), 0);
    }

    #[tokio::test]
    async fn test_publish_then_read() {
        let relays = MemoryRelays {
            down: vec!["wss://r2".to_string()],
            ..Default::default()
        };
        let mut adapter = adapter(relays);
        adapter.start(WIF).unwrap();

        let outcome = adapter.publish("hello topic").await.unwrap();
        assert_eq!(outcome.accepted(), 2);
        assert_eq!(outcome.failures[0].relay_url, "wss://r2");

        let items = adapter.read_default().await.unwrap();
        assert!(!items.is_empty());
        assert!(items.iter().all(|i| i.content == "hello topic"));
        assert!(items.iter().all(|i| i.event_id == outcome.event_ids[0]));
    }

    #[tokio::test]
    async fn test_publish_with_retry_queue_counts_attempts() {
        let relays = MemoryRelays {
            down: vec!["wss://r3".to_string()],
            ..Default::default()
        };
        let executor = RetryQueue::new(RetryConfig::default().without_delay());
        let mut adapter = TopicAdapter::with_parts(config(), relays, executor).unwrap();
        adapter.start(WIF).unwrap();

        let outcome = adapter.publish("retry me").await.unwrap();

        assert_eq!(outcome.accepted(), 2);
        assert_eq!(outcome.failures.len(), 1);
        // One attempt each for the healthy relays, five for the one that is down
        assert_eq!(adapter.publisher_calls(), 7);
    }

    #[test]
    fn test_encode_note() {
        let adapter = adapter(MemoryRelays::default());
        let id = "2e4b14f5d54a4190c0101b87382db1ce5ef9ec5db39dc2265bac5bd9d91cded2";

        let note = adapter.encode_note(id).unwrap();
        assert_eq!(note, "note19e93faw4ffqepsqsrwrnstd3ee00nmzakwwuyfjm43dankgummfqms4p6q");
        assert_eq!(adapter.encode_note(id).unwrap(), note);
        assert!(adapter.encode_note("xyz").unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_debug_hides_keys() {
        let mut adapter = adapter(MemoryRelays::default());
        adapter.start(WIF).unwrap();
        let debug = format!("{:?}", adapter);
        assert!(debug.contains("test-topic"));
        assert!(!debug.contains(WIF));
    }

    impl<E: Executor> TopicAdapter<MemoryRelays, E> {
        fn publisher_calls(&self) -> usize {
            self.publisher.transport().calls.load(Ordering::SeqCst)
        }
    }
}
