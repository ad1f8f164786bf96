//! Fan-in reads of topic messages.
//!
//! Each read spawns one reader task per relay into a `JoinSet` owned by the
//! call. Readers push matching events and state changes over a channel to the
//! aggregating loop, which stops as soon as the `ReadTracker` reports the read
//! complete. The set is shut down before returning, and dropping the read
//! future aborts every reader, so no connection outlives the call.

use crate::error::{ClientError, Result};
use crate::message::{Filter, RelayMessage};
use crate::subscription::{
    CompletionPolicy, ReadTracker, ReaderExit, RelayReadState, generate_subscription_id,
    topic_filter,
};
use crate::transport::RelayTransport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// One topic message returned by a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadItem {
    pub content: String,
    pub event_id: String,
}

enum ReaderUpdate {
    State { index: usize, state: RelayReadState },
    Item(ReadItem),
}

/// Reads topic messages from every configured relay.
pub struct RelaySubscriber<T: RelayTransport> {
    transport: Arc<T>,
    relays: Vec<String>,
    topic: String,
    completion: CompletionPolicy,
    read_timeout: Option<Duration>,
}

impl<T: RelayTransport> RelaySubscriber<T> {
    pub fn new(transport: Arc<T>, relays: Vec<String>, topic: impl Into<String>) -> Self {
        Self {
            transport,
            relays,
            topic: topic.into(),
            completion: CompletionPolicy::default(),
            read_timeout: None,
        }
    }

    pub fn with_completion(mut self, completion: CompletionPolicy) -> Self {
        self.completion = completion;
        self
    }

    /// Fail reads that have not completed within `read_timeout`.
    /// Without one a read waits for as long as the relays keep it open.
    pub fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn completion(&self) -> CompletionPolicy {
        self.completion
    }

    /// Collect up to `limit` stored topic messages per relay.
    ///
    /// Items come back in arrival order across relays and are not
    /// de-duplicated; the same event delivered by two relays appears twice.
    pub async fn read(&self, limit: usize) -> Result<Vec<ReadItem>> {
        if limit == 0 {
            return Err(ClientError::InvalidArgument(
                "limit must be a positive integer".to_string(),
            ));
        }
        if self.relays.is_empty() {
            return Ok(Vec::new());
        }

        let filter = topic_filter(&self.topic, limit);
        let mut tracker = ReadTracker::new(generate_subscription_id(), filter, self.completion);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut readers = JoinSet::new();

        for relay_url in &self.relays {
            let index = tracker.add_relay(relay_url.clone());
            readers.spawn(run_reader(
                Arc::clone(&self.transport),
                index,
                relay_url.clone(),
                tracker.id.clone(),
                tracker.filter.clone(),
                tx.clone(),
            ));
        }
        drop(tx);

        debug!(
            "Reading topic {} from {} relays (subscription {})",
            self.topic,
            tracker.relay_count(),
            tracker.id
        );

        let collect = async {
            let mut items = Vec::new();
            while let Some(update) = rx.recv().await {
                match update {
                    ReaderUpdate::Item(item) => items.push(item),
                    ReaderUpdate::State { index, state } => {
                        tracker.set_state(index, state);
                        if tracker.is_complete() {
                            break;
                        }
                    }
                }
            }
            items
        };

        let collected = match self.read_timeout {
            Some(limit_after) => timeout(limit_after, collect).await.map_err(|_| {
                ClientError::SubscriptionStall(format!(
                    "no relay completed topic {} within {:?}",
                    self.topic, limit_after
                ))
            }),
            None => Ok(collect.await),
        };

        readers.shutdown().await;
        let items = collected?;

        if tracker.all_failed() {
            warn!(
                "Every relay failed while reading topic {}; returning {} items",
                self.topic,
                items.len()
            );
        } else {
            info!(
                "Read {} items for topic {} ({}/{} relays reached EOSE)",
                items.len(),
                self.topic,
                tracker.eose_count(),
                tracker.relay_count()
            );
        }
        Ok(items)
    }
}

async fn run_reader<T: RelayTransport>(
    transport: Arc<T>,
    index: usize,
    relay_url: String,
    subscription_id: String,
    filter: Filter,
    tx: mpsc::UnboundedSender<ReaderUpdate>,
) {
    let exit = match read_relay(transport.as_ref(), index, &relay_url, &subscription_id, &filter, &tx).await {
        Ok(()) => ReaderExit::EndOfStoredEvents,
        Err(e) => {
            warn!("Read from {} failed: {}", relay_url, e);
            ReaderExit::Failed(e.to_string())
        }
    };

    let _ = tx.send(ReaderUpdate::State {
        index,
        state: RelayReadState::Closed(exit),
    });
}

async fn read_relay<T: RelayTransport>(
    transport: &T,
    index: usize,
    relay_url: &str,
    subscription_id: &str,
    filter: &Filter,
    tx: &mpsc::UnboundedSender<ReaderUpdate>,
) -> Result<()> {
    let mut session = transport.open(relay_url).await?;
    session.subscribe(subscription_id, filter.clone()).await?;
    let _ = tx.send(ReaderUpdate::State {
        index,
        state: RelayReadState::Subscribed,
    });

    loop {
        match session.next_message().await? {
            Some(RelayMessage::Event {
                subscription_id: sub_id,
                event,
            }) if sub_id == subscription_id => {
                if filter.matches(&event) {
                    let _ = tx.send(ReaderUpdate::Item(ReadItem {
                        content: event.content,
                        event_id: event.id,
                    }));
                } else {
                    debug!("Dropping non-matching event {} from {}", event.id, relay_url);
                }
            }
            Some(RelayMessage::Eose { subscription_id: sub_id }) if sub_id == subscription_id => {
                let _ = tx.send(ReaderUpdate::State {
                    index,
                    state: RelayReadState::Draining,
                });
                if let Err(e) = session.close_subscription(subscription_id).await {
                    debug!("CLOSE to {} failed: {}", relay_url, e);
                }
                let _ = session.close().await;
                return Ok(());
            }
            Some(RelayMessage::Closed {
                subscription_id: sub_id,
                message,
            }) if sub_id == subscription_id => {
                let _ = session.close().await;
                return Err(ClientError::SubscriptionClosed(message));
            }
            Some(RelayMessage::Notice { message }) => {
                warn!("Notice from {}: {}", relay_url, message);
            }
            Some(other) => debug!("Ignoring {:?} from {}", other, relay_url),
            None => {
                return Err(ClientError::Protocol(
                    "connection closed before end of stored events".to_string(),
                ));
            }
        }
    }
}
