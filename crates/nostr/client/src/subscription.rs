//! Subscription bookkeeping for topic reads.
//!
//! A read opens one subscription per relay. `ReadTracker` follows each relay
//! through `Connecting -> Subscribed -> Draining -> Closed` and decides when
//! the read as a whole is complete under its `CompletionPolicy`.

use crate::message::Filter;
use crate::{TOPIC_MESSAGE_KIND, TOPIC_TAG};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate a unique subscription ID.
pub fn generate_subscription_id() -> String {
    Uuid::new_v4().to_string()[..8].to_string()
}

/// Filter for topic messages: `{"kinds":[867],"limit":n,"#t":[topic]}`.
pub fn topic_filter(topic: &str, limit: usize) -> Filter {
    Filter::new()
        .kinds(vec![TOPIC_MESSAGE_KIND])
        .limit(limit as u64)
        .tag(TOPIC_TAG, vec![topic.to_string()])
}

/// When a multi-relay read resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum CompletionPolicy {
    /// Resolve as soon as any relay finishes after end of stored events.
    ///
    /// Events still in flight from slower relays are dropped.
    #[default]
    FirstEose,
    /// Resolve once every relay has finished, successfully or not.
    AllRelays,
}

/// Why a relay's reader stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderExit {
    /// The relay sent EOSE and the subscription was closed.
    EndOfStoredEvents,
    /// Connecting, subscribing, or receiving failed.
    Failed(String),
}

/// Per-relay read state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayReadState {
    /// Opening the connection
    Connecting,
    /// REQ sent, forwarding matching events
    Subscribed,
    /// EOSE received, closing the subscription
    Draining,
    /// Done with this relay
    Closed(ReaderExit),
}

impl RelayReadState {
    pub fn is_closed(&self) -> bool {
        matches!(self, RelayReadState::Closed(_))
    }
}

/// Tracks every relay taking part in one read.
#[derive(Debug, Clone)]
pub struct ReadTracker {
    /// Subscription ID
    pub id: String,
    /// Filter sent to every relay
    pub filter: Filter,
    policy: CompletionPolicy,
    relays: Vec<(String, RelayReadState)>,
}

impl ReadTracker {
    /// Create a new tracker.
    pub fn new(id: impl Into<String>, filter: Filter, policy: CompletionPolicy) -> Self {
        Self {
            id: id.into(),
            filter,
            policy,
            relays: Vec::new(),
        }
    }

    /// Add a relay in the `Connecting` state and return its index.
    ///
    /// Relays are tracked by position so a URL listed twice counts twice.
    pub fn add_relay(&mut self, relay_url: impl Into<String>) -> usize {
        self.relays
            .push((relay_url.into(), RelayReadState::Connecting));
        self.relays.len() - 1
    }

    /// Move a relay to a new state. `Closed` is terminal.
    pub fn set_state(&mut self, index: usize, state: RelayReadState) {
        if let Some((_, current)) = self.relays.get_mut(index)
            && !current.is_closed()
        {
            *current = state;
        }
    }

    pub fn state(&self, index: usize) -> Option<&RelayReadState> {
        self.relays.get(index).map(|(_, state)| state)
    }

    pub fn relay_url(&self, index: usize) -> Option<&str> {
        self.relays.get(index).map(|(url, _)| url.as_str())
    }

    /// Get the number of relays in this read.
    pub fn relay_count(&self) -> usize {
        self.relays.len()
    }

    /// Relays that finished after EOSE.
    pub fn eose_count(&self) -> usize {
        self.relays
            .iter()
            .filter(|(_, state)| *state == RelayReadState::Closed(ReaderExit::EndOfStoredEvents))
            .count()
    }

    pub fn all_closed(&self) -> bool {
        self.relays.iter().all(|(_, state)| state.is_closed())
    }

    /// Every relay closed and none reached EOSE.
    pub fn all_failed(&self) -> bool {
        !self.relays.is_empty() && self.all_closed() && self.eose_count() == 0
    }

    /// Whether the read can resolve.
    pub fn is_complete(&self) -> bool {
        if self.all_closed() {
            return true;
        }
        match self.policy {
            CompletionPolicy::FirstEose => self.eose_count() > 0,
            CompletionPolicy::AllRelays => false,
        }
    }
}
