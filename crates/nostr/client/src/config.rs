//! Adapter configuration.
//!
//! `AdapterConfig` is the serde shape callers load from JSON; `resolve`
//! validates it and fills defaults into an `AdapterSettings`.

use crate::error::{ClientError, Result};
use crate::relay::RelayConfig;
use crate::retry::RetryConfig;
use crate::subscription::CompletionPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Relays used when the configuration names none.
pub const DEFAULT_RELAYS: &[&str] = &[
    "wss://nostr-relay.psfoundation.info",
    "wss://nos.lol",
    "wss://relay.damus.io",
];

/// Topic adapter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterConfig {
    /// Relay URLs; empty means `DEFAULT_RELAYS`
    #[serde(default, alias = "nostrRelays")]
    pub relays: Vec<String>,

    /// Topic every message is tagged with (required)
    #[serde(default, alias = "nostrTopic", skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    /// Publish retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// When a multi-relay read resolves
    #[serde(default)]
    pub completion: CompletionPolicy,

    /// Optional deadline for reads; unset waits indefinitely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_timeout_ms: Option<u64>,

    /// Relay connection timeout
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// How long to wait for a relay's `OK` after publishing
    #[serde(default = "default_timeout_ms")]
    pub confirmation_timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            relays: Vec::new(),
            topic: None,
            retry: RetryConfig::default(),
            completion: CompletionPolicy::default(),
            read_timeout_ms: None,
            connect_timeout_ms: default_timeout_ms(),
            confirmation_timeout_ms: default_timeout_ms(),
        }
    }
}

impl AdapterConfig {
    /// Configuration for `topic` with every other field defaulted.
    pub fn new(topic: impl Into<String>) -> Self {
        Self::default().with_topic(topic)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_relays<I, S>(mut self, relays: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relays = relays.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_completion(mut self, completion: CompletionPolicy) -> Self {
        self.completion = completion;
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout_ms = read_timeout.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Validate and fill defaults.
    ///
    /// Relay strings are kept as given; they are checked when a connection
    /// is attempted.
    pub fn resolve(&self) -> Result<AdapterSettings> {
        let topic = match self.topic.as_deref() {
            Some(topic) if !topic.is_empty() => topic.to_string(),
            _ => {
                return Err(ClientError::InvalidArgument(
                    "topic must be a non-empty string".to_string(),
                ));
            }
        };

        let relays = if self.relays.is_empty() {
            DEFAULT_RELAYS.iter().map(|r| r.to_string()).collect()
        } else {
            self.relays.clone()
        };

        Ok(AdapterSettings {
            relays,
            topic,
            retry: self.retry.clone(),
            completion: self.completion,
            read_timeout: self.read_timeout_ms.map(Duration::from_millis),
            relay: RelayConfig {
                connect_timeout: Duration::from_millis(self.connect_timeout_ms),
                confirmation_timeout: Duration::from_millis(self.confirmation_timeout_ms),
            },
        })
    }
}

/// Validated configuration, fixed for an adapter's lifetime.
#[derive(Debug, Clone)]
pub struct AdapterSettings {
    pub relays: Vec<String>,
    pub topic: String,
    pub retry: RetryConfig,
    pub completion: CompletionPolicy,
    pub read_timeout: Option<Duration>,
    pub relay: RelayConfig,
}
