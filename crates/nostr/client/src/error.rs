//! Client error types

use thiserror::Error;

/// Client error type
#[derive(Error, Debug)]
pub enum ClientError {
    /// Bad input to a public operation (empty message, zero limit, missing topic, bad secret)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Publish or read attempted before keys were derived
    #[error("Adapter not started: call start() with a wallet secret first")]
    NotStarted,

    /// A single relay exhausted its publish attempts
    #[error("Relay {relay_url} failed: {reason}")]
    RelayFailure { relay_url: String, reason: String },

    /// No relay completed a read before the configured deadline
    #[error("Subscription stalled: {0}")]
    SubscriptionStall(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// URL parse error
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Relay message could not be parsed or encoded
    #[error("Message error: {0}")]
    Message(#[from] crate::message::MessageError),

    /// Timeout error
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Not connected
    #[error("Not connected to relay")]
    NotConnected,

    /// Already connected
    #[error("Already connected to relay")]
    AlreadyConnected,

    /// Relay rejected the event or the confirmation was lost
    #[error("Event publish failed: {0}")]
    PublishFailed(String),

    /// Relay closed the subscription
    #[error("Subscription closed by relay: {0}")]
    SubscriptionClosed(String),

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Event construction or signing error
    #[error("Event error: {0}")]
    Event(#[from] nostr::Nip01Error),

    /// Key derivation error
    #[error("Key error: {0}")]
    Key(#[from] nostr::KeyError),

    /// NIP-19 encoding error
    #[error("NIP-19 error: {0}")]
    Nip19(#[from] nostr::Nip19Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Whether this error came from validating caller input.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, ClientError::InvalidArgument(_))
    }
}

/// Client result type
pub type Result<T> = std::result::Result<T, ClientError>;
