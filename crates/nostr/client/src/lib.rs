//! Topic-scoped Nostr relay client.
//!
//! This crate provides:
//! - WebSocket connections to Nostr relays (NIP-01 relay protocol)
//! - A retry queue for fan-out publishing to unreliable relays
//! - Multi-relay topic reads with a per-relay state machine
//! - `TopicAdapter`, which ties these together for one topic
//!
//! # Example
//!
//! ```rust,no_run
//! use nostr_client::{AdapterConfig, TopicAdapter};
//!
//! #[tokio::main]
//! async fn main() -> nostr_client::Result<()> {
//!     let config = AdapterConfig::new("my-topic");
//!     let mut adapter = TopicAdapter::new(config)?;
//!
//!     adapter.start("L1VZ55UPgF83k4ndU8BBf62eM9prgo4coie5ttZrvS8GBzddzrhD")?;
//!
//!     let outcome = adapter.publish("hello relays").await?;
//!     for id in &outcome.event_ids {
//!         println!("accepted as {}", adapter.encode_note(id)?);
//!     }
//!
//!     for item in adapter.read_default().await? {
//!         println!("{}: {}", item.event_id, item.content);
//!     }
//!     Ok(())
//! }
//! ```

mod adapter;
mod config;
mod error;
mod message;
mod publisher;
mod relay;
mod retry;
mod subscriber;
mod subscription;
mod transport;

pub use adapter::TopicAdapter;
pub use config::{AdapterConfig, AdapterSettings, DEFAULT_RELAYS};
pub use error::{ClientError, Result};
pub use message::{ClientMessage, Filter, MessageError, RelayMessage};
pub use publisher::{PublishOutcome, RelayFailure, RelayPublisher};
pub use relay::{ConnectionState, PublishConfirmation, RelayConfig, RelayConnection};
pub use retry::{Executor, ImmediateExecutor, RetryConfig, RetryQueue};
pub use subscriber::{ReadItem, RelaySubscriber};
pub use subscription::{
    CompletionPolicy, ReadTracker, ReaderExit, RelayReadState, generate_subscription_id,
    topic_filter,
};
pub use transport::{RelaySession, RelayTransport, WebSocketTransport};

/// Event kind for topic messages.
pub const TOPIC_MESSAGE_KIND: u16 = 867;

/// Tag name carrying the topic.
pub const TOPIC_TAG: &str = "t";

/// Limit used by `TopicAdapter::read_default`.
pub const DEFAULT_READ_LIMIT: usize = 10;
