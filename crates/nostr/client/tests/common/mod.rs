//! Local relay harness for integration tests.
//!
//! `MockRelay` speaks just enough NIP-01 over a real WebSocket to exercise
//! the client: it stores published events, answers `OK`, and replays stored
//! events followed by `EOSE` for each `REQ`.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use nostr::Event;
use nostr_client::{ClientMessage, RelayMessage};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::debug;

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// How the mock relay treats incoming messages.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Store events, answer OK true, replay on REQ
    Normal,
    /// Answer every EVENT with OK false and this reason
    RejectEvents(String),
    /// Accept REQ but never send anything back
    Silent,
    /// Answer REQ with CLOSED and this reason
    CloseSubscriptions(String),
}

struct RelayState {
    behavior: Behavior,
    stored: Mutex<Vec<Event>>,
    events_received: AtomicUsize,
    reqs_received: AtomicUsize,
    closes_received: AtomicUsize,
}

pub struct MockRelay {
    addr: SocketAddr,
    state: Arc<RelayState>,
    handle: JoinHandle<()>,
}

impl MockRelay {
    pub async fn start(behavior: Behavior) -> Self {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(RelayState {
            behavior,
            stored: Mutex::new(Vec::new()),
            events_received: AtomicUsize::new(0),
            reqs_received: AtomicUsize::new(0),
            closes_received: AtomicUsize::new(0),
        });

        let accept_state = Arc::clone(&state);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(handle_connection(stream, Arc::clone(&accept_state)));
            }
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn stored(&self) -> Vec<Event> {
        self.state.stored.lock().unwrap().clone()
    }

    pub fn events_received(&self) -> usize {
        self.state.events_received.load(Ordering::SeqCst)
    }

    pub fn reqs_received(&self) -> usize {
        self.state.reqs_received.load(Ordering::SeqCst)
    }

    pub fn closes_received(&self) -> usize {
        self.state.closes_received.load(Ordering::SeqCst)
    }
}

impl Drop for MockRelay {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_connection(stream: TcpStream, state: Arc<RelayState>) {
    let Ok(ws_stream) = accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = ws_stream.split();

    while let Some(Ok(frame)) = read.next().await {
        let Message::Text(text) = frame else {
            continue;
        };
        let Ok(msg) = ClientMessage::from_json(&text) else {
            debug!("mock relay ignoring frame: {}", text.as_str());
            continue;
        };

        let replies = respond(&state, msg);
        for reply in replies {
            let Ok(json) = reply.to_json() else {
                continue;
            };
            if write.send(Message::Text(json.into())).await.is_err() {
                return;
            }
        }
    }
}

fn respond(state: &RelayState, msg: ClientMessage) -> Vec<RelayMessage> {
    match msg {
        ClientMessage::Event(event) => {
            state.events_received.fetch_add(1, Ordering::SeqCst);
            match &state.behavior {
                Behavior::RejectEvents(reason) => vec![RelayMessage::Ok {
                    event_id: event.id,
                    success: false,
                    message: reason.clone(),
                }],
                _ => {
                    let event_id = event.id.clone();
                    state.stored.lock().unwrap().push(event);
                    vec![RelayMessage::Ok {
                        event_id,
                        success: true,
                        message: String::new(),
                    }]
                }
            }
        }
        ClientMessage::Req {
            subscription_id,
            filters,
        } => {
            state.reqs_received.fetch_add(1, Ordering::SeqCst);
            match &state.behavior {
                Behavior::Silent => Vec::new(),
                Behavior::CloseSubscriptions(reason) => vec![RelayMessage::Closed {
                    subscription_id,
                    message: reason.clone(),
                }],
                _ => {
                    let stored = state.stored.lock().unwrap();
                    let mut replies: Vec<RelayMessage> = filters
                        .iter()
                        .flat_map(|filter| {
                            let limit = filter.limit.unwrap_or(u64::MAX) as usize;
                            stored
                                .iter()
                                .filter(|e| filter.matches(e))
                                .take(limit)
                                .cloned()
                                .collect::<Vec<_>>()
                        })
                        .map(|event| RelayMessage::Event {
                            subscription_id: subscription_id.clone(),
                            event,
                        })
                        .collect();
                    replies.push(RelayMessage::Eose { subscription_id });
                    replies
                }
            }
        }
        ClientMessage::Close { .. } => {
            state.closes_received.fetch_add(1, Ordering::SeqCst);
            Vec::new()
        }
    }
}
