//! Fan-out of decoded events to every viewer.
//!
//! Publishers only enqueue; one dispatch task owns delivery, so frames from
//! different channels never interleave and each batch reaches every viewer
//! contiguously.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use objmap_core::{BroadcastTopic, DomainEvent, EventSink, Topic};

use crate::client::ViewerRegistry;

/// Map access token handed to viewers. Redacted in Debug.
#[derive(Clone)]
pub struct MapboxToken(pub SecretString);

impl MapboxToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    pub fn topic(&self) -> BroadcastTopic {
        BroadcastTopic::new(Topic::MapboxToken, self.0.expose_secret())
    }
}

impl std::fmt::Debug for MapboxToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MapboxToken([REDACTED])")
    }
}

/// Entry point for decoded events. Cheap to share between subscription loops.
pub struct Broadcaster {
    tx: mpsc::UnboundedSender<Vec<BroadcastTopic>>,
    token: MapboxToken,
}

impl Broadcaster {
    /// Start the dispatch task. It exits after every `Broadcaster` is dropped
    /// and the queued batches are delivered.
    pub fn start(registry: Arc<ViewerRegistry>, token: MapboxToken) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = tokio::spawn(dispatch(rx, registry));
        (Self { tx, token }, dispatcher)
    }

    /// Queue topics for delivery as one uninterrupted batch.
    pub fn broadcast(&self, batch: Vec<BroadcastTopic>) {
        if batch.is_empty() {
            return;
        }
        if self.tx.send(batch).is_err() {
            tracing::debug!("dispatcher gone, dropping batch");
        }
    }
}

impl EventSink for Broadcaster {
    fn publish(&self, event: DomainEvent) {
        let topic = match BroadcastTopic::from_event(&event) {
            Ok(topic) => topic,
            Err(e) => {
                tracing::warn!(event_type = event.event_type(), error = %e, "failed to serialize event");
                return;
            }
        };
        let batch = if topic.topic() == Topic::ViewState {
            vec![self.token.topic(), topic]
        } else {
            vec![topic]
        };
        self.broadcast(batch);
    }
}

async fn dispatch(mut rx: mpsc::UnboundedReceiver<Vec<BroadcastTopic>>, registry: Arc<ViewerRegistry>) {
    while let Some(batch) = rx.recv().await {
        for topic in batch {
            match topic.to_frame() {
                Ok(frame) => {
                    let delivered = registry.broadcast_all(&frame);
                    tracing::trace!(topic = %topic.topic(), delivered, "broadcast");
                }
                Err(e) => {
                    tracing::warn!(topic = %topic.topic(), error = %e, "failed to frame topic");
                }
            }
        }
    }
    tracing::info!("broadcast dispatcher stopped");
}
