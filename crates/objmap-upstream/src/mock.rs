//! Scripted in-process upstream for deterministic testing without a server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use objmap_core::ChannelKind;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::UpstreamError;
use crate::transport::{Connector, FrameStream, UpstreamConnection};

type FeedSender = mpsc::UnboundedSender<Result<Bytes, UpstreamError>>;

#[derive(Default)]
struct MockState {
    connects: AtomicUsize,
    /// Number of upcoming `connect` calls that should fail.
    failing_connects: AtomicUsize,
    subscribe_counts: Mutex<HashMap<ChannelKind, usize>>,
    feeds: Mutex<HashMap<ChannelKind, FeedSender>>,
    changed: Notify,
}

/// Mock connector. Every subscription gets a fresh feed the test can push
/// frames into or cut off.
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<MockState>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful and failed `connect` calls so far.
    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn fail_next_connects(&self, n: usize) {
        self.state.failing_connects.store(n, Ordering::SeqCst);
    }

    pub fn subscribe_count(&self, channel: ChannelKind) -> usize {
        self.state
            .subscribe_counts
            .lock()
            .get(&channel)
            .copied()
            .unwrap_or(0)
    }

    /// Wait until `channel` has been subscribed at least `n` times.
    pub async fn wait_for_subscriptions(&self, channel: ChannelKind, n: usize) {
        loop {
            let notified = self.state.changed.notified();
            if self.subscribe_count(channel) >= n {
                return;
            }
            notified.await;
        }
    }

    /// Deliver a raw frame on the live subscription for `channel`.
    pub fn push(&self, channel: ChannelKind, frame: impl Into<Bytes>) -> bool {
        match self.state.feeds.lock().get(&channel) {
            Some(tx) => tx.send(Ok(frame.into())).is_ok(),
            None => false,
        }
    }

    /// End the live subscription for `channel` with `error`.
    pub fn disconnect(&self, channel: ChannelKind, error: UpstreamError) -> bool {
        match self.state.feeds.lock().remove(&channel) {
            Some(tx) => tx.send(Err(error)).is_ok(),
            None => false,
        }
    }

    /// End the live subscription for `channel` without an error frame.
    pub fn close(&self, channel: ChannelKind) -> bool {
        self.state.feeds.lock().remove(&channel).is_some()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<Arc<dyn UpstreamConnection>, UpstreamError> {
        let attempt = self.state.connects.fetch_add(1, Ordering::SeqCst) + 1;
        let failing = self
            .state
            .failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        self.state.changed.notify_waiters();
        if failing {
            return Err(UpstreamError::Connect {
                addr: "mock".into(),
                reason: format!("scripted failure on attempt {attempt}"),
            });
        }
        Ok(Arc::new(MockConnection {
            endpoint: format!("mock#{attempt}"),
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockConnection {
    endpoint: String,
    state: Arc<MockState>,
}

#[async_trait]
impl UpstreamConnection for MockConnection {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn subscribe(&self, channel: ChannelKind) -> Result<FrameStream, UpstreamError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.feeds.lock().insert(channel, tx);
        *self.state.subscribe_counts.lock().entry(channel).or_insert(0) += 1;
        self.state.changed.notify_waiters();
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}
