use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::Instant;

use objmap_core::ChannelKind;
use objmap_upstream::UpstreamError;

use crate::slot::ConnectionHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Disconnected,
    Connecting,
    Subscribed,
}

impl SubscriptionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Subscribed => "subscribed",
        }
    }
}

/// One transition of a channel's subscription state, as published on the status feed.
#[derive(Clone, Debug)]
pub struct StatusChange {
    pub channel: ChannelKind,
    pub from: SubscriptionStatus,
    pub to: SubscriptionStatus,
    pub at: Instant,
    pub error: Option<UpstreamError>,
}

/// Per-channel subscription state. Owned and mutated only by that channel's loop.
pub struct SubscriptionState {
    channel: ChannelKind,
    pub(crate) handle: Option<ConnectionHandle>,
    status: SubscriptionStatus,
    last_error: Option<UpstreamError>,
    feed: broadcast::Sender<StatusChange>,
}

impl SubscriptionState {
    pub fn new(channel: ChannelKind, feed: broadcast::Sender<StatusChange>) -> Self {
        Self {
            channel,
            handle: None,
            status: SubscriptionStatus::Disconnected,
            last_error: None,
            feed,
        }
    }

    pub fn channel(&self) -> ChannelKind {
        self.channel
    }

    pub fn status(&self) -> SubscriptionStatus {
        self.status
    }

    pub fn last_error(&self) -> Option<&UpstreamError> {
        self.last_error.as_ref()
    }

    pub fn handle(&self) -> Option<&ConnectionHandle> {
        self.handle.as_ref()
    }

    pub(crate) fn transition(&mut self, to: SubscriptionStatus) {
        self.transition_with(to, None);
    }

    pub(crate) fn fail(&mut self, error: UpstreamError) {
        self.transition_with(SubscriptionStatus::Disconnected, Some(error));
    }

    fn transition_with(&mut self, to: SubscriptionStatus, error: Option<UpstreamError>) {
        if let Some(e) = &error {
            self.last_error = Some(e.clone());
        }
        if self.status == to {
            return;
        }
        let from = std::mem::replace(&mut self.status, to);
        tracing::debug!(channel = %self.channel, from = from.as_str(), to = to.as_str(), "subscription state");
        // no receivers is fine: the feed is observational
        let _ = self.feed.send(StatusChange {
            channel: self.channel,
            from,
            to,
            at: Instant::now(),
            error,
        });
    }
}
