//! One receive loop per upstream channel.
//!
//! A loop owns its [`SubscriptionState`], pulls frames from the shared
//! connection, decodes them and hands events to the sink. Any stream error or
//! end of stream is treated as a lost connection and goes through the
//! [`ReconnectPolicy`]. Decode failures are logged and skipped.

use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use objmap_core::{ChannelKind, DecodeFailure, EventSink};
use objmap_upstream::{Decoded, Decoder, FrameStream, UpstreamError};

use crate::policy::ReconnectPolicy;
use crate::slot::{ConnectionHandle, ConnectionSlot};
use crate::state::{StatusChange, SubscriptionState, SubscriptionStatus};

enum StreamEnd {
    Cancelled,
    Lost(UpstreamError),
}

pub struct SubscriptionLoop {
    decoder: Arc<dyn Decoder>,
    sink: Arc<dyn EventSink>,
    slot: Arc<ConnectionSlot>,
    policy: ReconnectPolicy,
    feed: broadcast::Sender<StatusChange>,
}

impl SubscriptionLoop {
    pub fn new(
        decoder: Arc<dyn Decoder>,
        sink: Arc<dyn EventSink>,
        slot: Arc<ConnectionSlot>,
        policy: ReconnectPolicy,
        feed: broadcast::Sender<StatusChange>,
    ) -> Self {
        Self {
            decoder,
            sink,
            slot,
            policy,
            feed,
        }
    }

    pub fn channel(&self) -> ChannelKind {
        self.decoder.channel()
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    /// Run until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let channel = self.channel();
        let mut state = SubscriptionState::new(channel, self.feed.clone());
        tracing::info!(%channel, "subscription loop started");

        if let Some(mut handle) = self.connect_first(&mut state, &cancel).await {
            loop {
                state.transition(SubscriptionStatus::Connecting);
                let subscribed = tokio::select! {
                    _ = cancel.cancelled() => break,
                    subscribed = handle.connection().subscribe(channel) => subscribed,
                };

                let error = match subscribed {
                    Ok(frames) => {
                        state.transition(SubscriptionStatus::Subscribed);
                        tracing::info!(
                            %channel,
                            endpoint = handle.connection().endpoint(),
                            generation = handle.generation(),
                            "subscribed"
                        );
                        match self.pump(frames, &cancel).await {
                            StreamEnd::Cancelled => break,
                            StreamEnd::Lost(e) => e,
                        }
                    }
                    Err(e) => e,
                };

                tracing::warn!(
                    %channel,
                    error = %error,
                    error_kind = error.error_kind(),
                    "upstream subscription lost"
                );
                state.fail(error);
                handle = match self.policy.reconnect(&mut state, &self.slot, &cancel).await {
                    Some(h) => h,
                    None => break,
                };
            }
        }

        state.transition(SubscriptionStatus::Disconnected);
        tracing::info!(%channel, "subscription loop stopped");
    }

    async fn connect_first(
        &self,
        state: &mut SubscriptionState,
        cancel: &CancellationToken,
    ) -> Option<ConnectionHandle> {
        state.transition(SubscriptionStatus::Connecting);
        let acquired = tokio::select! {
            _ = cancel.cancelled() => return None,
            acquired = self.slot.acquire() => acquired,
        };
        match acquired {
            Ok(handle) => {
                state.handle = Some(handle.clone());
                Some(handle)
            }
            Err(e) => {
                tracing::warn!(channel = %state.channel(), error = %e, "initial connect failed");
                state.fail(e);
                self.policy.reconnect(state, &self.slot, cancel).await
            }
        }
    }

    async fn pump(&self, mut frames: FrameStream, cancel: &CancellationToken) -> StreamEnd {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return StreamEnd::Cancelled,
                next = frames.next() => next,
            };
            match next {
                Some(Ok(raw)) => self.handle_frame(&raw),
                Some(Err(e)) => return StreamEnd::Lost(e),
                None => return StreamEnd::Lost(UpstreamError::Closed),
            }
        }
    }

    fn handle_frame(&self, raw: &[u8]) {
        let channel = self.channel();
        match self.decoder.decode(raw, Utc::now()) {
            Ok(Decoded::Event(event)) => {
                tracing::trace!(%channel, event_type = event.event_type(), "event");
                self.sink.publish(event);
            }
            Ok(Decoded::Ignored(reason)) => {
                tracing::trace!(%channel, %reason, "record ignored");
            }
            Err(cause) => {
                let failure = DecodeFailure::new(channel, raw.len(), cause);
                tracing::warn!(
                    %channel,
                    raw_size = failure.raw_size,
                    error_kind = failure.cause.error_kind(),
                    "{failure}"
                );
            }
        }
    }
}
