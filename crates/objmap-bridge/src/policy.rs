use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::slot::{ConnectionHandle, ConnectionSlot};
use crate::state::{SubscriptionState, SubscriptionStatus};

/// Fixed-delay reconnect with no retry ceiling.
///
/// The upstream is a co-located service, so a flat delay is enough; the loop
/// keeps trying for as long as the process runs.
#[derive(Clone, Debug)]
pub struct ReconnectPolicy {
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
        }
    }
}

impl ReconnectPolicy {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Replace the connection held by `state`.
    ///
    /// Returns `None` only when `cancel` fires; otherwise retries until a
    /// connection is available.
    pub async fn reconnect(
        &self,
        state: &mut SubscriptionState,
        slot: &ConnectionSlot,
        cancel: &CancellationToken,
    ) -> Option<ConnectionHandle> {
        if let Some(dead) = state.handle.take() {
            slot.invalidate(&dead).await;
        }
        state.transition(SubscriptionStatus::Disconnected);

        let mut attempt: u32 = 0;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(self.delay) => {}
            }
            attempt += 1;
            state.transition(SubscriptionStatus::Connecting);

            let acquired = tokio::select! {
                _ = cancel.cancelled() => return None,
                acquired = slot.acquire() => acquired,
            };
            match acquired {
                Ok(handle) => {
                    tracing::info!(
                        channel = %state.channel(),
                        attempt,
                        generation = handle.generation(),
                        "reconnected"
                    );
                    state.handle = Some(handle.clone());
                    return Some(handle);
                }
                Err(e) => {
                    tracing::warn!(
                        channel = %state.channel(),
                        attempt,
                        delay_ms = self.delay.as_millis() as u64,
                        error = %e,
                        "reconnect failed, retrying"
                    );
                    state.fail(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use objmap_core::ChannelKind;
    use objmap_upstream::mock::MockConnector;
    use tokio::sync::broadcast;

    #[test]
    fn default_delay_is_five_seconds() {
        assert_eq!(ReconnectPolicy::default().delay, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_waits_the_delay_and_replaces_handle() {
        let connector = MockConnector::new();
        let slot = ConnectionSlot::new(Arc::new(connector.clone()));
        let (feed, _) = broadcast::channel(16);
        let mut state = SubscriptionState::new(ChannelKind::Fleet, feed);
        state.handle = Some(slot.acquire().await.unwrap());

        let started = tokio::time::Instant::now();
        let handle = ReconnectPolicy::default()
            .reconnect(&mut state, &slot, &CancellationToken::new())
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(handle.generation(), 2);
        assert_eq!(state.handle().map(|h| h.generation()), Some(2));
        assert_eq!(state.status(), SubscriptionStatus::Connecting);
        assert_eq!(connector.connect_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_retries_failed_connects_forever() {
        let connector = MockConnector::new();
        let slot = ConnectionSlot::new(Arc::new(connector.clone()));
        let (feed, _) = broadcast::channel(16);
        let mut state = SubscriptionState::new(ChannelKind::Fleet, feed);
        connector.fail_next_connects(3);

        let started = tokio::time::Instant::now();
        let handle = ReconnectPolicy::new(Duration::from_secs(1))
            .reconnect(&mut state, &slot, &CancellationToken::new())
            .await;

        assert!(handle.is_some());
        assert_eq!(connector.connect_count(), 4);
        assert!(started.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_the_delay() {
        let connector = MockConnector::new();
        let slot = ConnectionSlot::new(Arc::new(connector.clone()));
        let (feed, _) = broadcast::channel(16);
        let mut state = SubscriptionState::new(ChannelKind::Fleet, feed);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let started = tokio::time::Instant::now();
        let handle = ReconnectPolicy::new(Duration::from_secs(3600))
            .reconnect(&mut state, &slot, &cancel)
            .await;

        assert!(handle.is_none());
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(connector.connect_count(), 0);
    }
}
