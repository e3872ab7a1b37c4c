use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use objmap_core::ChannelKind;

use crate::state::{StatusChange, SubscriptionStatus};

/// Latest known state of one channel.
#[derive(Clone, Debug, Serialize)]
pub struct ChannelReport {
    pub channel: ChannelKind,
    pub status: SubscriptionStatus,
    pub since: DateTime<Utc>,
    pub last_error: Option<String>,
    pub disconnects: u64,
}

impl ChannelReport {
    fn new(channel: ChannelKind) -> Self {
        Self {
            channel,
            status: SubscriptionStatus::Disconnected,
            since: Utc::now(),
            last_error: None,
            disconnects: 0,
        }
    }
}

/// Aggregated view of every subscription loop, fed by the status feed.
#[derive(Clone)]
pub struct StatusMonitor {
    channels: Vec<ChannelKind>,
    reports: Arc<RwLock<HashMap<ChannelKind, ChannelReport>>>,
}

impl StatusMonitor {
    pub fn new(channels: &[ChannelKind]) -> Self {
        let reports = channels
            .iter()
            .map(|&c| (c, ChannelReport::new(c)))
            .collect();
        Self {
            channels: channels.to_vec(),
            reports: Arc::new(RwLock::new(reports)),
        }
    }

    /// Consume the status feed until every sender is gone.
    pub fn start(&self, mut feed: broadcast::Receiver<StatusChange>) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            loop {
                match feed.recv().await {
                    Ok(change) => monitor.apply(&change),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "status monitor lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    pub fn apply(&self, change: &StatusChange) {
        let mut reports = self.reports.write();
        let report = reports
            .entry(change.channel)
            .or_insert_with(|| ChannelReport::new(change.channel));
        if report.status == SubscriptionStatus::Subscribed
            && change.to == SubscriptionStatus::Disconnected
        {
            report.disconnects += 1;
        }
        report.status = change.to;
        report.since = Utc::now();
        if let Some(e) = &change.error {
            report.last_error = Some(e.to_string());
        }
    }

    /// Reports in channel order.
    pub fn snapshot(&self) -> Vec<ChannelReport> {
        let reports = self.reports.read();
        self.channels
            .iter()
            .filter_map(|c| reports.get(c).cloned())
            .collect()
    }

    pub fn subscribed_count(&self) -> usize {
        self.reports
            .read()
            .values()
            .filter(|r| r.status == SubscriptionStatus::Subscribed)
            .count()
    }

    pub fn all_subscribed(&self) -> bool {
        let reports = self.reports.read();
        !reports.is_empty()
            && reports
                .values()
                .all(|r| r.status == SubscriptionStatus::Subscribed)
    }
}
