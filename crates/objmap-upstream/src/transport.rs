use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use objmap_core::ChannelKind;

use crate::error::UpstreamError;

/// Raw upstream frames for one subscription. The stream ending, with or
/// without a trailing error, means the subscription is gone.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Bytes, UpstreamError>> + Send>>;

/// An established logical connection to the upstream server.
#[async_trait]
pub trait UpstreamConnection: Send + Sync {
    /// Address this connection talks to, for logging.
    fn endpoint(&self) -> &str;

    /// Start receiving records for `channel`.
    async fn subscribe(&self, channel: ChannelKind) -> Result<FrameStream, UpstreamError>;
}

/// Factory for upstream connections. Called once at startup and again each
/// time the reconnect policy finds no live connection.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn UpstreamConnection>, UpstreamError>;
}
