//! Length-delimited protobuf frames over TCP.
//!
//! ```text
//! ┌──────────────────┬──────────────────────────┐
//! │ Length (4 bytes) │ Payload (variable)       │
//! │ Big-endian u32   │ Protobuf binary          │
//! └──────────────────┴──────────────────────────┘
//! ```
//!
//! A subscription is one TCP stream: the client sends a `SubscribeRequest`
//! frame, then the server pushes `Supply` frames until it goes away.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use objmap_core::ChannelKind;
use prost::Message;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::error::UpstreamError;
use crate::proto::SubscribeRequest;
use crate::transport::{Connector, FrameStream, UpstreamConnection};

#[derive(Clone, Debug)]
pub struct TcpConnectorConfig {
    pub server_address: String,
    pub connect_timeout: Duration,
    pub max_frame_length: usize,
}

impl Default for TcpConnectorConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:10000".into(),
            connect_timeout: Duration::from_secs(5),
            max_frame_length: 8 * 1024 * 1024,
        }
    }
}

pub(crate) fn codec(max_frame_length: usize) -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(max_frame_length)
        .new_codec()
}

async fn open<A: ToSocketAddrs>(
    addr: A,
    label: &str,
    timeout: Duration,
) -> Result<TcpStream, UpstreamError> {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(UpstreamError::Connect {
            addr: label.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Err(UpstreamError::Timeout(timeout)),
    }
}

pub struct TcpConnector {
    config: TcpConnectorConfig,
}

impl TcpConnector {
    pub fn new(config: TcpConnectorConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> Result<Arc<dyn UpstreamConnection>, UpstreamError> {
        let label = &self.config.server_address;
        // probe once so an unreachable server fails here rather than at subscribe
        let probe = open(label.as_str(), label, self.config.connect_timeout).await?;
        let peer = probe.peer_addr()?;
        drop(probe);

        tracing::debug!(server = %label, peer = %peer, "upstream reachable");
        Ok(Arc::new(TcpConnection {
            peer,
            endpoint: label.clone(),
            config: self.config.clone(),
        }))
    }
}

pub struct TcpConnection {
    peer: SocketAddr,
    endpoint: String,
    config: TcpConnectorConfig,
}

#[async_trait]
impl UpstreamConnection for TcpConnection {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn subscribe(&self, channel: ChannelKind) -> Result<FrameStream, UpstreamError> {
        let stream = open(self.peer, &self.endpoint, self.config.connect_timeout).await?;
        stream.set_nodelay(true)?;
        let mut framed = Framed::new(stream, codec(self.config.max_frame_length));

        let request = SubscribeRequest {
            channel_type: channel.type_code(),
            client_info: channel.client_info().to_string(),
        };
        framed.send(Bytes::from(request.encode_to_vec())).await?;

        let frames = framed.map(|frame| frame.map(BytesMut::freeze).map_err(UpstreamError::from));
        Ok(Box::pin(frames))
    }
}
