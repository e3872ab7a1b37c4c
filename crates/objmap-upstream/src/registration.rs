//! Registration with the node server, which assigns the upstream server address.

use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use objmap_core::ChannelKind;
use prost::Message;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use crate::error::RegistrationError;
use crate::proto::{NodeAction, NodeRequest, NodeResponse};
use crate::tcp::codec;

const MAX_RESPONSE_LEN: usize = 64 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeRegistration {
    pub node_id: i32,
    pub server_address: String,
}

pub struct NodeRegistrar {
    nodesrv: String,
    node_name: String,
    timeout: Duration,
}

impl NodeRegistrar {
    pub fn new(nodesrv: impl Into<String>, node_name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            nodesrv: nodesrv.into(),
            node_name: node_name.into(),
            timeout,
        }
    }

    pub async fn register(
        &self,
        channels: &[ChannelKind],
    ) -> Result<NodeRegistration, RegistrationError> {
        let response = self
            .exchange(NodeRequest {
                node_name: self.node_name.clone(),
                channel_types: channels.iter().map(|c| c.type_code()).collect(),
                action: NodeAction::Register as i32,
                node_id: 0,
            })
            .await?;

        if !response.ok {
            return Err(RegistrationError::Rejected(response.message));
        }
        if response.server_address.is_empty() {
            return Err(RegistrationError::Protocol("no server address assigned".into()));
        }
        Ok(NodeRegistration {
            node_id: response.node_id,
            server_address: response.server_address,
        })
    }

    pub async fn unregister(&self, registration: &NodeRegistration) -> Result<(), RegistrationError> {
        let response = self
            .exchange(NodeRequest {
                node_name: self.node_name.clone(),
                channel_types: Vec::new(),
                action: NodeAction::Unregister as i32,
                node_id: registration.node_id,
            })
            .await?;
        if response.ok {
            Ok(())
        } else {
            Err(RegistrationError::Rejected(response.message))
        }
    }

    async fn exchange(&self, request: NodeRequest) -> Result<NodeResponse, RegistrationError> {
        let unreachable = |source| RegistrationError::Unreachable {
            addr: self.nodesrv.clone(),
            source,
        };

        let round_trip = async {
            let stream = TcpStream::connect(&self.nodesrv).await.map_err(unreachable)?;
            let mut framed = Framed::new(stream, codec(MAX_RESPONSE_LEN));
            framed
                .send(Bytes::from(request.encode_to_vec()))
                .await
                .map_err(unreachable)?;
            match framed.next().await {
                Some(Ok(frame)) => Ok(NodeResponse::decode(frame.freeze())?),
                Some(Err(e)) => Err(unreachable(e)),
                None => Err(RegistrationError::Protocol(
                    "connection closed before response".into(),
                )),
            }
        };

        tokio::time::timeout(self.timeout, round_trip)
            .await
            .map_err(|_| RegistrationError::Timeout(self.timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn node_server(response: NodeResponse) -> (String, tokio::task::JoinHandle<NodeRequest>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(socket, codec(1024));
            let frame = framed.next().await.unwrap().unwrap();
            let request = NodeRequest::decode(frame.freeze()).unwrap();
            framed.send(Bytes::from(response.encode_to_vec())).await.unwrap();
            request
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn register_returns_assigned_server() {
        let (addr, server) = node_server(NodeResponse {
            node_id: 7,
            server_address: "10.0.0.2:10000".into(),
            ok: true,
            message: String::new(),
        })
        .await;

        let registrar = NodeRegistrar::new(addr, "HarmoVisObjMap", Duration::from_secs(2));
        let registration = registrar.register(&ChannelKind::ALL).await.unwrap();
        assert_eq!(registration.node_id, 7);
        assert_eq!(registration.server_address, "10.0.0.2:10000");

        let request = server.await.unwrap();
        assert_eq!(request.node_name, "HarmoVisObjMap");
        assert_eq!(request.action, NodeAction::Register as i32);
        assert_eq!(request.channel_types, vec![1, 13, 14, 11]);
    }

    #[tokio::test]
    async fn rejected_registration_is_an_error() {
        let (addr, _server) = node_server(NodeResponse {
            ok: false,
            message: "duplicate node".into(),
            ..Default::default()
        })
        .await;

        let registrar = NodeRegistrar::new(addr, "HarmoVisObjMap", Duration::from_secs(2));
        let err = registrar.register(&ChannelKind::ALL).await.unwrap_err();
        assert!(matches!(err, RegistrationError::Rejected(ref m) if m == "duplicate node"));
    }

    #[tokio::test]
    async fn unreachable_node_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let registrar = NodeRegistrar::new(addr, "HarmoVisObjMap", Duration::from_secs(2));
        let err = registrar.register(&ChannelKind::ALL).await.unwrap_err();
        assert!(matches!(err, RegistrationError::Unreachable { .. }));
    }

    #[tokio::test]
    async fn unregister_sends_node_id() {
        let (addr, server) = node_server(NodeResponse {
            ok: true,
            ..Default::default()
        })
        .await;

        let registrar = NodeRegistrar::new(addr, "HarmoVisObjMap", Duration::from_secs(2));
        let registration = NodeRegistration {
            node_id: 42,
            server_address: "x".into(),
        };
        registrar.unregister(&registration).await.unwrap();

        let request = server.await.unwrap();
        assert_eq!(request.node_id, 42);
        assert_eq!(request.action, NodeAction::Unregister as i32);
    }
}
