use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chord_proto::chord::{chord_client::ChordClient, Empty, UpdateFingerTableRequest};
use log::trace;
use tonic::transport::{Channel, Endpoint};
use tonic::Status;

use super::convert::{error_from_status, identifier_to_proto, node_from_proto, node_to_proto};
use crate::error::{Error, Result};
use crate::id::IdSpace;
use crate::rpc::{Call, Reply, Transport};

fn request<T>(message: T, timeout: Duration) -> tonic::Request<T> {
    let mut request = tonic::Request::new(message);
    request.set_timeout(timeout);
    request
}

/// Reaches peers over gRPC. One lazily connected channel is kept per peer
/// address and dropped again once the peer turns out to be unreachable.
pub struct GrpcTransport {
    space: IdSpace,
    channels: Mutex<HashMap<String, Channel>>,
}

impl GrpcTransport {
    pub fn new(space: IdSpace) -> Self {
        GrpcTransport {
            space,
            channels: Mutex::new(HashMap::new()),
        }
    }

    fn channel(&self, peer: &str, timeout: Duration) -> Result<Channel> {
        let mut channels = self.channels.lock().unwrap();
        if let Some(channel) = channels.get(peer) {
            return Ok(channel.clone());
        }

        let channel = Endpoint::from_shared(format!("http://{peer}"))
            .map_err(|e| Error::unreachable(peer, e))?
            .connect_timeout(timeout)
            .connect_lazy();
        channels.insert(peer.to_string(), channel.clone());
        Ok(channel)
    }

    fn forget(&self, peer: &str) {
        self.channels.lock().unwrap().remove(peer);
    }

    async fn exchange(
        &self,
        client: &mut ChordClient<Channel>,
        peer: &str,
        call: Call,
        timeout: Duration,
    ) -> Result<Reply> {
        let space = &self.space;
        let fail = |status: Status| error_from_status(peer, timeout, status);

        let reply = match call {
            Call::HealthCheck => {
                let response = client
                    .health_check(request(Empty {}, timeout))
                    .await
                    .map_err(fail)?;
                Reply::Health(response.into_inner().status)
            }
            Call::FindSuccessor(id) => {
                let response = client
                    .find_successor(request(identifier_to_proto(space, &id), timeout))
                    .await
                    .map_err(fail)?;
                Reply::Node(node_from_proto(space, response.into_inner())?)
            }
            Call::GetSuccessor => {
                let response = client
                    .get_successor(request(Empty {}, timeout))
                    .await
                    .map_err(fail)?;
                Reply::Node(node_from_proto(space, response.into_inner())?)
            }
            Call::GetPredecessor => {
                let response = client
                    .get_predecessor(request(Empty {}, timeout))
                    .await
                    .map_err(fail)?;
                let predecessor = response
                    .into_inner()
                    .node
                    .map(|node| node_from_proto(space, node))
                    .transpose()?;
                Reply::Predecessor(predecessor)
            }
            Call::SetPredecessor(node) => {
                client
                    .set_predecessor(request(node_to_proto(space, &node), timeout))
                    .await
                    .map_err(fail)?;
                Reply::Done
            }
            Call::UpdateFingerTable { node, index } => {
                let index = u32::try_from(index)
                    .map_err(|_| Error::Protocol(format!("finger index {index} too large")))?;
                let message = UpdateFingerTableRequest {
                    node: Some(node_to_proto(space, &node)),
                    index,
                };
                client
                    .update_finger_table(request(message, timeout))
                    .await
                    .map_err(fail)?;
                Reply::Done
            }
            Call::ClosestPrecedingFinger(id) => {
                let response = client
                    .closest_preceding_finger(request(identifier_to_proto(space, &id), timeout))
                    .await
                    .map_err(fail)?;
                Reply::Node(node_from_proto(space, response.into_inner())?)
            }
            Call::Notify(node) => {
                client
                    .notify(request(node_to_proto(space, &node), timeout))
                    .await
                    .map_err(fail)?;
                Reply::Done
            }
        };
        Ok(reply)
    }
}

#[async_trait]
impl Transport for GrpcTransport {
    async fn invoke(&self, peer: &str, call: Call, timeout: Duration) -> Result<Reply> {
        trace!("grpc call {} -> {}", call.name(), peer);
        let mut client = ChordClient::new(self.channel(peer, timeout)?);

        let result = match tokio::time::timeout(
            timeout,
            self.exchange(&mut client, peer, call, timeout),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                peer: peer.to_string(),
                timeout,
            }),
        };

        if let Err(Error::Unreachable { .. }) = &result {
            self.forget(peer);
        }
        result
    }
}
