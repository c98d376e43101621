//! The remote operations every node serves and calls.
//!
//! The same contract faces both ways: [`crate::Node::handle`] answers a
//! [`Call`] for inbound traffic, and the engine reaches peers through a
//! [`Transport`] using the typed [`Remote`] wrapper.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::id::Identifier;
use crate::node_info::NodeInfo;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    HealthCheck,
    FindSuccessor(Identifier),
    GetSuccessor,
    GetPredecessor,
    SetPredecessor(NodeInfo),
    UpdateFingerTable { node: NodeInfo, index: usize },
    ClosestPrecedingFinger(Identifier),
    Notify(NodeInfo),
}

impl Call {
    pub fn name(&self) -> &'static str {
        match self {
            Call::HealthCheck => "health_check",
            Call::FindSuccessor(_) => "find_successor",
            Call::GetSuccessor => "get_successor",
            Call::GetPredecessor => "get_predecessor",
            Call::SetPredecessor(_) => "set_predecessor",
            Call::UpdateFingerTable { .. } => "update_finger_table",
            Call::ClosestPrecedingFinger(_) => "closest_preceding_finger",
            Call::Notify(_) => "notify",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Health(bool),
    Node(NodeInfo),
    Predecessor(Option<NodeInfo>),
    Done,
}

/// Delivers a call to the node listening at `peer`.
///
/// Implementations must give up after `timeout` with [`Error::Timeout`] and
/// report connection-level failures as [`Error::Unreachable`].
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn invoke(&self, peer: &str, call: Call, timeout: Duration) -> Result<Reply>;
}

/// Typed view of one peer over a [`Transport`].
pub struct Remote<'a> {
    transport: &'a dyn Transport,
    peer: &'a str,
    timeout: Duration,
}

impl<'a> Remote<'a> {
    pub fn new(transport: &'a dyn Transport, peer: &'a str, timeout: Duration) -> Self {
        Remote {
            transport,
            peer,
            timeout,
        }
    }

    async fn call(&self, call: Call) -> Result<Reply> {
        self.transport.invoke(self.peer, call, self.timeout).await
    }

    fn unexpected(&self, call: &'static str, reply: Reply) -> Error {
        Error::Protocol(format!(
            "{} answered {call} with {reply:?}",
            self.peer
        ))
    }

    pub async fn health_check(&self) -> Result<bool> {
        match self.call(Call::HealthCheck).await? {
            Reply::Health(healthy) => Ok(healthy),
            other => Err(self.unexpected("health_check", other)),
        }
    }

    pub async fn find_successor(&self, id: &Identifier) -> Result<NodeInfo> {
        match self.call(Call::FindSuccessor(id.clone())).await? {
            Reply::Node(node) => Ok(node),
            other => Err(self.unexpected("find_successor", other)),
        }
    }

    pub async fn get_successor(&self) -> Result<NodeInfo> {
        match self.call(Call::GetSuccessor).await? {
            Reply::Node(node) => Ok(node),
            other => Err(self.unexpected("get_successor", other)),
        }
    }

    pub async fn get_predecessor(&self) -> Result<Option<NodeInfo>> {
        match self.call(Call::GetPredecessor).await? {
            Reply::Predecessor(node) => Ok(node),
            other => Err(self.unexpected("get_predecessor", other)),
        }
    }

    pub async fn set_predecessor(&self, node: &NodeInfo) -> Result<()> {
        match self.call(Call::SetPredecessor(node.clone())).await? {
            Reply::Done => Ok(()),
            other => Err(self.unexpected("set_predecessor", other)),
        }
    }

    pub async fn update_finger_table(&self, node: &NodeInfo, index: usize) -> Result<()> {
        let call = Call::UpdateFingerTable {
            node: node.clone(),
            index,
        };
        match self.call(call).await? {
            Reply::Done => Ok(()),
            other => Err(self.unexpected("update_finger_table", other)),
        }
    }

    pub async fn closest_preceding_finger(&self, id: &Identifier) -> Result<NodeInfo> {
        match self.call(Call::ClosestPrecedingFinger(id.clone())).await? {
            Reply::Node(node) => Ok(node),
            other => Err(self.unexpected("closest_preceding_finger", other)),
        }
    }

    pub async fn notify(&self, node: &NodeInfo) -> Result<()> {
        match self.call(Call::Notify(node.clone())).await? {
            Reply::Done => Ok(()),
            other => Err(self.unexpected("notify", other)),
        }
    }
}
