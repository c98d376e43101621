//! In-process transport: calls are delivered straight to the target node's
//! [`Node::handle`]. Used to run whole rings inside one test, with faults
//! injected per address.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use log::trace;

use crate::config::ProtocolConfig;
use crate::error::{Error, Result};
use crate::id::IdSpace;
use crate::node::Node;
use crate::node_info::NodeInfo;
use crate::rpc::{Call, Reply, Transport};

#[derive(Default)]
pub struct MemoryNetwork {
    nodes: Mutex<HashMap<String, Weak<Node>>>,
    down: Mutex<HashSet<String>>,
    latency: Mutex<HashMap<String, Duration>>,
}

impl MemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Builds a node wired to this network and registers it.
    pub fn spawn_node(
        self: &Arc<Self>,
        info: NodeInfo,
        space: IdSpace,
        config: ProtocolConfig,
    ) -> Result<Arc<Node>> {
        let transport: Arc<dyn Transport> = self.clone();
        let node = Arc::new(Node::new(info, space, config, transport)?);
        self.register(&node);
        Ok(node)
    }

    pub fn register(&self, node: &Arc<Node>) {
        self.nodes
            .lock()
            .unwrap()
            .insert(node.address().to_string(), Arc::downgrade(node));
    }

    /// Every call to `address` fails as unreachable until [`Self::reconnect`].
    pub fn disconnect(&self, address: &str) {
        self.down.lock().unwrap().insert(address.to_string());
    }

    pub fn reconnect(&self, address: &str) {
        self.down.lock().unwrap().remove(address);
    }

    /// Delays every call delivered to `address`.
    pub fn set_latency(&self, address: &str, latency: Duration) {
        self.latency
            .lock()
            .unwrap()
            .insert(address.to_string(), latency);
    }

    fn route(&self, peer: &str) -> Result<(Arc<Node>, Duration)> {
        if self.down.lock().unwrap().contains(peer) {
            return Err(Error::unreachable(peer, "disconnected"));
        }
        let node = self
            .nodes
            .lock()
            .unwrap()
            .get(peer)
            .and_then(Weak::upgrade)
            .ok_or_else(|| Error::unreachable(peer, "no such node"))?;
        let latency = self
            .latency
            .lock()
            .unwrap()
            .get(peer)
            .copied()
            .unwrap_or_default();
        Ok((node, latency))
    }
}

#[async_trait]
impl Transport for MemoryNetwork {
    async fn invoke(&self, peer: &str, call: Call, timeout: Duration) -> Result<Reply> {
        trace!("memory call {} -> {}", call.name(), peer);
        let (node, latency) = self.route(peer)?;

        let delivery = async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            node.handle(call).await
        };

        tokio::time::timeout(timeout, delivery)
            .await
            .map_err(|_| Error::Timeout {
                peer: peer.to_string(),
                timeout,
            })?
    }
}
