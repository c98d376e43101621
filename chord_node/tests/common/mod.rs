#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chord_node::grpc::{serve, GrpcTransport, ServerHandle};
use chord_node::memory::MemoryNetwork;
use chord_node::{IdSpace, Identifier, Node, NodeInfo, ProtocolConfig};
use tokio::net::TcpListener;

/// A node served over gRPC on an ephemeral loopback port.
pub struct TestNode {
    pub node: Arc<Node>,
    pub server: ServerHandle,
}

impl TestNode {
    pub fn address(&self) -> &str {
        self.node.address()
    }
}

pub async fn start_node(space: &IdSpace, id: u64, config: ProtocolConfig) -> TestNode {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let transport = Arc::new(GrpcTransport::new(space.clone()));
    let node = Arc::new(
        Node::new(
            NodeInfo::new(space.id(id), address),
            space.clone(),
            config,
            transport,
        )
        .unwrap(),
    );
    let server = serve(node.clone(), listener).unwrap();
    TestNode { node, server }
}

pub fn spawn_memory_node(net: &Arc<MemoryNetwork>, space: &IdSpace, id: u64) -> Arc<Node> {
    spawn_memory_node_with(net, space, id, space.max_fingers())
}

pub fn spawn_memory_node_with(
    net: &Arc<MemoryNetwork>,
    space: &IdSpace,
    id: u64,
    fingers: usize,
) -> Arc<Node> {
    let config = ProtocolConfig::with_fingers(fingers);
    net.spawn_node(NodeInfo::new(space.id(id), format!("mem-{id}")), space.clone(), config)
        .unwrap()
}

pub async fn stabilize_ring(nodes: &[Arc<Node>], rounds: usize) {
    for _ in 0..rounds {
        for node in nodes {
            node.stabilize().await;
            node.fix_fingers().await;
            node.check_predecessor().await;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

/// The node a correct ring assigns `key` to: the first id at or after it.
pub fn owner<'a>(nodes: &'a [Arc<Node>], key: &Identifier) -> &'a NodeInfo {
    let mut sorted: Vec<&NodeInfo> = nodes.iter().map(|n| n.info()).collect();
    sorted.sort_by(|a, b| a.id().as_biguint().cmp(b.id().as_biguint()));
    sorted
        .iter()
        .find(|n| n.id().as_biguint() >= key.as_biguint())
        .copied()
        .unwrap_or(sorted[0])
}

/// Every node's successor and predecessor are its ring neighbours.
pub async fn assert_ring_ordered(nodes: &[Arc<Node>]) {
    let mut sorted: Vec<&Arc<Node>> = nodes.iter().collect();
    sorted.sort_by(|a, b| a.id().as_biguint().cmp(b.id().as_biguint()));

    for (i, node) in sorted.iter().enumerate() {
        let next = sorted[(i + 1) % sorted.len()];
        let prev = sorted[(i + sorted.len() - 1) % sorted.len()];
        assert_eq!(
            &node.get_successor().await,
            next.info(),
            "successor of {}",
            node.info()
        );
        assert_eq!(
            node.get_predecessor().await.as_ref(),
            Some(prev.info()),
            "predecessor of {}",
            node.info()
        );
    }
}
