mod common;

use std::sync::Arc;
use std::time::Duration;

use chord_node::grpc::{serve, GrpcTransport};
use chord_node::memory::MemoryNetwork;
use chord_node::{Error, IdSpace, Node, NodeInfo, ProtocolConfig, Remote};
use common::{assert_ring_ordered, start_node, stabilize_ring};
use tokio::net::TcpListener;

fn config(space: &IdSpace) -> ProtocolConfig {
    ProtocolConfig {
        rpc_timeout: Duration::from_millis(500),
        ..ProtocolConfig::with_fingers(space.max_fingers())
    }
}

#[tokio::test]
async fn three_nodes_form_a_ring_over_grpc() {
    let space = IdSpace::new(16).unwrap();
    let a = start_node(&space, 1000, config(&space)).await;
    let b = start_node(&space, 30000, config(&space)).await;
    let c = start_node(&space, 50000, config(&space)).await;

    a.node.join(None).await.unwrap();
    b.node.join(Some(a.address())).await.unwrap();
    c.node.join(Some(b.address())).await.unwrap();

    let nodes: Vec<Arc<Node>> = vec![a.node.clone(), b.node.clone(), c.node.clone()];
    stabilize_ring(&nodes, 3).await;
    assert_ring_ordered(&nodes).await;

    // an outside caller sees the same answers as the nodes themselves
    let client = GrpcTransport::new(space.clone());
    let remote = Remote::new(&client, a.address(), Duration::from_secs(1));
    assert!(remote.health_check().await.unwrap());
    assert_eq!(
        &remote.find_successor(&space.id(40000)).await.unwrap(),
        c.node.info()
    );
    assert_eq!(
        &remote.find_successor(&space.id(60000)).await.unwrap(),
        a.node.info()
    );
    assert_eq!(&remote.get_successor().await.unwrap(), b.node.info());
    assert_eq!(
        remote.get_predecessor().await.unwrap().as_ref(),
        Some(c.node.info())
    );
    assert_eq!(
        &remote
            .closest_preceding_finger(&space.id(45000))
            .await
            .unwrap(),
        b.node.info()
    );

    for server in [a.server, b.server, c.server] {
        server.shutdown();
        server.await_termination().await.unwrap();
    }
}

#[tokio::test]
async fn unjoined_node_reports_unhealthy() {
    let space = IdSpace::new(16).unwrap();
    let node = start_node(&space, 4242, config(&space)).await;

    let client = GrpcTransport::new(space.clone());
    let remote = Remote::new(&client, node.address(), Duration::from_secs(1));
    assert!(!remote.health_check().await.unwrap());

    node.node.join(None).await.unwrap();
    assert!(remote.health_check().await.unwrap());

    node.server.shutdown();
    node.server.await_termination().await.unwrap();
}

#[tokio::test]
async fn calls_fail_after_shutdown() {
    let space = IdSpace::new(16).unwrap();
    let node = start_node(&space, 4242, config(&space)).await;
    node.node.join(None).await.unwrap();
    let address = node.address().to_string();

    let client = GrpcTransport::new(space.clone());
    let remote = Remote::new(&client, &address, Duration::from_millis(300));
    assert!(remote.health_check().await.unwrap());

    node.server.shutdown();
    node.server.await_termination().await.unwrap();

    let err = remote.health_check().await.unwrap_err();
    assert!(
        matches!(err, Error::Unreachable { .. } | Error::Timeout { .. }),
        "unexpected {err:?}"
    );
}

#[tokio::test]
async fn shutdown_refuses_new_calls_but_finishes_running_ones() {
    // n10 is served over gRPC; its own calls to n50 go through a slow
    // in-memory link, so a lookup that has to ask n50 stays in flight
    let space = IdSpace::with_modulus(100).unwrap();
    let net = MemoryNetwork::new();
    let config = ProtocolConfig::with_fingers(space.max_fingers());
    let n10 = net
        .spawn_node(NodeInfo::new(space.id(10), "n10"), space.clone(), config.clone())
        .unwrap();
    let n50 = net
        .spawn_node(NodeInfo::new(space.id(50), "n50"), space.clone(), config)
        .unwrap();
    n10.join(None).await.unwrap();
    n50.join(Some("n10")).await.unwrap();
    net.set_latency("n50", Duration::from_millis(500));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let server = serve(n10.clone(), listener).unwrap();

    let slow = {
        let space = space.clone();
        let address = address.clone();
        tokio::spawn(async move {
            let client = GrpcTransport::new(space.clone());
            let remote = Remote::new(&client, &address, Duration::from_secs(3));
            let owner = remote.find_successor(&space.id(60)).await;
            owner
        })
    };
    tokio::time::sleep(Duration::from_millis(150)).await;

    server.shutdown();
    let client = GrpcTransport::new(space.clone());
    let err = Remote::new(&client, &address, Duration::from_secs(1))
        .health_check()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unreachable { .. }), "unexpected {err:?}");

    assert_eq!(&slow.await.unwrap().unwrap(), n10.info());
    server.await_termination().await.unwrap();
}

#[tokio::test]
async fn unknown_peers_are_unreachable() {
    let space = IdSpace::new(16).unwrap();
    let client = GrpcTransport::new(space);
    // reserved port, nothing listens there
    let remote = Remote::new(&client, "127.0.0.1:1", Duration::from_millis(300));
    let err = remote.get_successor().await.unwrap_err();
    assert!(err.is_transient(), "unexpected {err:?}");
}
