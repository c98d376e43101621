use std::net::SocketAddr;
use std::sync::Arc;

use chord_proto::chord::{
    self as proto,
    chord_server::{Chord, ChordServer},
    Empty, GetPredecessorResponse, HealthCheckResponse, UpdateFingerTableRequest,
};
use log::info;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

use super::convert::{identifier_from_proto, node_from_proto, node_to_proto};
use crate::id::IdSpace;
use crate::node::Node;

/// Forwards inbound gRPC calls to the protocol engine. Calls arriving after
/// shutdown has begun are refused with `UNAVAILABLE`.
pub struct ChordService {
    node: Arc<Node>,
    stopping: watch::Receiver<bool>,
}

impl ChordService {
    pub fn new(node: Arc<Node>, stopping: watch::Receiver<bool>) -> Self {
        ChordService { node, stopping }
    }

    fn admit(&self) -> Result<(), Status> {
        if *self.stopping.borrow() {
            return Err(Status::unavailable("node is shutting down"));
        }
        Ok(())
    }

    fn space(&self) -> &IdSpace {
        self.node.space()
    }
}

#[tonic::async_trait]
impl Chord for ChordService {
    async fn health_check(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        self.admit()?;
        Ok(Response::new(HealthCheckResponse {
            status: self.node.health_check(),
        }))
    }

    async fn find_successor(
        &self,
        request: Request<proto::Identifier>,
    ) -> Result<Response<proto::NodeInfo>, Status> {
        self.admit()?;
        let id = identifier_from_proto(self.space(), request.get_ref())?;
        let successor = self.node.find_successor(&id).await?;
        Ok(Response::new(node_to_proto(self.space(), &successor)))
    }

    async fn get_successor(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<proto::NodeInfo>, Status> {
        self.admit()?;
        let successor = self.node.get_successor().await;
        Ok(Response::new(node_to_proto(self.space(), &successor)))
    }

    async fn get_predecessor(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<GetPredecessorResponse>, Status> {
        self.admit()?;
        let predecessor = self.node.get_predecessor().await;
        Ok(Response::new(GetPredecessorResponse {
            node: predecessor.map(|p| node_to_proto(self.space(), &p)),
        }))
    }

    async fn set_predecessor(
        &self,
        request: Request<proto::NodeInfo>,
    ) -> Result<Response<Empty>, Status> {
        self.admit()?;
        let node = node_from_proto(self.space(), request.into_inner())?;
        self.node.set_predecessor(node).await;
        Ok(Response::new(Empty {}))
    }

    async fn update_finger_table(
        &self,
        request: Request<UpdateFingerTableRequest>,
    ) -> Result<Response<Empty>, Status> {
        self.admit()?;
        let request = request.into_inner();
        let node = request
            .node
            .ok_or_else(|| Status::invalid_argument("update_finger_table without a node"))?;
        let node = node_from_proto(self.space(), node)?;
        self.node
            .update_finger_table(node, request.index as usize)
            .await?;
        Ok(Response::new(Empty {}))
    }

    async fn closest_preceding_finger(
        &self,
        request: Request<proto::Identifier>,
    ) -> Result<Response<proto::NodeInfo>, Status> {
        self.admit()?;
        let id = identifier_from_proto(self.space(), request.get_ref())?;
        let finger = self.node.closest_preceding_finger(&id).await;
        Ok(Response::new(node_to_proto(self.space(), &finger)))
    }

    async fn notify(&self, request: Request<proto::NodeInfo>) -> Result<Response<Empty>, Status> {
        self.admit()?;
        let node = node_from_proto(self.space(), request.into_inner())?;
        self.node.notify(node).await;
        Ok(Response::new(Empty {}))
    }
}

/// A running gRPC server for one node.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Result<(), tonic::transport::Error>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Flips to `true` once shutdown has begun; background tasks watch it too.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Stops accepting calls. Calls already being served run to completion.
    pub fn shutdown(&self) {
        info!("server on {} shutting down", self.local_addr);
        self.shutdown.send_replace(true);
    }

    /// Blocks until the server has stopped and in-flight calls are done.
    pub async fn await_termination(self) -> anyhow::Result<()> {
        self.task.await??;
        info!("server on {} terminated", self.local_addr);
        Ok(())
    }
}

/// Serves `node` on an already bound listener.
pub fn serve(node: Arc<Node>, listener: TcpListener) -> std::io::Result<ServerHandle> {
    let local_addr = listener.local_addr()?;
    let (shutdown, stopping) = watch::channel(false);
    let service = ChordService::new(node, stopping.clone());
    let mut signal = stopping;

    info!("server listening on {}", local_addr);
    let task = tokio::spawn(async move {
        Server::builder()
            .add_service(ChordServer::new(service))
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
                let _ = signal.wait_for(|stopping| *stopping).await;
            })
            .await
    });

    Ok(ServerHandle {
        local_addr,
        shutdown,
        task,
    })
}
