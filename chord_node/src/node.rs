use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::sync::RwLock;

use crate::config::ProtocolConfig;
use crate::error::{Error, Result};
use crate::id::{IdSpace, Identifier};
use crate::node_info::NodeInfo;
use crate::routing::RoutingTable;
use crate::rpc::{Call, Remote, Reply, Transport};

/// Runs once a node has joined through a contact, before it reports itself
/// healthy. This is where keys owned by the new node would be pulled from its
/// successor.
#[async_trait]
pub trait JoinHook: Send + Sync + 'static {
    async fn joined(&self, local: &NodeInfo, successor: &NodeInfo) -> Result<()>;
}

/// The Chord protocol engine of one node.
///
/// All routing state sits behind a single table-wide lock that is never held
/// across a remote call. Every outbound call goes through the [`Transport`],
/// so the engine runs the same over gRPC and in memory.
pub struct Node {
    info: NodeInfo,
    space: IdSpace,
    config: ProtocolConfig,
    state: RwLock<RoutingTable>,
    transport: Arc<dyn Transport>,
    join_hook: Option<Arc<dyn JoinHook>>,
    ready: AtomicBool,
}

impl Node {
    pub fn new(
        info: NodeInfo,
        space: IdSpace,
        config: ProtocolConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        if config.finger_table_size == 0 || config.finger_table_size > space.max_fingers() {
            return Err(Error::Configuration(format!(
                "finger table size must be within 1..={}, got {}",
                space.max_fingers(),
                config.finger_table_size
            )));
        }
        if info.id().as_biguint() >= space.modulus() {
            return Err(Error::Configuration(format!(
                "node id {} is outside the identifier space",
                info.id()
            )));
        }

        Ok(Node {
            state: RwLock::new(RoutingTable::new(info.clone(), config.finger_table_size)),
            info,
            space,
            config,
            transport,
            join_hook: None,
            ready: AtomicBool::new(false),
        })
    }

    pub fn with_join_hook(mut self, hook: Arc<dyn JoinHook>) -> Self {
        self.join_hook = Some(hook);
        self
    }

    pub fn info(&self) -> &NodeInfo {
        &self.info
    }

    pub fn id(&self) -> &Identifier {
        self.info.id()
    }

    pub fn address(&self) -> &str {
        self.info.address()
    }

    pub fn space(&self) -> &IdSpace {
        &self.space
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Set once the join (and the join hook) has finished.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Snapshot of the routing state.
    pub async fn routing_table(&self) -> RoutingTable {
        self.state.read().await.clone()
    }

    fn is_self(&self, node: &NodeInfo) -> bool {
        node.same_node(&self.info)
    }

    fn remote<'a>(&'a self, peer: &'a NodeInfo) -> Remote<'a> {
        Remote::new(self.transport.as_ref(), peer.address(), self.config.rpc_timeout)
    }

    /// Server side of the remote-operation contract.
    pub async fn handle(&self, call: Call) -> Result<Reply> {
        let reply = match call {
            Call::HealthCheck => Reply::Health(self.health_check()),
            Call::FindSuccessor(id) => Reply::Node(self.find_successor(&id).await?),
            Call::GetSuccessor => Reply::Node(self.get_successor().await),
            Call::GetPredecessor => Reply::Predecessor(self.get_predecessor().await),
            Call::SetPredecessor(node) => {
                self.set_predecessor(node).await;
                Reply::Done
            }
            Call::UpdateFingerTable { node, index } => {
                self.update_finger_table(node, index).await?;
                Reply::Done
            }
            Call::ClosestPrecedingFinger(id) => {
                Reply::Node(self.closest_preceding_finger(&id).await)
            }
            Call::Notify(node) => {
                self.notify(node).await;
                Reply::Done
            }
        };
        Ok(reply)
    }

    pub fn health_check(&self) -> bool {
        self.is_ready()
    }

    pub async fn get_successor(&self) -> NodeInfo {
        self.state.read().await.successor().clone()
    }

    pub async fn get_predecessor(&self) -> Option<NodeInfo> {
        self.state.read().await.predecessor().cloned()
    }

    pub async fn set_predecessor(&self, node: NodeInfo) {
        info!("{}: predecessor set to {}", self.info, node);
        self.state.write().await.set_predecessor(Some(node));
    }

    pub async fn closest_preceding_finger(&self, id: &Identifier) -> NodeInfo {
        self.state
            .read()
            .await
            .closest_preceding_finger(&self.space, id)
    }

    /// The node responsible for `id`.
    pub async fn find_successor(&self, id: &Identifier) -> Result<NodeInfo> {
        let successor = {
            let table = self.state.read().await;
            if table.is_alone() {
                return Ok(self.info.clone());
            }
            table.successor().clone()
        };

        if self.space.excl_incl(id, self.info.id(), successor.id()) {
            return Ok(successor);
        }

        let (_, successor) = self.walk(id).await?;
        Ok(successor)
    }

    /// The node whose successor is responsible for `id`.
    pub async fn find_predecessor(&self, id: &Identifier) -> Result<NodeInfo> {
        let (predecessor, _) = self.walk(id).await?;
        Ok(predecessor)
    }

    async fn successor_of(&self, node: &NodeInfo) -> Result<NodeInfo> {
        if self.is_self(node) {
            Ok(self.get_successor().await)
        } else {
            self.remote(node).get_successor().await
        }
    }

    async fn closest_preceding_finger_of(
        &self,
        node: &NodeInfo,
        id: &Identifier,
    ) -> Result<NodeInfo> {
        if self.is_self(node) {
            Ok(self.closest_preceding_finger(id).await)
        } else {
            self.remote(node).closest_preceding_finger(id).await
        }
    }

    /// Hop-by-hop search for the pair `(p, succ(p))` with `id` in `(p, succ(p)]`.
    ///
    /// Each hop asks the current candidate for its closest preceding finger
    /// and then that finger for its successor; both are remote calls unless
    /// the node asked is this one.
    async fn walk(&self, id: &Identifier) -> Result<(NodeInfo, NodeInfo)> {
        let mut candidate = self.info.clone();
        let mut successor = self.get_successor().await;

        for hop in 0..self.config.max_lookup_hops {
            if candidate.same_node(&successor)
                || self.space.excl_incl(id, candidate.id(), successor.id())
            {
                debug!(
                    "{}: lookup {} settled at {} -> {} after {} hops",
                    self.info, id, candidate, successor, hop
                );
                return Ok((candidate, successor));
            }

            let next = self.closest_preceding_finger_of(&candidate, id).await?;
            let next = if next.same_node(&candidate) {
                if candidate.id() == id {
                    // `id` names the candidate itself; (id, id) holds no finger.
                    return Ok((candidate.clone(), candidate));
                }
                warn!(
                    "{}: {} has no finger before {}, stepping to its successor {}",
                    self.info, candidate, id, successor
                );
                successor
            } else if !self.space.excl_excl(next.id(), candidate.id(), id) {
                warn!(
                    "{}: {} offered {} as closest preceding finger of {}, stepping to its successor {}",
                    self.info, candidate, next, id, successor
                );
                successor
            } else {
                next
            };

            debug!("{}: lookup {} hop {} -> {}", self.info, id, hop + 1, next);
            successor = self.successor_of(&next).await?;
            candidate = next;
        }

        Err(Error::InconsistentState(format!(
            "lookup for {} did not settle within {} hops",
            id, self.config.max_lookup_hops
        )))
    }

    /// Enters the ring. Without a contact this node starts a new ring.
    pub async fn join(&self, contact: Option<&str>) -> Result<()> {
        match contact {
            None => {
                self.state.write().await.reset_to_self();
                info!("{}: started a new ring", self.info);
            }
            Some(contact) => {
                info!("{}: joining through {}", self.info, contact);
                self.init_finger_table(contact).await?;
                self.update_others().await;

                let successor = self.get_successor().await;
                if let Some(hook) = &self.join_hook {
                    hook.joined(&self.info, &successor).await?;
                }
                info!("{}: joined, successor {}", self.info, successor);
            }
        }

        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn init_finger_table(&self, contact: &str) -> Result<()> {
        let contact = Remote::new(self.transport.as_ref(), contact, self.config.rpc_timeout);

        let start = self.space.finger_start(self.info.id(), 0);
        let successor = contact.find_successor(&start).await?;
        let predecessor = self.remote(&successor).get_predecessor().await?;
        {
            let mut table = self.state.write().await;
            table.set_successor(successor.clone());
            table.set_predecessor(predecessor);
        }
        self.remote(&successor).set_predecessor(&self.info).await?;

        for i in 0..self.config.finger_table_size - 1 {
            let start = self.space.finger_start(self.info.id(), i + 1);
            let previous = self.state.read().await.fingers()[i].clone();
            let finger = if self.space.incl_excl(&start, self.info.id(), previous.id()) {
                previous
            } else {
                contact.find_successor(&start).await?
            };
            self.state.write().await.set_finger(i + 1, finger);
        }

        Ok(())
    }

    /// Tells every node whose finger `i` should now point here.
    ///
    /// A failed update leaves that peer's finger stale; its own finger
    /// refresh corrects it later.
    async fn update_others(&self) {
        for i in 0..self.config.finger_table_size {
            let target = self.space.finger_origin(self.info.id(), i);
            let result: Result<()> = async {
                let predecessor = self.find_predecessor(&target).await?;
                if self.is_self(&predecessor) {
                    return Ok(());
                }
                self.remote(&predecessor)
                    .update_finger_table(&self.info, i)
                    .await
            }
            .await;

            if let Err(e) = result {
                warn!(
                    "{}: could not announce itself for finger {}: {}",
                    self.info, i, e
                );
            }
        }
    }

    /// `candidate` just joined; adopt it as finger `index` if it is closer
    /// than the current entry and pass the update on to the predecessor.
    pub async fn update_finger_table(&self, candidate: NodeInfo, index: usize) -> Result<()> {
        if self.is_self(&candidate) {
            return Ok(());
        }

        let forward_to = {
            let mut table = self.state.write().await;
            let Some(current) = table.finger(index).cloned() else {
                debug!(
                    "{}: no finger {} (table has {}), ignoring update",
                    self.info,
                    index,
                    table.len()
                );
                return Ok(());
            };
            if current.same_node(&candidate) {
                return Ok(());
            }
            let closer = self.is_self(&current)
                || self
                    .space
                    .incl_excl(candidate.id(), self.info.id(), current.id());
            if !closer {
                return Ok(());
            }

            debug!(
                "{}: finger {} {} -> {}",
                self.info, index, current, candidate
            );
            table.set_finger(index, candidate.clone());
            table
                .predecessor()
                .filter(|p| !p.same_node(&candidate) && !p.same_node(&self.info))
                .cloned()
        };

        if let Some(predecessor) = forward_to {
            self.remote(&predecessor)
                .update_finger_table(&candidate, index)
                .await?;
        }
        Ok(())
    }

    /// `candidate` believes it is this node's predecessor.
    pub async fn notify(&self, candidate: NodeInfo) {
        if self.is_self(&candidate) {
            return;
        }

        let mut table = self.state.write().await;
        let adopt = match table.predecessor() {
            None => true,
            Some(current) if current.same_node(&self.info) => true,
            Some(current) => self
                .space
                .excl_excl(candidate.id(), current.id(), self.info.id()),
        };
        if adopt {
            info!("{}: predecessor is now {}", self.info, candidate);
            table.set_predecessor(Some(candidate));
        }
    }

    /// One stabilization round; failures leave the pointers as they were.
    pub async fn stabilize(&self) {
        if let Err(e) = self.try_stabilize().await {
            warn!("{}: stabilize failed: {}", self.info, e);
        }
    }

    pub async fn try_stabilize(&self) -> Result<()> {
        let mut successor = self.get_successor().await;
        let reported = if self.is_self(&successor) {
            self.get_predecessor().await
        } else {
            self.remote(&successor).get_predecessor().await?
        };

        if let Some(x) = reported {
            let closer = !self.is_self(&x)
                && (self.is_self(&successor)
                    || self.space.excl_excl(x.id(), self.info.id(), successor.id()));
            if closer {
                let mut table = self.state.write().await;
                if table.successor().same_node(&successor) {
                    info!("{}: successor is now {}", self.info, x);
                    table.set_successor(x);
                }
                successor = table.successor().clone();
            }
        }

        if !self.is_self(&successor) {
            self.remote(&successor).notify(&self.info).await?;
        }
        Ok(())
    }

    /// Refreshes the next finger in round-robin order.
    pub async fn fix_fingers(&self) {
        if let Err(e) = self.try_fix_fingers().await {
            warn!("{}: fix_fingers failed: {}", self.info, e);
        }
    }

    pub async fn try_fix_fingers(&self) -> Result<usize> {
        let index = self.state.write().await.next_finger_to_fix();
        let start = self.space.finger_start(self.info.id(), index);
        let finger = self.find_successor(&start).await?;

        let mut table = self.state.write().await;
        if table.finger(index).is_some_and(|f| !f.same_node(&finger)) {
            debug!("{}: finger {} refreshed to {}", self.info, index, finger);
        }
        table.set_finger(index, finger);
        Ok(index)
    }

    /// Probes the predecessor and forgets it if the probe fails or times out.
    /// A predecessor that answers but is still joining is kept.
    pub async fn check_predecessor(&self) {
        let Some(predecessor) = self.get_predecessor().await else {
            return;
        };
        if self.is_self(&predecessor) {
            return;
        }

        let probe = Remote::new(
            self.transport.as_ref(),
            predecessor.address(),
            self.config.probe_timeout,
        );
        let alive = match probe.health_check().await {
            Ok(ready) => {
                if !ready {
                    debug!("{}: predecessor {} is not ready yet", self.info, predecessor);
                }
                true
            }
            Err(e) => {
                warn!("{}: predecessor {} failed probe: {}", self.info, predecessor, e);
                false
            }
        };

        if !alive && self.state.write().await.clear_predecessor_if(&predecessor) {
            info!("{}: cleared predecessor {}", self.info, predecessor);
        }
    }
}
