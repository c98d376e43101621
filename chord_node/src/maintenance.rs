//! Periodic ring repair. stabilize, fix_fingers and check_predecessor each
//! run on their own timer so a slow round of one never delays the others.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::MaintenanceConfig;
use crate::constants::STATE_DUMP_INTERVAL_MS;
use crate::node::Node;

/// Starts the maintenance tasks for `node`. They stop once `shutdown`
/// flips to `true` or its sender goes away.
pub fn spawn(
    node: Arc<Node>,
    config: MaintenanceConfig,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let mut tasks = Vec::with_capacity(4);

    let n = node.clone();
    tasks.push(every(
        "stabilize",
        config.stabilize_interval,
        shutdown.clone(),
        move || {
            let n = n.clone();
            async move { n.stabilize().await }
        },
    ));

    let n = node.clone();
    tasks.push(every(
        "fix_fingers",
        config.fix_fingers_interval,
        shutdown.clone(),
        move || {
            let n = n.clone();
            async move { n.fix_fingers().await }
        },
    ));

    let n = node.clone();
    tasks.push(every(
        "check_predecessor",
        config.check_predecessor_interval,
        shutdown.clone(),
        move || {
            let n = n.clone();
            async move { n.check_predecessor().await }
        },
    ));

    if log::log_enabled!(log::Level::Debug) {
        tasks.push(every(
            "state_dump",
            Duration::from_millis(STATE_DUMP_INTERVAL_MS),
            shutdown,
            move || {
                let n = node.clone();
                async move { debug!("{}", n.routing_table().await) }
            },
        ));
    }

    tasks
}

fn every<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut round: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        // Nodes started together should not all fire at the same instant.
        let offset = rand::thread_rng().gen_range(Duration::ZERO..=period);
        let mut ticker = interval_at(Instant::now() + offset, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => round().await,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("{} task stopped", name);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProtocolConfig;
    use crate::memory::MemoryNetwork;
    use crate::node_info::NodeInfo;
    use crate::IdSpace;

    fn fast() -> MaintenanceConfig {
        MaintenanceConfig {
            stabilize_interval: Duration::from_millis(10),
            fix_fingers_interval: Duration::from_millis(10),
            check_predecessor_interval: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn tasks_repair_a_ring_and_stop_on_shutdown() {
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

        // n50 dies; n10 has to notice and drop it as predecessor
        net.disconnect("n50");

        let (stop, stopping) = watch::channel(false);
        let tasks = spawn(n10.clone(), fast(), stopping);

        tokio::time::timeout(Duration::from_secs(5), async {
            while n10.get_predecessor().await.is_some() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        stop.send(true).unwrap();
        for task in tasks {
            tokio::time::timeout(Duration::from_secs(1), task)
                .await
                .unwrap()
                .unwrap();
        }
    }
}
