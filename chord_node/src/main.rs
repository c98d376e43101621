use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use log::{error, info};
use tokio::net::TcpListener;

use chord_node::constants::{DEFAULT_PORT, LOCALHOST};
use chord_node::grpc::{self, GrpcTransport};
use chord_node::{maintenance, Node, NodeConfig, NodeInfo};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host to listen on; also the address other nodes reach us at
    #[arg(long, default_value = LOCALHOST)]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address of a node to join
    #[arg(short, long)]
    join: Option<String>,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Identifier width in bits (overrides the config file)
    #[arg(long)]
    bits: Option<u32>,

    /// Finger table size (overrides the config file)
    #[arg(long)]
    fingers: Option<usize>,
}

fn load_config(args: &Args) -> anyhow::Result<NodeConfig> {
    let mut config = match &args.config {
        Some(path) => NodeConfig::from_file(path)?,
        None => NodeConfig::default(),
    };
    if let Some(bits) = args.bits {
        config.bits = bits;
    }
    if args.fingers.is_some() {
        config.finger_table_size = args.fingers;
    }
    config.validate()?;
    Ok(config)
}

/// Confirms the node answers for itself and its neighbours before it starts
/// serving maintenance.
async fn self_check(node: &Node) -> anyhow::Result<()> {
    if !node.health_check() {
        bail!("node reports unhealthy after join");
    }
    let space = node.space();
    let id = node.id();
    for target in [id.clone(), space.add(id, 1), space.sub(id, 1)] {
        let owner = node
            .find_successor(&target)
            .await
            .with_context(|| format!("self-check lookup of {target}"))?;
        info!("self-check: {} -> {}", target, owner);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} [{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
    let args = Args::parse();

    let config = load_config(&args)?;
    let space = config.id_space()?;
    let address = format!("{}:{}", args.host, args.port);
    let info = NodeInfo::new(space.hash(address.as_bytes()), address.clone());
    info!("node starting at {} with id {}", address, info.id());

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("cannot listen on {address}"))?;

    let transport = Arc::new(GrpcTransport::new(space.clone()));
    let node = Arc::new(Node::new(info, space, config.protocol(), transport)?);
    let server = grpc::serve(node.clone(), listener)?;

    if let Err(e) = node.join(args.join.as_deref()).await {
        error!("join failed: {}", e);
        server.shutdown();
        server.await_termination().await?;
        return Err(e).context("join failed");
    }
    self_check(&node).await?;
    info!("{}", node.routing_table().await);

    let tasks = maintenance::spawn(node.clone(), config.maintenance(), server.shutdown_signal());

    tokio::signal::ctrl_c().await?;
    server.shutdown();
    server.await_termination().await?;
    for task in tasks {
        task.await?;
    }
    info!("node {} stopped", node.info());
    Ok(())
}
