use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};

use chord_node::constants::{DEFAULT_PORT, HASH_BITS, LOCALHOST, RPC_TIMEOUT_MS};
use chord_node::grpc::GrpcTransport;
use chord_node::{IdSpace, Identifier, NodeInfo, Remote};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address of the node to connect to
    #[arg(short, long, default_value_t = format!("{LOCALHOST}:{DEFAULT_PORT}"))]
    node: String,

    /// Identifier width the ring was started with
    #[arg(long, default_value_t = HASH_BITS)]
    bits: u32,

    /// Call timeout in milliseconds
    #[arg(long, default_value_t = RPC_TIMEOUT_MS)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask whether the node has joined and is serving
    Health,
    /// Find the node responsible for an identifier (decimal or 0x hex)
    FindSuccessor { id: Identifier },
    /// Show the node's successor
    Successor,
    /// Show the node's predecessor
    Predecessor,
    /// Show the node's closest finger preceding an identifier
    ClosestPrecedingFinger { id: Identifier },
    /// Print the identifier an address hashes to
    Id { address: String },
}

fn show(label: &str, node: &NodeInfo) {
    println!("{label}: ID={}, Address={}", node.id(), node.address());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let space = IdSpace::new(cli.bits)?;

    if let Commands::Id { address } = &cli.command {
        println!("{}", space.hash(address.as_bytes()));
        return Ok(());
    }

    let transport = GrpcTransport::new(space.clone());
    let remote = Remote::new(
        &transport,
        &cli.node,
        Duration::from_millis(cli.timeout_ms),
    );

    match cli.command {
        Commands::Health => {
            let healthy = remote.health_check().await.context("health check")?;
            println!("{}", if healthy { "healthy" } else { "not ready" });
        }
        Commands::FindSuccessor { id } => {
            let id = space.check(id)?;
            let node = remote.find_successor(&id).await.context("find_successor")?;
            show("Successor", &node);
        }
        Commands::Successor => {
            let node = remote.get_successor().await.context("get_successor")?;
            show("Successor", &node);
        }
        Commands::Predecessor => match remote.get_predecessor().await.context("get_predecessor")? {
            Some(node) => show("Predecessor", &node),
            None => println!("Predecessor: <none>"),
        },
        Commands::ClosestPrecedingFinger { id } => {
            let id = space.check(id)?;
            let node = remote
                .closest_preceding_finger(&id)
                .await
                .context("closest_preceding_finger")?;
            show("Closest preceding finger", &node);
        }
        Commands::Id { .. } => {}
    }

    Ok(())
}
