pub mod config;
pub mod constants;
pub mod error;
pub mod grpc;
pub mod id;
pub mod maintenance;
pub mod memory;
pub mod node;
pub mod node_info;
pub mod routing;
pub mod rpc;

pub use config::{MaintenanceConfig, NodeConfig, ProtocolConfig};
pub use error::{Error, Result};
pub use id::{IdSpace, Identifier};
pub use node::{JoinHook, Node};
pub use node_info::NodeInfo;
pub use routing::RoutingTable;
pub use rpc::{Call, Remote, Reply, Transport};
