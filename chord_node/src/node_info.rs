use std::fmt;

use crate::id::Identifier;

/// A ring member as other nodes see it: position plus where to reach it.
///
/// Descriptors are plain values. A node's copy of a peer's descriptor never
/// aliases any of that peer's mutable state.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeInfo {
    id: Identifier,
    address: String,
}

impl NodeInfo {
    pub fn new(id: Identifier, address: impl Into<String>) -> Self {
        NodeInfo {
            id,
            address: address.into(),
        }
    }

    pub fn id(&self) -> &Identifier {
        &self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether both descriptors name the same node. Addresses are unique per
    /// node, ids are derived from them.
    pub fn same_node(&self, other: &NodeInfo) -> bool {
        self.address == other.address
    }
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.address)
    }
}
