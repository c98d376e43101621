use std::time::Duration;

use chord_proto::chord as proto;
use tonic::{Code, Status};

use crate::error::Error;
use crate::id::{IdSpace, Identifier};
use crate::node_info::NodeInfo;

pub fn identifier_to_proto(space: &IdSpace, id: &Identifier) -> proto::Identifier {
    proto::Identifier {
        value: space.encode(id),
    }
}

pub fn identifier_from_proto(space: &IdSpace, id: &proto::Identifier) -> Result<Identifier, Error> {
    space.decode(&id.value)
}

pub fn node_to_proto(space: &IdSpace, node: &NodeInfo) -> proto::NodeInfo {
    proto::NodeInfo {
        id: space.encode(node.id()),
        address: node.address().to_string(),
    }
}

pub fn node_from_proto(space: &IdSpace, node: proto::NodeInfo) -> Result<NodeInfo, Error> {
    if node.address.is_empty() {
        return Err(Error::Protocol("node descriptor without an address".into()));
    }
    Ok(NodeInfo::new(space.decode(&node.id)?, node.address))
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        let message = err.to_string();
        match err {
            Error::Timeout { .. } => Status::deadline_exceeded(message),
            Error::Unreachable { .. } => Status::unavailable(message),
            Error::Protocol(_) => Status::invalid_argument(message),
            Error::InconsistentState(_) => Status::aborted(message),
            Error::Configuration(_) => Status::internal(message),
        }
    }
}

/// Maps a failed call back onto the engine's taxonomy.
pub fn error_from_status(peer: &str, timeout: Duration, status: Status) -> Error {
    match status.code() {
        Code::DeadlineExceeded | Code::Cancelled => Error::Timeout {
            peer: peer.to_string(),
            timeout,
        },
        Code::InvalidArgument => Error::Protocol(format!("{peer}: {}", status.message())),
        Code::Aborted => Error::InconsistentState(format!("{peer}: {}", status.message())),
        _ => Error::unreachable(peer, status.message()),
    }
}
