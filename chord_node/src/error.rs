use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("call to {peer} timed out after {timeout:?}")]
    Timeout { peer: String, timeout: Duration },

    #[error("peer {peer} unreachable: {reason}")]
    Unreachable { peer: String, reason: String },

    /// Routing pointers disagree badly enough that a lookup could not finish.
    /// Stabilization repairs this; it is never fatal to the node.
    #[error("inconsistent ring state: {0}")]
    InconsistentState(String),

    #[error("malformed message: {0}")]
    Protocol(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl Error {
    pub fn unreachable(peer: impl Into<String>, reason: impl ToString) -> Self {
        Error::Unreachable {
            peer: peer.into(),
            reason: reason.to_string(),
        }
    }

    /// Failures that only say something about one peer at one moment.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. } | Error::Unreachable { .. } | Error::Protocol(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_not_transient() {
        assert!(!Error::Configuration("bits".into()).is_transient());
        assert!(!Error::InconsistentState("loop".into()).is_transient());
        assert!(Error::unreachable("10.0.0.1:4321", "refused").is_transient());
        assert!(Error::Timeout {
            peer: "10.0.0.1:4321".into(),
            timeout: Duration::from_millis(150),
        }
        .is_transient());
    }
}
