use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    CHECK_PREDECESSOR_INTERVAL_MS, FIX_FINGERS_INTERVAL_MS, HASH_BITS, MAX_LOOKUP_HOPS,
    PROBE_TIMEOUT_MS, RPC_TIMEOUT_MS, STABILIZATION_INTERVAL_MS,
};
use crate::error::{Error, Result};
use crate::id::IdSpace;

/// Node settings as read from a JSON file. Every field is optional in the
/// file; missing ones take the defaults from [`crate::constants`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    pub bits: u32,
    /// Defaults to `bits`, the full Chord table.
    pub finger_table_size: Option<usize>,
    pub rpc_timeout_ms: u64,
    pub probe_timeout_ms: u64,
    pub stabilize_interval_ms: u64,
    pub fix_fingers_interval_ms: u64,
    pub check_predecessor_interval_ms: u64,
    pub max_lookup_hops: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            bits: HASH_BITS,
            finger_table_size: None,
            rpc_timeout_ms: RPC_TIMEOUT_MS,
            probe_timeout_ms: PROBE_TIMEOUT_MS,
            stabilize_interval_ms: STABILIZATION_INTERVAL_MS,
            fix_fingers_interval_ms: FIX_FINGERS_INTERVAL_MS,
            check_predecessor_interval_ms: CHECK_PREDECESSOR_INTERVAL_MS,
            max_lookup_hops: MAX_LOOKUP_HOPS,
        }
    }
}

impl NodeConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: NodeConfig = serde_json::from_str(raw)
            .map_err(|e| Error::Configuration(format!("bad config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn finger_table_size(&self) -> usize {
        self.finger_table_size.unwrap_or(self.bits as usize)
    }

    pub fn validate(&self) -> Result<()> {
        let space = self.id_space()?;
        let fingers = self.finger_table_size();
        if fingers == 0 || fingers > space.max_fingers() {
            return Err(Error::Configuration(format!(
                "finger table size must be within 1..={}, got {fingers}",
                space.max_fingers()
            )));
        }
        let timings = [
            ("rpc_timeout_ms", self.rpc_timeout_ms),
            ("probe_timeout_ms", self.probe_timeout_ms),
            ("stabilize_interval_ms", self.stabilize_interval_ms),
            ("fix_fingers_interval_ms", self.fix_fingers_interval_ms),
            (
                "check_predecessor_interval_ms",
                self.check_predecessor_interval_ms,
            ),
        ];
        if let Some((name, _)) = timings.iter().find(|(_, ms)| *ms == 0) {
            return Err(Error::Configuration(format!("{name} must be positive")));
        }
        if self.max_lookup_hops == 0 {
            return Err(Error::Configuration(
                "max_lookup_hops must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn id_space(&self) -> Result<IdSpace> {
        IdSpace::new(self.bits)
    }

    pub fn protocol(&self) -> ProtocolConfig {
        ProtocolConfig {
            finger_table_size: self.finger_table_size(),
            rpc_timeout: Duration::from_millis(self.rpc_timeout_ms),
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            max_lookup_hops: self.max_lookup_hops,
        }
    }

    pub fn maintenance(&self) -> MaintenanceConfig {
        MaintenanceConfig {
            stabilize_interval: Duration::from_millis(self.stabilize_interval_ms),
            fix_fingers_interval: Duration::from_millis(self.fix_fingers_interval_ms),
            check_predecessor_interval: Duration::from_millis(
                self.check_predecessor_interval_ms,
            ),
        }
    }
}

/// What the protocol engine needs at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    pub finger_table_size: usize,
    pub rpc_timeout: Duration,
    /// Bound on the predecessor health probe, separate from its period.
    pub probe_timeout: Duration,
    pub max_lookup_hops: usize,
}

impl ProtocolConfig {
    pub fn with_fingers(finger_table_size: usize) -> Self {
        ProtocolConfig {
            finger_table_size,
            ..NodeConfig::default().protocol()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceConfig {
    pub stabilize_interval: Duration,
    pub fix_fingers_interval: Duration,
    pub check_predecessor_interval: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_a_full_sha1_table() {
        let config = NodeConfig::default();
        config.validate().unwrap();
        assert_eq!(config.finger_table_size(), 160);
        assert_eq!(config.protocol().probe_timeout, Duration::from_millis(150));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = NodeConfig::from_json(r#"{ "bits": 32, "finger_table_size": 3 }"#).unwrap();
        assert_eq!(config.bits, 32);
        assert_eq!(config.finger_table_size(), 3);
        assert_eq!(config.rpc_timeout_ms, RPC_TIMEOUT_MS);
    }

    #[test]
    fn rejects_tables_wider_than_the_space() {
        let err = NodeConfig::from_json(r#"{ "bits": 8, "finger_table_size": 9 }"#).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = NodeConfig::from_json(r#"{ "bits": 200 }"#).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = NodeConfig::from_json(r#"{ "probe_timeout_ms": 0 }"#).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = NodeConfig::from_json(r#"{ "fingers": 3 }"#).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
