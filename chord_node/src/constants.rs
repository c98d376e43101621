/// SHA-1 digest width; the widest identifier space a node can use.
pub const HASH_BITS: u32 = 160;
pub const DEFAULT_PORT: u16 = 4321;
pub const LOCALHOST: &str = "127.0.0.1";

// Timeouts
pub const RPC_TIMEOUT_MS: u64 = 2000;
pub const PROBE_TIMEOUT_MS: u64 = 150;

// Intervals
pub const STABILIZATION_INTERVAL_MS: u64 = 1000;
pub const FIX_FINGERS_INTERVAL_MS: u64 = 1000;
pub const CHECK_PREDECESSOR_INTERVAL_MS: u64 = 1000;
pub const STATE_DUMP_INTERVAL_MS: u64 = 10_000;

pub const MAX_LOOKUP_HOPS: usize = 256;
