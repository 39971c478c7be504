//! Configuration inputs the core consumes (spec.md §6).
//!
//! This struct is what the CLI binary (or any other external entry point)
//! builds before constructing a [`crate::node::Node`]. The core never reads
//! a config file itself; `serde` derives are provided so a caller can load
//! one if it wants to.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default maintainer period, matching spec.md's `fixInterval` default.
pub const DEFAULT_FIX_INTERVAL_MILLIS: u64 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Hash length in bits; the ring has `2^m` identifiers.
    pub m: u32,
    /// This node's identifier, must fit in `[0, 2^m)`.
    pub node_key: u64,
    /// The address this node's peer RPC service is reachable at, and the
    /// value remote handles store for it.
    pub address: String,
    /// Address of a peer to join through. `None` starts a new ring.
    pub bootstrap: Option<String>,
    /// Background maintainer period, in milliseconds.
    pub fix_interval_millis: u64,
    /// Retry harness attempt bound (`networkRetries`); defaults to `m + 1`.
    pub retries: usize,
}

impl NodeConfig {
    pub fn new(m: u32, node_key: u64, address: impl Into<String>) -> Self {
        NodeConfig {
            m,
            node_key,
            address: address.into(),
            bootstrap: None,
            fix_interval_millis: DEFAULT_FIX_INTERVAL_MILLIS,
            retries: m as usize + 1,
        }
    }

    pub fn with_bootstrap(mut self, bootstrap: impl Into<String>) -> Self {
        self.bootstrap = Some(bootstrap.into());
        self
    }

    pub fn fix_interval(&self) -> Duration {
        Duration::from_millis(self.fix_interval_millis)
    }
}
