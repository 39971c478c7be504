//! Core Chord DHT node: ring state machine, finger-table routing, and
//! successor-backup replication.
//!
//! The public surface is deliberately small: build a [`config::NodeConfig`],
//! construct a [`node::Node`] over whichever [`rpc::RemoteNodeHandle`]
//! transport you're using, `join` it to a ring (or not, to start one), and
//! spawn [`maintainer::spawn`] to keep it healthy.

pub mod config;
pub mod error;
pub mod finger_table;
pub mod keyhash;
pub mod loopback;
pub mod maintainer;
pub mod node;
pub mod retry;
pub mod ring;
pub mod rpc;
pub mod store;

pub use config::NodeConfig;
pub use error::{ChordError, ChordResult};
pub use node::{Node, NodeState};
pub use rpc::RemoteNodeHandle;
