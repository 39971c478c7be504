//! Peer RPC surface (spec.md §5 "Node (actor) — RPC surface").
//!
//! [`RemoteNodeHandle`] is the trait [`crate::node::Node`] is generic over.
//! Production code talks to peers through [`GrpcHandle`], a thin wrapper
//! around a lazily-connected tonic channel; tests talk to peers through
//! `crate::loopback::LoopbackHandle`, an in-process stand-in that never
//! touches a socket. Both implement the exact same trait, so `Node<H>`'s
//! logic is identical either way — only the transport differs.

pub mod chord_proto {
    tonic::include_proto!("chord");
}

mod grpc;
mod server;

pub use grpc::GrpcHandle;
pub use server::ChordRpcService;

use async_trait::async_trait;

use crate::error::ChordResult;
use crate::keyhash::RingId;

/// Everything a [`crate::node::Node`] needs to address and talk to a peer,
/// whether that peer lives across the network or in the same process.
#[async_trait]
pub trait RemoteNodeHandle: Clone + Send + Sync + Sized + 'static {
    /// Build a handle whose ring identifier is not yet known; resolved
    /// lazily (and cached) the first time it's needed.
    fn from_address(address: String) -> Self;

    /// Build a handle whose ring identifier is already known, e.g. because
    /// it arrived bundled in a `PeerMessage` from a prior RPC response.
    fn with_known_key(address: String, node_key: RingId) -> Self;

    fn address(&self) -> &str;

    /// The peer's ring identifier, resolving and caching it on first call.
    async fn node_key(&self) -> ChordResult<RingId>;

    /// The peer's hash length `m`, used by clients to compute key
    /// identifiers for this ring.
    async fn get_hash_length(&self) -> ChordResult<u32>;

    async fn find_successor(&self, id: RingId) -> ChordResult<Self>;
    async fn get_predecessor(&self) -> ChordResult<Option<Self>>;

    /// Tell this peer that `candidate` believes it may be its predecessor;
    /// the peer adopts it if it's a better fit (spec.md's `checkPredecessor`,
    /// which folds the usual Chord "notify" step in).
    async fn check_predecessor(&self, candidate: &Self) -> ChordResult<()>;

    async fn get(&self, id: RingId) -> ChordResult<Option<Vec<u8>>>;
    async fn put(&self, id: RingId, value: Vec<u8>) -> ChordResult<()>;
    async fn delete(&self, id: RingId) -> ChordResult<()>;

    async fn put_backup(&self, id: RingId, value: Vec<u8>) -> ChordResult<()>;
    async fn remove_backup(&self, id: RingId) -> ChordResult<()>;

    /// Tells this peer that `departing_id` is leaving and, if this peer's
    /// successor is currently `departing_id`, to adopt `candidate`
    /// (the departing node's own successor) in its place. Used by
    /// `Node::leave` so a predecessor doesn't keep routing into a node
    /// that has gone away.
    async fn adopt_successor_hint(&self, departing_id: RingId, candidate: &Self) -> ChordResult<()>;

    async fn health(&self) -> ChordResult<()>;
}
