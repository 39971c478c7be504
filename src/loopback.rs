//! `LoopbackHandle`: an in-process [`RemoteNodeHandle`] used by tests to run
//! many `Node`s in one process without touching a socket.
//!
//! Every loopback node registers itself in a process-global directory
//! keyed by address; a handle resolves an address to the live `Arc<Node<_>>>`
//! and calls straight into it. This lets the exact same `Node<H>` logic
//! that drives `GrpcHandle` in production be exercised deterministically in
//! integration tests (the generic-over-transport pattern this crate takes
//! from examples/other_examples' `NodeService<C: Client>`).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;

use crate::error::{ChordError, ChordResult};
use crate::keyhash::RingId;
use crate::node::Node;
use crate::rpc::RemoteNodeHandle;

type Registry = Mutex<HashMap<String, Arc<Node<LoopbackHandle>>>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

pub fn register(address: String, node: Arc<Node<LoopbackHandle>>) {
    registry().lock().unwrap().insert(address, node);
}

pub fn unregister(address: &str) {
    registry().lock().unwrap().remove(address);
}

#[derive(Clone)]
pub struct LoopbackHandle {
    address: String,
    node_key: Arc<tokio::sync::OnceCell<RingId>>,
}

impl LoopbackHandle {
    fn resolve(&self) -> ChordResult<Arc<Node<LoopbackHandle>>> {
        registry()
            .lock()
            .unwrap()
            .get(&self.address)
            .cloned()
            .ok_or_else(|| ChordError::TransientPeerFailure(format!("no such loopback node: {}", self.address)))
    }
}

#[async_trait]
impl RemoteNodeHandle for LoopbackHandle {
    fn from_address(address: String) -> Self {
        LoopbackHandle {
            address,
            node_key: Arc::new(tokio::sync::OnceCell::new()),
        }
    }

    fn with_known_key(address: String, node_key: RingId) -> Self {
        let cell = tokio::sync::OnceCell::new();
        let _ = cell.set(node_key);
        LoopbackHandle {
            address,
            node_key: Arc::new(cell),
        }
    }

    fn address(&self) -> &str {
        &self.address
    }

    async fn node_key(&self) -> ChordResult<RingId> {
        let resolved = self.resolve()?;
        self.node_key.get_or_init(|| async move { resolved.node_key() }).await;
        Ok(*self.node_key.get().expect("just initialized"))
    }

    async fn get_hash_length(&self) -> ChordResult<u32> {
        Ok(self.resolve()?.m())
    }

    async fn find_successor(&self, id: RingId) -> ChordResult<Self> {
        self.resolve()?.find_successor(id).await
    }

    async fn get_predecessor(&self) -> ChordResult<Option<Self>> {
        Ok(self.resolve()?.predecessor().await)
    }

    async fn check_predecessor(&self, candidate: &Self) -> ChordResult<()> {
        self.resolve()?.check_predecessor(candidate.clone()).await
    }

    async fn get(&self, id: RingId) -> ChordResult<Option<Vec<u8>>> {
        self.resolve()?.get(id).await
    }

    async fn put(&self, id: RingId, value: Vec<u8>) -> ChordResult<()> {
        self.resolve()?.put(id, value).await
    }

    async fn delete(&self, id: RingId) -> ChordResult<()> {
        self.resolve()?.delete(id).await
    }

    async fn put_backup(&self, id: RingId, value: Vec<u8>) -> ChordResult<()> {
        self.resolve()?.put_backup_local(id, value).await;
        Ok(())
    }

    async fn remove_backup(&self, id: RingId) -> ChordResult<()> {
        self.resolve()?.remove_backup_local(id).await;
        Ok(())
    }

    async fn adopt_successor_hint(&self, departing_id: RingId, candidate: &Self) -> ChordResult<()> {
        self.resolve()?.adopt_successor_hint(departing_id, candidate.clone()).await
    }

    async fn health(&self) -> ChordResult<()> {
        self.resolve()?.health().await
    }
}
