//! The Chord node state machine (spec.md §4 "Node (actor)").
//!
//! `Node<H>` is generic over [`RemoteNodeHandle`] so the exact same ring
//! logic runs against a real gRPC transport ([`crate::rpc::GrpcHandle`]) or
//! an in-process test double (`crate::loopback::LoopbackHandle`) — the
//! pattern examples/other_examples' `NodeService<C: Client>` uses to keep
//! its core logic transport-agnostic.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};

use crate::config::NodeConfig;
use crate::error::{ChordError, ChordResult};
use crate::finger_table::FingerTable;
use crate::keyhash::{modulus_mask, RingId};
use crate::retry::with_retry;
use crate::ring::in_range;
use crate::rpc::RemoteNodeHandle;
use crate::store::LocalStore;

/// Explicit lifecycle states, replacing the nullable-predecessor /
/// has-left-flag conflation (spec.md §9 Design Notes redesign).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Constructed but never joined a ring; this node is its own successor.
    Solo,
    /// Has joined a ring and is participating normally.
    Joined,
    /// Has left the ring; all further operations fail with `NodeDeparted`.
    Departed,
}

pub struct Node<H: RemoteNodeHandle> {
    m: u32,
    node_key: RingId,
    address: String,
    self_handle: H,
    state: RwLock<NodeState>,
    predecessor: RwLock<Option<H>>,
    fingers: RwLock<FingerTable<H>>,
    store: Mutex<LocalStore>,
    retries: usize,
    fix_interval: Duration,
}

impl<H: RemoteNodeHandle> Node<H> {
    pub fn new(config: NodeConfig) -> ChordResult<Arc<Node<H>>> {
        let mask = modulus_mask(config.m);
        if config.node_key > mask {
            return Err(ChordError::InvalidArgument(format!(
                "node_key {} does not fit in a {}-bit ring",
                config.node_key, config.m
            )));
        }

        let self_handle = H::with_known_key(config.address.clone(), config.node_key);
        let fingers = FingerTable::new(config.m, config.node_key, self_handle.clone());

        Ok(Arc::new(Node {
            m: config.m,
            node_key: config.node_key,
            address: config.address,
            self_handle,
            state: RwLock::new(NodeState::Solo),
            predecessor: RwLock::new(None),
            fingers: RwLock::new(fingers),
            store: Mutex::new(LocalStore::new()),
            retries: config.retries,
            fix_interval: config.fix_interval(),
        }))
    }

    pub fn node_key(&self) -> RingId {
        self.node_key
    }

    pub fn m(&self) -> u32 {
        self.m
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn fix_interval(&self) -> Duration {
        self.fix_interval
    }

    pub async fn state(&self) -> NodeState {
        *self.state.read().await
    }

    async fn ensure_live(&self) -> ChordResult<()> {
        match *self.state.read().await {
            NodeState::Departed => Err(ChordError::NodeDeparted),
            _ => Ok(()),
        }
    }

    fn validate_id(&self, id: RingId) -> ChordResult<()> {
        if id > modulus_mask(self.m) {
            Err(ChordError::InvalidArgument(format!(
                "id {} does not fit in a {}-bit ring",
                id, self.m
            )))
        } else {
            Ok(())
        }
    }

    /// Joins the ring reachable through `bootstrap`. Valid only from
    /// `Solo`; a node that has already joined or left cannot rejoin.
    pub async fn join(&self, bootstrap: H) -> ChordResult<()> {
        {
            let state = self.state.read().await;
            if *state != NodeState::Solo {
                return Err(ChordError::InvalidArgument(
                    "node has already joined or left the ring".into(),
                ));
            }
        }

        let node_key = self.node_key;
        let successor = with_retry(self.retries, self.fix_interval, || bootstrap.find_successor(node_key)).await?;
        let successor_id = successor.node_key().await?;

        {
            let mut fingers = self.fingers.write().await;
            fingers.set(0, successor_id, successor.clone());
        }

        successor.check_predecessor(&self.self_handle).await?;
        *self.state.write().await = NodeState::Joined;
        Ok(())
    }

    /// Hands primary keys to the successor and notifies it of this node's
    /// predecessor before marking this node `Departed`. Idempotent.
    pub async fn leave(&self) -> ChordResult<()> {
        let mut state = self.state.write().await;
        if *state == NodeState::Departed {
            return Ok(());
        }

        let successor = { self.fingers.read().await.handle_at(0).clone() };
        if successor.address() != self.address {
            // Re-point predecessor and successor around this node *before*
            // handing off keys, so that hand-off routes correctly instead
            // of bouncing off stale finger entries that still expect this
            // node to own part of the ring.
            if let Some(predecessor) = self.predecessor.read().await.clone() {
                let _ = successor.check_predecessor(&predecessor).await;
                let _ = predecessor.adopt_successor_hint(self.node_key, &successor).await;
            }

            let keys = { self.store.lock().await.drain_primary() };
            for (id, value) in keys {
                let _ = with_retry(self.retries, self.fix_interval, || successor.put(id, value.clone())).await;
            }
        }

        *state = NodeState::Departed;
        Ok(())
    }

    pub async fn predecessor(&self) -> Option<H> {
        self.predecessor.read().await.clone()
    }

    /// Adopts `candidate` as predecessor if it sits strictly between the
    /// current predecessor (or nothing known yet) and this node — the
    /// usual Chord "notify" step, folded into `checkPredecessor`.
    pub async fn check_predecessor(&self, candidate: H) -> ChordResult<()> {
        self.ensure_live().await?;
        let candidate_id = candidate.node_key().await?;
        if candidate_id == self.node_key {
            return Ok(());
        }

        let mut guard = self.predecessor.write().await;
        let should_adopt = match guard.as_ref() {
            None => true,
            Some(current) => match current.node_key().await {
                Ok(current_id) => in_range(true, current_id, candidate_id, self.node_key, false),
                Err(_) => true,
            },
        };
        if should_adopt {
            *guard = Some(candidate);
        }
        Ok(())
    }

    /// Adopts `candidate` as the successor if this node's current successor
    /// is `departing_id` — the receiving half of a graceful `leave`'s
    /// hand-off, so a predecessor doesn't keep routing into a node that
    /// has gone away.
    pub async fn adopt_successor_hint(&self, departing_id: RingId, candidate: H) -> ChordResult<()> {
        self.ensure_live().await?;
        let mut fingers = self.fingers.write().await;
        if fingers.node_id_at(0) == departing_id {
            let candidate_id = candidate.node_key().await?;
            fingers.set(0, candidate_id, candidate);
        }
        Ok(())
    }

    /// Sets finger[0] back to this node itself — the fallback spec.md §4.4
    /// prescribes for a successor that has crashed (no graceful `leave`, so
    /// nothing ever calls `adopt_successor_hint` for it).
    async fn reset_successor_to_self(&self) {
        let mut fingers = self.fingers.write().await;
        fingers.set(0, self.node_key, self.self_handle.clone());
    }

    async fn find_successor_once(&self, id: RingId) -> ChordResult<H> {
        loop {
            let (successor_id, successor_handle, next_hop) = {
                let fingers = self.fingers.read().await;
                let successor_id = fingers.node_id_at(0);
                let successor_handle = fingers.handle_at(0).clone();
                let next_hop = fingers.closest_preceding_node(id, self.self_handle.clone());
                (successor_id, successor_handle, next_hop)
            };

            // Probe the successor; a dead one is reset to self and the
            // lookup restarts from scratch (spec.md §4.4 findSuccessor
            // step 1).
            if successor_handle.address() != self.address && successor_handle.health().await.is_err() {
                self.reset_successor_to_self().await;
                continue;
            }

            if in_range(false, self.node_key, id, successor_id, true) {
                return Ok(successor_handle);
            }

            if next_hop.address() == self.address {
                return Ok(successor_handle);
            }

            return next_hop.find_successor(id).await;
        }
    }

    pub async fn find_successor(&self, id: RingId) -> ChordResult<H> {
        self.ensure_live().await?;
        with_retry(self.retries, self.fix_interval, || self.find_successor_once(id)).await
    }

    /// Asks the successor for its predecessor, adopts it if it's a better
    /// fit, then notifies the (possibly new) successor of this node and
    /// forwards any keys that have fallen outside this node's range.
    pub async fn stabilize(&self) -> ChordResult<()> {
        self.ensure_live().await?;

        let mut successor = { self.fingers.read().await.handle_at(0).clone() };

        // Probe the successor; a dead one (crash, not a graceful `leave`)
        // is reset to self rather than retried forever (spec.md §4.4
        // stabilize step 1).
        if successor.address() != self.address && successor.health().await.is_err() {
            self.reset_successor_to_self().await;
            successor = self.self_handle.clone();
        }

        // A lone node's successor is itself. If a peer has since notified
        // us that we are its predecessor, close the ring by adopting it as
        // our own successor too, instead of waiting on a finger fix.
        if successor.address() == self.address {
            if let Some(predecessor) = self.predecessor.read().await.clone() {
                if predecessor.address() != self.address {
                    successor = predecessor;
                    let successor_id = successor.node_key().await?;
                    let mut fingers = self.fingers.write().await;
                    fingers.set(0, successor_id, successor.clone());
                }
            }
        }

        if successor.address() == self.address {
            return Ok(());
        }

        let mut new_successor = successor.clone();
        if let Some(candidate) = successor.get_predecessor().await? {
            let candidate_id = candidate.node_key().await?;
            let successor_id = successor.node_key().await?;
            if in_range(true, self.node_key, candidate_id, successor_id, false) {
                new_successor = candidate;
            }
        }

        let new_successor_id = new_successor.node_key().await?;
        {
            let mut fingers = self.fingers.write().await;
            fingers.set(0, new_successor_id, new_successor.clone());
        }

        new_successor.check_predecessor(&self.self_handle).await?;
        self.forward_values_for_backup(&new_successor).await
    }

    /// Picks one random finger (spec.md's `randomFinger`) and re-resolves
    /// it via `find_successor`.
    pub async fn fix_finger(&self) -> ChordResult<()> {
        self.ensure_live().await?;
        let index = { self.fingers.read().await.random_index() };
        let start = { self.fingers.read().await.start(index) };
        let successor = self.find_successor(start).await?;
        let successor_id = successor.node_key().await?;
        let mut fingers = self.fingers.write().await;
        fingers.set(index, successor_id, successor);
        Ok(())
    }

    /// Reconciles local storage against the predecessor P and its own
    /// predecessor PP (spec.md §4.5 "forwardValuesForBackup"), in three
    /// parts:
    ///   - keys in `(P, self]` are still rightfully ours; they're
    ///     re-replicated onto `successor`'s backup every tick, independent
    ///     of any range change (this keeps I2 satisfied across a successor
    ///     change, not just at write time).
    ///   - keys outside `(P, self]` no longer belong to us. A node's
    ///     primary range can only shrink at the low end (a new predecessor
    ///     joining behind it), so these must move *backward* to P, not
    ///     forward to the successor. A key only truly belongs to P if it
    ///     falls in `(PP, P]`; otherwise it belongs to neither of us and is
    ///     simply dropped rather than guessed at.
    pub async fn forward_values_for_backup(&self, successor: &H) -> ChordResult<()> {
        self.ensure_live().await?;

        let predecessor = {
            let mut guard = self.predecessor.write().await;
            match guard.clone() {
                Some(predecessor) => match predecessor.health().await {
                    Ok(()) => Some(predecessor),
                    Err(_) => {
                        *guard = None;
                        None
                    }
                },
                None => None,
            }
        };

        let predecessor_id = match &predecessor {
            Some(predecessor) => predecessor.node_key().await.ok(),
            None => None,
        };
        let grandparent_id = match &predecessor {
            Some(predecessor) if predecessor_id.is_some() => match predecessor.get_predecessor().await {
                Ok(Some(grandparent)) => grandparent.node_key().await.ok(),
                _ => None,
            },
            _ => None,
        };

        let self_key = self.node_key;
        let primaries = { self.store.lock().await.primary_entries() };

        for (id, value) in primaries {
            let owned_by_us = match predecessor_id {
                Some(p) => in_range(false, p, id, self_key, true),
                None => true,
            };

            if owned_by_us {
                successor.put_backup(id, value).await?;
                continue;
            }

            let predecessor = predecessor.as_ref().expect("owned_by_us is false only with a predecessor");
            let owned_by_predecessor = match grandparent_id {
                Some(pp) => in_range(false, pp, id, predecessor_id.expect("checked above"), true),
                None => true,
            };

            if owned_by_predecessor {
                predecessor.put(id, value.clone()).await?;
            }
            self.store.lock().await.delete(id);
        }

        Ok(())
    }

    pub async fn get(&self, id: RingId) -> ChordResult<Option<Vec<u8>>> {
        self.ensure_live().await?;
        self.validate_id(id)?;
        with_retry(self.retries, self.fix_interval, || self.get_once(id)).await
    }

    async fn get_once(&self, id: RingId) -> ChordResult<Option<Vec<u8>>> {
        let owner = self.find_successor(id).await?;
        if owner.address() == self.address {
            Ok(self.store.lock().await.get(id))
        } else {
            owner.get(id).await
        }
    }

    pub async fn put(&self, id: RingId, value: Vec<u8>) -> ChordResult<()> {
        self.ensure_live().await?;
        self.validate_id(id)?;
        with_retry(self.retries, self.fix_interval, || self.put_once(id, value.clone())).await
    }

    async fn put_once(&self, id: RingId, value: Vec<u8>) -> ChordResult<()> {
        let owner = self.find_successor(id).await?;
        if owner.address() == self.address {
            self.store.lock().await.put(id, value.clone());
            let successor = { self.fingers.read().await.handle_at(0).clone() };
            if successor.address() != self.address {
                let _ = successor.put_backup(id, value).await;
            }
            Ok(())
        } else {
            owner.put(id, value).await
        }
    }

    pub async fn delete(&self, id: RingId) -> ChordResult<()> {
        self.ensure_live().await?;
        self.validate_id(id)?;
        with_retry(self.retries, self.fix_interval, || self.delete_once(id)).await
    }

    async fn delete_once(&self, id: RingId) -> ChordResult<()> {
        let owner = self.find_successor(id).await?;
        if owner.address() == self.address {
            self.store.lock().await.delete(id);
            let successor = { self.fingers.read().await.handle_at(0).clone() };
            if successor.address() != self.address {
                let _ = successor.remove_backup(id).await;
            }
            Ok(())
        } else {
            owner.delete(id).await
        }
    }

    pub async fn put_backup_local(&self, id: RingId, value: Vec<u8>) {
        self.store.lock().await.put_backup(id, value);
    }

    pub async fn remove_backup_local(&self, id: RingId) {
        self.store.lock().await.remove_backup(id);
    }

    pub async fn health(&self) -> ChordResult<()> {
        self.ensure_live().await
    }

    /// Count of keys held as primary owner. Exposed for tests and
    /// operational introspection, not used by ring logic itself.
    pub async fn primary_len(&self) -> usize {
        self.store.lock().await.primary_len()
    }

    /// Count of keys held as a backup copy on behalf of the predecessor.
    pub async fn backup_len(&self) -> usize {
        self.store.lock().await.backup_len()
    }

    /// The ring identifier currently cached at finger index `i`. Exposed
    /// for tests and operational introspection, not used by ring logic.
    pub async fn finger_node_id(&self, i: usize) -> RingId {
        self.fingers.read().await.node_id_at(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::{self, LoopbackHandle};

    fn spawn_node(m: u32, node_key: RingId, address: &str) -> Arc<Node<LoopbackHandle>> {
        let config = NodeConfig::new(m, node_key, address);
        let node = Node::new(config).expect("valid node_key");
        loopback::register(address.to_string(), node.clone());
        node
    }

    #[tokio::test]
    async fn lone_node_is_its_own_successor() {
        let node = spawn_node(8, 10, "solo");
        let successor = node.find_successor(200).await.unwrap();
        assert_eq!(successor.address(), "solo");
    }

    #[tokio::test]
    async fn lone_node_rejects_out_of_range_ids() {
        let node = spawn_node(4, 1, "solo-small");
        let err = node.get(999).await.unwrap_err();
        assert!(matches!(err, ChordError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn two_node_ring_stabilizes_and_routes() {
        let a = spawn_node(8, 10, "a");
        let b = spawn_node(8, 200, "b");

        let a_handle = LoopbackHandle::with_known_key("a".to_string(), 10);
        b.join(a_handle.clone()).await.unwrap();

        a.stabilize().await.unwrap();
        b.stabilize().await.unwrap();
        a.stabilize().await.unwrap();

        let owner_of_50 = a.find_successor(50).await.unwrap();
        assert_eq!(owner_of_50.address(), "b");

        let owner_of_250 = a.find_successor(250).await.unwrap();
        assert_eq!(owner_of_250.address(), "a");
    }

    #[tokio::test]
    async fn put_then_get_round_trips_through_routing() {
        let a = spawn_node(8, 10, "put-a");
        let b = spawn_node(8, 200, "put-b");

        let a_handle = LoopbackHandle::with_known_key("put-a".to_string(), 10);
        b.join(a_handle.clone()).await.unwrap();
        a.stabilize().await.unwrap();
        b.stabilize().await.unwrap();
        a.stabilize().await.unwrap();

        a.put(50, b"hello".to_vec()).await.unwrap();
        assert_eq!(b.get(50).await.unwrap(), Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn stabilize_resets_successor_to_self_when_it_crashes() {
        let a = spawn_node(8, 10, "crash-solo-a");
        let b = spawn_node(8, 90, "crash-solo-b");

        let b_handle = LoopbackHandle::with_known_key("crash-solo-b".to_string(), 90);
        a.join(b_handle).await.unwrap();
        assert_eq!(a.finger_node_id(0).await, 90);

        // b crashes without ever calling leave(), so nothing notifies a.
        loopback::unregister("crash-solo-b");

        a.stabilize().await.unwrap();
        assert_eq!(a.finger_node_id(0).await, a.node_key());
    }

    #[tokio::test]
    async fn departed_node_rejects_further_operations() {
        let node = spawn_node(8, 10, "leaving");
        node.leave().await.unwrap();
        let err = node.get(1).await.unwrap_err();
        assert!(matches!(err, ChordError::NodeDeparted));
    }
}
