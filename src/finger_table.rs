//! FingerTable: the O(log N) routing table (spec.md §4.2).
//!
//! Each of the `m` entries tracks `start(i) = (selfId + 2^i) mod 2^m` and
//! the best known successor of that start; entries are lazily patched by
//! the periodic `fix_finger` maintainer, not recomputed all at once.

use rand::Rng;

use crate::keyhash::{wrapping_add, RingId};
use crate::ring::in_range;
use crate::rpc::RemoteNodeHandle;

#[derive(Clone)]
struct FingerEntry<H> {
    /// Ring identifier of the handle below, kept alongside it so routing
    /// decisions (`closest_preceding_node`) don't need an RPC just to
    /// compare positions.
    node_id: RingId,
    handle: H,
}

pub struct FingerTable<H> {
    m: u32,
    self_id: RingId,
    entries: Vec<FingerEntry<H>>,
}

impl<H: RemoteNodeHandle + Clone> FingerTable<H> {
    /// A freshly created table with every entry pointing at `self_handle`,
    /// the correct state for a lone node or one that has just joined and
    /// not yet run its first `fix_finger` pass.
    pub fn new(m: u32, self_id: RingId, self_handle: H) -> Self {
        let entries = (0..m)
            .map(|_| FingerEntry {
                node_id: self_id,
                handle: self_handle.clone(),
            })
            .collect();
        FingerTable { m, self_id, entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `start(i) = (selfId + 2^i) mod 2^m`, `i` zero-indexed over `0..m`.
    pub fn start(&self, i: usize) -> RingId {
        wrapping_add(self.self_id, 1u64 << i, self.m)
    }

    pub fn node_id_at(&self, i: usize) -> RingId {
        self.entries[i].node_id
    }

    pub fn handle_at(&self, i: usize) -> &H {
        &self.entries[i].handle
    }

    pub fn set(&mut self, i: usize, node_id: RingId, handle: H) {
        self.entries[i] = FingerEntry { node_id, handle };
    }

    /// Uniformly picks one finger index to repair next (spec.md's
    /// `randomFinger`), rather than sweeping round-robin.
    pub fn random_index(&self) -> usize {
        rand::thread_rng().gen_range(0..self.m as usize)
    }

    /// The furthest finger strictly between `self_id` and `id` (exclusive
    /// of `id`), or `fallback` if none qualifies — the routing step used by
    /// `find_successor` to jump as far as possible each hop.
    pub fn closest_preceding_node(&self, id: RingId, fallback: H) -> H {
        for entry in self.entries.iter().rev() {
            if in_range(true, self.self_id, entry.node_id, id, false) {
                return entry.handle.clone();
            }
        }
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::LoopbackHandle;
    use crate::rpc::RemoteNodeHandle;

    fn handle(address: &str) -> LoopbackHandle {
        LoopbackHandle::from_address(address.to_string())
    }

    #[test]
    fn fresh_table_points_everywhere_at_self() {
        let table: FingerTable<LoopbackHandle> = FingerTable::new(4, 3, handle("self"));
        for i in 0..4 {
            assert_eq!(table.node_id_at(i), 3);
        }
    }

    #[test]
    fn start_wraps_around_the_ring() {
        let table: FingerTable<LoopbackHandle> = FingerTable::new(4, 15, handle("self"));
        assert_eq!(table.start(0), 0);
        assert_eq!(table.start(1), 1);
    }

    #[test]
    fn random_index_stays_in_bounds() {
        let table: FingerTable<LoopbackHandle> = FingerTable::new(6, 1, handle("self"));
        for _ in 0..50 {
            assert!(table.random_index() < 6);
        }
    }

    #[test]
    fn closest_preceding_node_picks_furthest_qualifying_entry() {
        let mut table: FingerTable<LoopbackHandle> = FingerTable::new(3, 0, handle("self"));
        table.set(0, 1, handle("n1"));
        table.set(1, 3, handle("n3"));
        table.set(2, 6, handle("n6"));
        let chosen = table.closest_preceding_node(7, handle("self"));
        assert_eq!(chosen.address(), "n6");
    }
}
