//! Local key-value storage (spec.md §4.3 "Replication via successor").
//!
//! A node keeps two disjoint maps: `primary` for keys it owns outright, and
//! `backup` for the copy it holds on behalf of its predecessor. The two are
//! never merged while a node is alive; `backup` only becomes `primary` when
//! this node actually takes over the predecessor's range (spec.md's
//! "absorb" case), which `Node::leave`/stabilization handle explicitly.

use std::collections::HashMap;

use crate::keyhash::RingId;

#[derive(Debug, Default)]
pub struct LocalStore {
    primary: HashMap<RingId, Vec<u8>>,
    backup: HashMap<RingId, Vec<u8>>,
}

impl LocalStore {
    pub fn new() -> Self {
        LocalStore::default()
    }

    pub fn get(&self, id: RingId) -> Option<Vec<u8>> {
        self.primary.get(&id).cloned()
    }

    pub fn put(&mut self, id: RingId, value: Vec<u8>) {
        self.primary.insert(id, value);
    }

    pub fn delete(&mut self, id: RingId) {
        self.primary.remove(&id);
    }

    pub fn put_backup(&mut self, id: RingId, value: Vec<u8>) {
        self.backup.insert(id, value);
    }

    pub fn remove_backup(&mut self, id: RingId) {
        self.backup.remove(&id);
    }

    /// Full snapshot of everything currently held as primary, for the
    /// maintainer to reconcile against the predecessor/grandparent range
    /// each tick without holding the store lock while it does so.
    pub fn primary_entries(&self) -> Vec<(RingId, Vec<u8>)> {
        self.primary.iter().map(|(id, value)| (*id, value.clone())).collect()
    }

    /// Drains every key this node currently holds as primary, handing
    /// ownership to the caller (used when leaving the ring).
    pub fn drain_primary(&mut self) -> Vec<(RingId, Vec<u8>)> {
        self.primary.drain().collect()
    }

    /// Promotes everything held as backup to primary (used when this node
    /// becomes the sole survivor responsible for a predecessor's range).
    pub fn absorb_backup(&mut self) {
        for (id, value) in self.backup.drain() {
            self.primary.insert(id, value);
        }
    }

    pub fn primary_len(&self) -> usize {
        self.primary.len()
    }

    pub fn backup_len(&self) -> usize {
        self.backup.len()
    }
}
