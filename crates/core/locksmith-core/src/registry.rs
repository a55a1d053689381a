//! C3: the lock registry — an ordered map from [`LockKey`] to
//! [`LockRecord`].
//!
//! Mutation and lookup both require the caller to already hold the registry
//! lock (a raw primitive from the native resolver, obtained via
//! [`crate::collab::RegistryLock`] — never the verifier's own tracked
//! wrapper, so the registry lock is itself never an observed lock).

use std::collections::BTreeMap;

use crate::key::LockKey;
use crate::lock_record::{Kind, LockRecord};

/// Ordered `LockKey -> LockRecord` map. Iteration is total-order, matching
/// the "self-balancing tree" contract of the distilled design (a `BTreeMap`
/// is Rust's idiomatic choice for that contract).
#[derive(Default)]
pub struct Registry {
    records: BTreeMap<LockKey, LockRecord>,
}

impl Registry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { records: BTreeMap::new() }
    }

    /// Looks up `key`, inserting a fresh record if absent.
    ///
    /// Returns the record and whether it was just created.
    pub fn find_or_insert(&mut self, key: LockKey, kind: Kind, recursive: bool) -> (&mut LockRecord, bool) {
        let created = !self.records.contains_key(&key);
        let record = self
            .records
            .entry(key)
            .or_insert_with(|| LockRecord::new(key, kind, recursive));
        (record, created)
    }

    /// Looks up `key` without creating it.
    #[must_use]
    pub fn find(&self, key: LockKey) -> Option<&LockRecord> {
        self.records.get(&key)
    }

    /// Mutable lookup without creating the record.
    pub fn find_mut(&mut self, key: LockKey) -> Option<&mut LockRecord> {
        self.records.get_mut(&key)
    }

    /// Removes `key`'s record.
    ///
    /// Callers MUST only do this once `holders` is empty (enforced by the
    /// interposition protocol's `pre_destroy`, not by this method).
    pub fn remove(&mut self, key: LockKey) -> Option<LockRecord> {
        self.records.remove(&key)
    }

    /// Removes `key` from every other record's `predecessors`.
    ///
    /// Called after a successful destroy so no stale reference to a reused
    /// address lingers in the graph.
    pub fn purge_predecessor(&mut self, key: LockKey) {
        for record in self.records.values_mut() {
            record.predecessors.remove(&key);
        }
    }

    /// Number of registered locks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the registry currently tracks no locks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
