//! C4: the dependency graph's cycle search and edge-recording rule.
//!
//! Edges live on each [`crate::lock_record::LockRecord`] as its
//! `predecessors` set: `p ∈ R.predecessors` means "p must be acquired
//! before R". Before recording a new edge `h -> L` (h precedes L), the
//! search below asks "is L already required to precede h?" — if so,
//! recording the new edge would close a cycle, and a [`Diagnostic`] is
//! returned instead of mutating the graph.

use crate::key::LockKey;
use crate::registry::Registry;

/// Result of attempting to record that `h` must precede `l`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    /// The edge was recorded (or was already present).
    Recorded,
    /// Recording the edge would close a cycle; the graph is unchanged.
    WouldCycle,
}

/// Depth-first search for a path from `start` to `target` following
/// `predecessors` edges.
///
/// `color` MUST be a value never used by a prior search still in progress;
/// callers pass a freshly-incremented monotonic counter so each record's
/// `traversal_color` scratch field can be compared in O(1) against it
/// without a separate clearing pass over the whole registry.
pub fn has_path(registry: &mut Registry, start: LockKey, target: LockKey, color: u64) -> bool {
    if start == target {
        return true;
    }

    let mut stack = vec![start];
    if let Some(r) = registry.find_mut(start) {
        r.traversal_color = color;
    }

    while let Some(cur) = stack.pop() {
        if cur == target {
            return true;
        }
        let preds: Vec<LockKey> = match registry.find(cur) {
            Some(r) => r.predecessors.iter().copied().collect(),
            None => continue,
        };
        for p in preds {
            let already_visited = registry
                .find(p)
                .is_some_and(|r| r.traversal_color == color);
            if !already_visited {
                if let Some(r) = registry.find_mut(p) {
                    r.traversal_color = color;
                }
                stack.push(p);
            }
        }
    }

    false
}

/// Records that `h` must precede `l`, unless doing so would close a cycle.
///
/// `color` is the freshly-incremented traversal color for this search.
pub fn record_precedes(registry: &mut Registry, l: LockKey, h: LockKey, color: u64) -> EdgeOutcome {
    if has_path(registry, h, l, color) {
        return EdgeOutcome::WouldCycle;
    }
    if let Some(record) = registry.find_mut(l) {
        // `insert` only fails on allocation failure; a dropped edge here is
        // reported as OutOfMemory by the caller, not treated as a cycle.
        let _ = record.predecessors.insert(h);
    }
    EdgeOutcome::Recorded
}
