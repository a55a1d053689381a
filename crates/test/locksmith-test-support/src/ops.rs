//! A small vocabulary of lock operations, and a `proptest` strategy that
//! generates random sequences of them over a fixed small set of keys.
//!
//! Used to fuzz the universal properties (§8 of the specification this
//! crate's siblings implement) beyond the literal end-to-end scenarios.

use proptest::prelude::*;

/// One operation a fuzzed thread can perform against a fixed key universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOp {
    /// Attempt to lock key `0..universe`.
    Lock(usize),
    /// Attempt to unlock key `0..universe`.
    Unlock(usize),
}

/// A `proptest` strategy producing a bounded-length sequence of [`LockOp`]
/// over keys `0..universe`.
#[must_use]
pub fn op_sequence(universe: usize, max_len: usize) -> impl Strategy<Value = Vec<LockOp>> {
    prop::collection::vec(
        (0..universe).prop_flat_map(|k| prop_oneof![Just(LockOp::Lock(k)), Just(LockOp::Unlock(k))]),
        0..=max_len,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn generated_sequences_stay_within_universe(ops in op_sequence(4, 16)) {
            for op in ops {
                let k = match op {
                    LockOp::Lock(k) | LockOp::Unlock(k) => k,
                };
                prop_assert!(k < 4);
            }
        }
    }
}
