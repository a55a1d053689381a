//! C2: per-thread context — name, held-lock stack, spin depth, and the
//! reentrancy gate.

use std::cell::{Cell, RefCell};

use crate::key::LockKey;

/// Names are truncated silently past this many bytes.
const MAX_NAME_LEN: usize = 63;

struct ThreadCtx {
    name: RefCell<Option<String>>,
    held: RefCell<Vec<LockKey>>,
    spins_held: Cell<u32>,
    intercepting: Cell<bool>,
}

impl ThreadCtx {
    fn new() -> Self {
        Self {
            name: RefCell::new(None),
            held: RefCell::new(Vec::new()),
            spins_held: Cell::new(0),
            intercepting: Cell::new(true),
        }
    }
}

thread_local! {
    static CTX: ThreadCtx = ThreadCtx::new();
}

/// Sets the calling thread's display name, silently truncating to
/// [`MAX_NAME_LEN`] bytes.
pub fn set_name(name: &str) {
    let truncated = if name.len() > MAX_NAME_LEN {
        // Truncate on a char boundary so we never split a multi-byte scalar.
        let mut end = MAX_NAME_LEN;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        &name[..end]
    } else {
        name
    };
    CTX.with(|c| *c.name.borrow_mut() = Some(truncated.to_string()));
}

/// Returns the calling thread's display name, assigning `default()` and
/// remembering it if none has been set yet.
pub fn name_or_init(default: impl FnOnce() -> String) -> String {
    CTX.with(|c| {
        let mut slot = c.name.borrow_mut();
        if let Some(existing) = slot.as_ref() {
            return existing.clone();
        }
        let fresh = default();
        *slot = Some(fresh.clone());
        fresh
    })
}

/// Pushes `key` onto the held-lock stack. Duplicates are legal (recursive
/// re-entry).
pub fn push_held(key: LockKey) {
    CTX.with(|c| c.held.borrow_mut().push(key));
}

/// Removes the last occurrence of `key` from the held-lock stack.
///
/// Returns `true` if an occurrence was found and removed, `false` if the
/// thread does not currently hold `key`.
pub fn pop_held(key: LockKey) -> bool {
    CTX.with(|c| {
        let mut held = c.held.borrow_mut();
        if let Some(pos) = held.iter().rposition(|&k| k == key) {
            held.remove(pos);
            true
        } else {
            false
        }
    })
}

/// Linear scan for membership in the held-lock stack.
#[must_use]
pub fn contains_held(key: LockKey) -> bool {
    CTX.with(|c| c.held.borrow().contains(&key))
}

/// A snapshot of the currently-held keys, in acquisition order.
///
/// Used by the dependency graph to process predecessor candidates in the
/// order they were taken, per the tie-breaking rule.
#[must_use]
pub fn held_snapshot() -> Vec<LockKey> {
    CTX.with(|c| c.held.borrow().clone())
}

/// Number of currently-held spin locks on this thread.
#[must_use]
pub fn spins_held() -> u32 {
    CTX.with(|c| c.spins_held.get())
}

/// Increments the spin-lock depth counter.
pub fn inc_spins_held() {
    CTX.with(|c| c.spins_held.set(c.spins_held.get().saturating_add(1)));
}

/// Decrements the spin-lock depth counter.
pub fn dec_spins_held() {
    CTX.with(|c| c.spins_held.set(c.spins_held.get().saturating_sub(1)));
}

/// Whether the calling thread is currently eligible to have its primitive
/// calls observed.
#[must_use]
pub fn is_intercepting() -> bool {
    CTX.with(|c| c.intercepting.get())
}

/// RAII guard that clears the intercepting flag for its lifetime, restoring
/// the previous value on drop.
///
/// Held around any call back into an observed primitive, the sink, the
/// backtrace provider, or the registry lock, so that a nested re-entry into
/// the verifier's own hooks becomes a no-op pass-through.
pub struct NonIntercepting {
    previous: bool,
}

impl NonIntercepting {
    /// Clears the flag, remembering the previous value.
    #[must_use]
    pub fn enter() -> Self {
        let previous = CTX.with(|c| c.intercepting.replace(false));
        Self { previous }
    }
}

impl Drop for NonIntercepting {
    fn drop(&mut self) {
        CTX.with(|c| c.intercepting.set(self.previous));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reset() {
        CTX.with(|c| {
            *c.name.borrow_mut() = None;
            c.held.borrow_mut().clear();
            c.spins_held.set(0);
            c.intercepting.set(true);
        });
    }

    #[test]
    fn name_defaults_once_then_sticks() {
        reset();
        let first = name_or_init(|| "thread_1".to_string());
        let second = name_or_init(|| "thread_2".to_string());
        assert_eq!(first, "thread_1");
        assert_eq!(second, "thread_1");
    }

    #[test]
    fn explicit_set_overrides_default() {
        reset();
        set_name("worker");
        let got = name_or_init(|| "fallback".to_string());
        assert_eq!(got, "worker");
    }

    #[test]
    fn long_names_are_truncated_on_char_boundary() {
        reset();
        let long = "x".repeat(200);
        set_name(&long);
        let got = name_or_init(String::new);
        assert!(got.len() <= MAX_NAME_LEN);
    }

    #[test]
    fn held_stack_push_pop_is_lifo_for_duplicates() {
        reset();
        let k = LockKey::from_addr(1);
        push_held(k);
        push_held(k);
        assert!(pop_held(k));
        assert!(contains_held(k));
        assert!(pop_held(k));
        assert!(!contains_held(k));
    }

    #[test]
    fn pop_absent_key_fails() {
        reset();
        assert!(!pop_held(LockKey::from_addr(42)));
    }

    #[test]
    fn non_intercepting_guard_restores_previous_value() {
        reset();
        assert!(is_intercepting());
        {
            let _g = NonIntercepting::enter();
            assert!(!is_intercepting());
        }
        assert!(is_intercepting());
    }

    #[test]
    fn nested_non_intercepting_guards_restore_correctly() {
        reset();
        {
            let _outer = NonIntercepting::enter();
            {
                let _inner = NonIntercepting::enter();
                assert!(!is_intercepting());
            }
            assert!(!is_intercepting());
        }
        assert!(is_intercepting());
    }
}
