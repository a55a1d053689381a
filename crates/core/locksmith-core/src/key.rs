//! Opaque lock identity.

use core::fmt;

/// Identity of a user lock, concretely the address of the user's lock object.
///
/// Stable for the lifetime of the lock and totally ordered, so it can serve
/// directly as the key of the registry's ordered map and as an element of a
/// sorted-set of predecessors.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LockKey(usize);

impl LockKey {
    /// Builds a key from a raw address-sized value.
    ///
    /// The shim layer passes the address of the user's `pthread_mutex_t` (or
    /// equivalent); nothing here interprets the value beyond comparing it.
    #[must_use]
    pub const fn from_addr(addr: usize) -> Self {
        Self(addr)
    }

    /// Returns the raw address this key was built from.
    #[must_use]
    pub const fn addr(self) -> usize {
        self.0
    }
}

impl fmt::Debug for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LockKey({:#x})", self.0)
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
