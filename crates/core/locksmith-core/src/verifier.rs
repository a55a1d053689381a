//! The verifier's process-wide state: registry, traversal-color counter,
//! frame filter, and collaborators.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::collab::Collaborators;
use crate::frame_filter::FrameFilter;
use crate::registry::Registry;
use crate::thread_ctx::NonIntercepting;

/// Process-wide verifier state, constructed once by [`crate::bootstrap`].
pub struct Verifier {
    registry: UnsafeCell<Registry>,
    traversal_color: AtomicU64,
    frame_filter: FrameFilter,
    collaborators: Collaborators,
}

// SAFETY: `registry` is only ever touched through `with_registry`, which
// takes the raw registry lock (itself `Sync`) around every access.
unsafe impl Sync for Verifier {}
unsafe impl Send for Verifier {}

impl Verifier {
    /// Assembles a verifier from its collaborators and a resolved filter.
    #[must_use]
    pub fn new(collaborators: Collaborators, frame_filter: FrameFilter) -> Self {
        Self {
            registry: UnsafeCell::new(Registry::new()),
            traversal_color: AtomicU64::new(0),
            frame_filter,
            collaborators,
        }
    }

    /// Runs `f` with exclusive access to the registry, taking the raw
    /// registry lock around it.
    ///
    /// The calling thread's `intercepting` flag is cleared for the duration,
    /// per the re-entrancy rule: locking the registry is one of the
    /// operations that must not be observed by the verifier's own hooks.
    pub fn with_registry<R>(&self, f: impl FnOnce(&mut Registry) -> R) -> R {
        let _guard = NonIntercepting::enter();
        self.collaborators.registry_lock.lock();
        // SAFETY: the registry lock provides exclusive access; no other
        // caller can be inside this closure concurrently.
        let result = unsafe { f(&mut *self.registry.get()) };
        self.collaborators.registry_lock.unlock();
        result
    }

    /// Allocates the next traversal color for a fresh cycle search.
    ///
    /// MUST be called while the registry lock is held, so each search runs
    /// without interference from a concurrent one.
    pub fn next_traversal_color(&self) -> u64 {
        self.traversal_color.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The resolved frame filter.
    #[must_use]
    pub fn frame_filter(&self) -> &FrameFilter {
        &self.frame_filter
    }

    /// The injected collaborators.
    #[must_use]
    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }
}
