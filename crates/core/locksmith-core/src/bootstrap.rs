//! C8: first-touch initialization, reachable from any thread at any time,
//! including global constructors.
//!
//! The latch is a tiny busy-wait spin on an atomic integer precisely because
//! it must not use any threading primitive: nothing has been resolved yet
//! when the very first hook call reaches here.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::collab::Collaborators;
use crate::frame_filter::FrameFilter;
use crate::verifier::Verifier;

const UNINIT: u8 = 0;
const INITIALIZING: u8 = 1;
const READY: u8 = 2;

static STATE: AtomicU8 = AtomicU8::new(UNINIT);

struct VerifierCell(UnsafeCell<MaybeUninit<Verifier>>);
// SAFETY: access is gated by `STATE`; by the time a reader observes `READY`
// the writer's store has happened-before it (Release/Acquire pair below).
unsafe impl Sync for VerifierCell {}

static CELL: VerifierCell = VerifierCell(UnsafeCell::new(MaybeUninit::uninit()));

/// Runs one-shot bootstrap, or waits for an in-flight one to finish.
///
/// `build` is called at most once per process and MUST NOT fail: a
/// collaborator that cannot be resolved is a bootstrap failure, and per the
/// design this is fatal — `build` should emit what diagnostic it can and
/// call [`std::process::abort`] itself rather than unwind through here.
pub fn bootstrap(build: impl FnOnce() -> (Collaborators, FrameFilter)) -> &'static Verifier {
    match STATE.compare_exchange(UNINIT, INITIALIZING, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => {
            let (collaborators, frame_filter) = build();
            let verifier = Verifier::new(collaborators, frame_filter);
            // SAFETY: we are the only thread that can reach this branch
            // (the compare_exchange above is exclusive), and no reader
            // observes `READY` until the store below.
            unsafe {
                (*CELL.0.get()).write(verifier);
            }
            STATE.store(READY, Ordering::Release);
        }
        Err(_) => {
            while STATE.load(Ordering::Acquire) != READY {
                std::hint::spin_loop();
            }
        }
    }
    // SAFETY: STATE == READY implies the writer's `write` happened-before
    // this load, via the Release/Acquire pair above.
    unsafe { (*CELL.0.get()).assume_init_ref() }
}

/// Returns the verifier if bootstrap has already completed, without
/// triggering it. Hooks use this to early-return a pass-through before
/// bootstrap succeeds.
#[must_use]
pub fn try_get() -> Option<&'static Verifier> {
    if STATE.load(Ordering::Acquire) == READY {
        Some(unsafe { (*CELL.0.get()).assume_init_ref() })
    } else {
        None
    }
}

#[cfg(test)]
static TEST_SERIAL: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Test-only helper: tears down the singleton so each test observes a fresh
/// bootstrap. Returns a guard serializing access to the singleton across
/// tests in this process, since `STATE`/`CELL` are shared globals.
#[cfg(test)]
pub(crate) fn reset_for_test() -> std::sync::MutexGuard<'static, ()> {
    let guard = TEST_SERIAL.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    if STATE.swap(UNINIT, Ordering::AcqRel) == READY {
        // SAFETY: STATE was READY under the serializing guard, so the cell
        // is initialized and no other thread can be reading it.
        unsafe {
            std::ptr::drop_in_place((*CELL.0.get()).as_mut_ptr());
        }
    }
    guard
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{BacktraceProvider, Backtrace, Collaborators, DiagnosticSink, RegistryLock, ThreadNaming};
    use crate::diagnostic::Diagnostic;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    struct NoopLock;
    impl RegistryLock for NoopLock {
        fn lock(&self) {}
        fn unlock(&self) {}
    }
    struct NoopBacktrace;
    impl BacktraceProvider for NoopBacktrace {
        fn capture(&self) -> Backtrace {
            Backtrace::empty()
        }
    }
    struct NoopSink;
    impl DiagnosticSink for NoopSink {
        fn emit(&self, _d: &Diagnostic) {}
    }
    struct NoopNaming;
    impl ThreadNaming for NoopNaming {
        fn default_name_for_current_thread(&self) -> String {
            "t".to_string()
        }
    }

    fn fakes() -> Collaborators {
        Collaborators {
            registry_lock: Box::new(NoopLock),
            backtrace: Box::new(NoopBacktrace),
            sink: Box::new(NoopSink),
            thread_naming: Box::new(NoopNaming),
        }
    }

    #[test]
    fn bootstrap_runs_build_exactly_once_under_contention() {
        let _serial = reset_for_test();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let calls = Arc::clone(&calls);
            handles.push(std::thread::spawn(move || {
                let v = bootstrap(|| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    (fakes(), FrameFilter::empty())
                });
                v as *const Verifier
            }));
        }
        let pointers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(pointers.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn try_get_is_none_before_bootstrap() {
        let _serial = reset_for_test();
        assert!(try_get().is_none());
        bootstrap(|| (fakes(), FrameFilter::empty()));
        assert!(try_get().is_some());
    }
}
