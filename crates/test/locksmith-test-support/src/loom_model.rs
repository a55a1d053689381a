//! `loom` model of the one-shot bootstrap latch pattern used by
//! `locksmith-core`'s C8.
//!
//! `locksmith-core` itself cannot depend on `loom` in its own non-test
//! build (the latch must compile against plain `std::sync::atomic` in
//! production), so this model re-implements the same compare-exchange race
//! against `loom`'s primitives and exhaustively explores thread
//! interleavings, rather than linking the real module under `cfg(loom)`.

#![cfg(all(test, loom))]

use loom::sync::atomic::{AtomicU8, Ordering};
use loom::sync::Arc;
use loom::thread;

const UNINIT: u8 = 0;
const INITIALIZING: u8 = 1;
const READY: u8 = 2;

#[test]
fn bootstrap_latch_runs_build_exactly_once() {
    loom::model(|| {
        let state = Arc::new(AtomicU8::new(UNINIT));
        let build_calls = Arc::new(loom::sync::atomic::AtomicUsize::new(0));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let state = Arc::clone(&state);
                let build_calls = Arc::clone(&build_calls);
                thread::spawn(move || {
                    if state
                        .compare_exchange(UNINIT, INITIALIZING, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        build_calls.fetch_add(1, Ordering::SeqCst);
                        state.store(READY, Ordering::Release);
                    } else {
                        while state.load(Ordering::Acquire) != READY {
                            loom::hint::spin_loop();
                        }
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(build_calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.load(Ordering::Acquire), READY);
    });
}
