//! In-memory collaborator implementations for exercising `locksmith-core`
//! without any OS-level threading library underneath.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use locksmith_core::{Backtrace, BacktraceProvider, Collaborators, Diagnostic, DiagnosticSink, Frame, RegistryLock, ThreadNaming};

/// A spin-based [`RegistryLock`] backed by a bare `AtomicBool`, matching the
/// "raw native primitive, never itself observed" contract without any real
/// OS mutex underneath.
#[derive(Default)]
pub struct SpinRegistryLock(AtomicBool);

impl RegistryLock for SpinRegistryLock {
    fn lock(&self) {
        while self
            .0
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            std::hint::spin_loop();
        }
    }

    fn unlock(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A [`BacktraceProvider`] that hands back a fixed, caller-supplied stack.
///
/// Good enough to exercise the frame filter deterministically; real symbol
/// resolution is `locksmith-collab`'s job.
pub struct FixedBacktrace(pub Vec<&'static str>);

impl BacktraceProvider for FixedBacktrace {
    fn capture(&self) -> Backtrace {
        Backtrace { frames: self.0.iter().map(|s| Frame { symbol: (*s).to_string() }).collect() }
    }
}

/// A [`DiagnosticSink`] that records every diagnostic it receives, for
/// assertion by the test.
#[derive(Default)]
pub struct RecordingSink(Mutex<Vec<Diagnostic>>);

impl RecordingSink {
    /// Snapshot of every diagnostic emitted so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    /// Count of emitted diagnostics whose numeric code equals `code`.
    #[must_use]
    pub fn count_code(&self, code: u32) -> usize {
        self.snapshot().iter().filter(|d| d.code() == code).count()
    }
}

impl DiagnosticSink for RecordingSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(diagnostic.clone());
    }
}

/// A [`ThreadNaming`] fake that hands out `"thread_<N>"` from a shared
/// counter, mirroring the platform fallback rule.
#[derive(Default)]
pub struct CountingThreadNaming(AtomicUsize);

impl ThreadNaming for CountingThreadNaming {
    fn default_name_for_current_thread(&self) -> String {
        format!("thread_{}", self.0.fetch_add(1, Ordering::Relaxed))
    }
}

/// Forwards to a shared [`RecordingSink`] so a test can keep its own handle
/// after the [`Collaborators`] bundle has been moved into a `Verifier`.
struct SharedSink(Arc<RecordingSink>);

impl DiagnosticSink for SharedSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        self.0.emit(diagnostic);
    }
}

/// Builds a [`Collaborators`] bundle wired to the fakes above, with an empty
/// fixed backtrace, returning a handle to its sink so the caller can inspect
/// what was emitted.
#[must_use]
pub fn collaborators() -> (Collaborators, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let bundle = Collaborators {
        registry_lock: Box::new(SpinRegistryLock::default()),
        backtrace: Box::new(FixedBacktrace(Vec::new())),
        sink: Box::new(SharedSink(Arc::clone(&sink))),
        thread_naming: Box::new(CountingThreadNaming::default()),
    };
    (bundle, sink)
}
