//! C6: the interposition protocol — the `pre_*`/`post_*` hook pairs that
//! drive C2–C5 and produce diagnostics.
//!
//! Every hook early-returns [`HookStatus::Proceed`] as a pure pass-through
//! when the calling thread's `intercepting` flag is clear. Bootstrapping
//! (C8) is the caller's responsibility: the shim layer calls
//! [`crate::bootstrap::bootstrap`] to get a live [`Verifier`] before it ever
//! reaches these methods, satisfying "C8 is entered lazily from C6 on the
//! very first call".

use crate::diagnostic::{Diagnostic, HookStatus, DenyReason, NativeResult, Severity};
use crate::graph::{self, EdgeOutcome};
use crate::key::LockKey;
use crate::lock_record::Kind;
use crate::thread_ctx::{self, NonIntercepting};
use crate::verifier::Verifier;

impl Verifier {
    /// Delivers `diagnostic` to the sink and to the internal tracing layer.
    ///
    /// MUST be called without holding the registry lock: the sink is
    /// invoked with `intercepting` cleared and no verifier lock held, per
    /// the "sink invoked without holding any verifier lock" resource
    /// policy.
    fn emit(&self, diagnostic: Diagnostic) {
        match diagnostic.severity() {
            Severity::Warning => tracing::warn!(code = diagnostic.code(), "{diagnostic}"),
            Severity::Error => tracing::error!(code = diagnostic.code(), "{diagnostic}"),
        }
        let _guard = NonIntercepting::enter();
        self.collaborators().sink.emit(&diagnostic);
    }

    /// `pre_init(key, is_sleeper, is_recursive) -> status`.
    pub fn pre_init(&self, key: LockKey, is_sleeper: bool, is_recursive: bool) -> HookStatus {
        if !thread_ctx::is_intercepting() {
            return HookStatus::Proceed;
        }
        let kind = if is_sleeper { Kind::Sleeper } else { Kind::Spin };
        self.with_registry(|reg| {
            // A second `pre_init` on the same key is a no-op success: the
            // first registration wins (testable property 8).
            reg.find_or_insert(key, kind, is_recursive);
        });
        HookStatus::Proceed
    }

    /// `post_init(key, native_result)`. No state change is specified.
    pub fn post_init(&self, key: LockKey, native_result: NativeResult) {
        if !thread_ctx::is_intercepting() {
            return;
        }
        if native_result != 0 {
            tracing::debug!(%key, native_result, "native init failed; record stays registered");
        }
    }

    /// `pre_destroy(key) -> status`.
    pub fn pre_destroy(&self, key: LockKey) -> HookStatus {
        if !thread_ctx::is_intercepting() {
            return HookStatus::Proceed;
        }
        let in_use = self.with_registry(|reg| match reg.find(key) {
            Some(record) if !record.holders.is_empty() => true,
            Some(_) => {
                reg.remove(key);
                reg.purge_predecessor(key);
                false
            }
            None => false,
        });
        if in_use {
            self.emit(Diagnostic::DestroyInUse { key });
            HookStatus::Deny(DenyReason::Busy)
        } else {
            HookStatus::Proceed
        }
    }

    /// `pre_lock(key, is_sleeper) -> status`.
    ///
    /// Ensures `key` is registered (lazily, with `recursive=true`, if this
    /// is the first touch of a statically-initialized lock), checks for
    /// self-deadlock and inversion against every currently-held lock, and
    /// appends a holder entry — undone by [`Verifier::post_lock`] if the
    /// native call goes on to fail.
    pub fn pre_lock(&self, key: LockKey, is_sleeper: bool) -> HookStatus {
        if !thread_ctx::is_intercepting() {
            return HookStatus::Proceed;
        }

        let kind = if is_sleeper { Kind::Sleeper } else { Kind::Spin };
        let backtrace = {
            let _guard = NonIntercepting::enter();
            self.collaborators().backtrace.capture()
        };
        let skip_graph_update = self.frame_filter().matches(&backtrace);
        let held = thread_ctx::held_snapshot();
        let thread_name = thread_ctx::name_or_init(|| {
            self.collaborators().thread_naming.default_name_for_current_thread()
        });

        let mut inversions = Vec::new();
        let mut self_deadlock = false;

        self.with_registry(|reg| {
            let (_, _created) = reg.find_or_insert(key, kind, true);
            let recursive = reg.find(key).map(|r| r.recursive).unwrap_or(true);

            for h in held {
                if h == key {
                    if !recursive {
                        self_deadlock = true;
                    }
                    continue;
                }
                if skip_graph_update {
                    continue;
                }
                let color = self.next_traversal_color();
                if graph::record_precedes(reg, key, h, color) == EdgeOutcome::WouldCycle {
                    inversions.push(h);
                }
            }

            if let Some(record) = reg.find_mut(key) {
                record.push_holder(thread_name.clone(), backtrace.clone());
            }
        });

        if self_deadlock {
            self.emit(Diagnostic::SelfDeadlock { key });
        }
        for held_key in inversions {
            self.emit(Diagnostic::LockInversion { acquiring: key, held: held_key });
        }

        HookStatus::Proceed
    }

    /// `post_lock(key, native_result)`.
    pub fn post_lock(&self, key: LockKey, native_result: NativeResult) {
        if !thread_ctx::is_intercepting() {
            return;
        }

        if native_result == 0 {
            thread_ctx::push_held(key);
            let (kind, should_warn) = self.with_registry(|reg| {
                let Some(record) = reg.find_mut(key) else {
                    return (None, false);
                };
                let kind = record.kind;
                if kind == Kind::Spin {
                    return (Some(kind), false);
                }
                let warn = thread_ctx::spins_held() > 0 && !record.spin_warned;
                if warn {
                    record.spin_warned = true;
                }
                (Some(kind), warn)
            });
            match kind {
                Some(Kind::Spin) => thread_ctx::inc_spins_held(),
                Some(Kind::Sleeper) if should_warn => {
                    self.emit(Diagnostic::SpinHoldingSleeper { key });
                }
                _ => {}
            }
        } else {
            let thread_name = thread_ctx::name_or_init(|| {
                self.collaborators().thread_naming.default_name_for_current_thread()
            });
            self.with_registry(|reg| {
                if let Some(record) = reg.find_mut(key) {
                    record.pop_holder(&thread_name);
                }
            });
        }
    }

    /// `pre_unlock(key) -> status`.
    pub fn pre_unlock(&self, key: LockKey) -> HookStatus {
        if !thread_ctx::is_intercepting() {
            return HookStatus::Proceed;
        }
        if thread_ctx::contains_held(key) {
            HookStatus::Proceed
        } else {
            self.emit(Diagnostic::NotHeld { key });
            HookStatus::Deny(DenyReason::PermissionViolation)
        }
    }

    /// `post_unlock(key)`.
    pub fn post_unlock(&self, key: LockKey) {
        if !thread_ctx::is_intercepting() {
            return;
        }
        if !thread_ctx::pop_held(key) {
            // pre_unlock already guarded against this; reaching it here
            // means the two hooks disagree about the held stack.
            self.emit(Diagnostic::Internal { context: "post_unlock: key not in held stack" });
            return;
        }
        let thread_name = thread_ctx::name_or_init(|| {
            self.collaborators().thread_naming.default_name_for_current_thread()
        });
        let was_spin = self.with_registry(|reg| {
            let Some(record) = reg.find_mut(key) else {
                return false;
            };
            record.pop_holder(&thread_name);
            record.kind == Kind::Spin
        });
        if was_spin {
            thread_ctx::dec_spins_held();
        }
    }

    /// `pre_cond_wait(key) -> status`, where `key` is the mutex the
    /// condition variable is waited on, not the condition variable itself.
    ///
    /// `cond_wait`'s internal release/reacquire of the mutex is invisible to
    /// the verifier: the lock remains logically held from the user's
    /// viewpoint, so there is no matching post-hook state change.
    pub fn pre_cond_wait(&self, key: LockKey) -> HookStatus {
        if !thread_ctx::is_intercepting() {
            return HookStatus::Proceed;
        }
        if thread_ctx::contains_held(key) {
            HookStatus::Proceed
        } else {
            self.emit(Diagnostic::CondWaitUnheld { key });
            HookStatus::Deny(DenyReason::PermissionViolation)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{Backtrace, BacktraceProvider, Collaborators, DiagnosticSink, Frame, RegistryLock, ThreadNaming};
    use crate::frame_filter::FrameFilter;
    use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
    use std::sync::{Arc, Mutex};

    struct RawLock(AtomicBool);
    impl RegistryLock for RawLock {
        fn lock(&self) {
            while self
                .0
                .compare_exchange_weak(false, true, AtomicOrdering::Acquire, AtomicOrdering::Relaxed)
                .is_err()
            {
                std::hint::spin_loop();
            }
        }
        fn unlock(&self) {
            self.0.store(false, AtomicOrdering::Release);
        }
    }

    struct FixedBacktrace(Vec<&'static str>);
    impl BacktraceProvider for FixedBacktrace {
        fn capture(&self) -> Backtrace {
            Backtrace { frames: self.0.iter().map(|s| Frame { symbol: (*s).to_string() }).collect() }
        }
    }

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<Diagnostic>>);
    impl DiagnosticSink for RecordingSink {
        fn emit(&self, d: &Diagnostic) {
            self.0.lock().unwrap().push(d.clone());
        }
    }

    struct FixedName(&'static str);
    impl ThreadNaming for FixedName {
        fn default_name_for_current_thread(&self) -> String {
            self.0.to_string()
        }
    }

    fn verifier_with(frames: Vec<&'static str>, name: &'static str, sink: Arc<RecordingSink>) -> Verifier {
        Verifier::new(
            Collaborators {
                registry_lock: Box::new(RawLock(AtomicBool::new(false))),
                backtrace: Box::new(FixedBacktrace(frames)),
                sink: Box::new(ArcSink(sink)),
                thread_naming: Box::new(FixedName(name)),
            },
            FrameFilter::empty(),
        )
    }

    struct ArcSink(Arc<RecordingSink>);
    impl DiagnosticSink for ArcSink {
        fn emit(&self, d: &Diagnostic) {
            self.0.emit(d);
        }
    }

    fn key(n: usize) -> LockKey {
        LockKey::from_addr(n)
    }

    #[test]
    fn lock_then_unlock_round_trips_cleanly() {
        let sink = Arc::new(RecordingSink::default());
        let v = verifier_with(vec![], "t1", Arc::clone(&sink));
        assert_eq!(v.pre_lock(key(1), true), HookStatus::Proceed);
        v.post_lock(key(1), 0);
        assert!(thread_ctx_contains(&v, key(1)));
        assert_eq!(v.pre_unlock(key(1)), HookStatus::Proceed);
        v.post_unlock(key(1));
        assert!(sink.0.lock().unwrap().is_empty());
    }

    fn thread_ctx_contains(_v: &Verifier, key: LockKey) -> bool {
        thread_ctx::contains_held(key)
    }

    #[test]
    fn self_deadlock_on_non_recursive_relock() {
        let sink = Arc::new(RecordingSink::default());
        let v = verifier_with(vec![], "t1", Arc::clone(&sink));
        v.pre_init(key(1), true, false);
        v.pre_lock(key(1), true);
        v.post_lock(key(1), 0);
        v.pre_lock(key(1), true);
        v.post_lock(key(1), 0);
        let emitted = sink.0.lock().unwrap();
        assert!(emitted.iter().any(|d| matches!(d, Diagnostic::SelfDeadlock { .. })));
        thread_ctx::pop_held(key(1));
        thread_ctx::pop_held(key(1));
    }

    #[test]
    fn recursive_relock_emits_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let v = verifier_with(vec![], "t1", Arc::clone(&sink));
        v.pre_init(key(1), true, true);
        v.pre_lock(key(1), true);
        v.post_lock(key(1), 0);
        v.pre_lock(key(1), true);
        v.post_lock(key(1), 0);
        assert!(sink.0.lock().unwrap().is_empty());
        v.pre_unlock(key(1));
        v.post_unlock(key(1));
        v.pre_unlock(key(1));
        v.post_unlock(key(1));
    }

    #[test]
    fn unlock_not_held_is_denied() {
        let sink = Arc::new(RecordingSink::default());
        let v = verifier_with(vec![], "t1", Arc::clone(&sink));
        assert_eq!(v.pre_unlock(key(99)), HookStatus::Deny(DenyReason::PermissionViolation));
        assert!(matches!(sink.0.lock().unwrap()[0], Diagnostic::NotHeld { .. }));
    }

    #[test]
    fn destroy_while_held_is_denied_then_succeeds_after_release() {
        let sink = Arc::new(RecordingSink::default());
        let v = verifier_with(vec![], "t1", Arc::clone(&sink));
        v.pre_init(key(1), true, true);
        v.pre_lock(key(1), true);
        v.post_lock(key(1), 0);

        assert_eq!(v.pre_destroy(key(1)), HookStatus::Deny(DenyReason::Busy));
        assert!(matches!(sink.0.lock().unwrap()[0], Diagnostic::DestroyInUse { .. }));

        v.pre_unlock(key(1));
        v.post_unlock(key(1));

        assert_eq!(v.pre_destroy(key(1)), HookStatus::Proceed);
    }

    #[test]
    fn cond_wait_unheld_is_denied() {
        let sink = Arc::new(RecordingSink::default());
        let v = verifier_with(vec![], "t1", Arc::clone(&sink));
        assert_eq!(v.pre_cond_wait(key(1)), HookStatus::Deny(DenyReason::PermissionViolation));
        assert!(matches!(sink.0.lock().unwrap()[0], Diagnostic::CondWaitUnheld { .. }));
    }

    #[test]
    fn spin_then_sleeper_warns_exactly_once() {
        let sink = Arc::new(RecordingSink::default());
        let v = verifier_with(vec![], "t1", Arc::clone(&sink));
        v.pre_init(key(1), false, true); // spin
        v.pre_init(key(2), true, true); // sleeper

        for _ in 0..2 {
            v.pre_lock(key(1), false);
            v.post_lock(key(1), 0);
            v.pre_lock(key(2), true);
            v.post_lock(key(2), 0);
            v.pre_unlock(key(2));
            v.post_unlock(key(2));
            v.pre_unlock(key(1));
            v.post_unlock(key(1));
        }

        let warnings: Vec<_> = sink
            .0
            .lock()
            .unwrap()
            .iter()
            .filter(|d| matches!(d, Diagnostic::SpinHoldingSleeper { .. }))
            .count();
        assert_eq!(warnings, 1);
    }

    #[test]
    fn failed_native_call_pops_the_speculative_holder() {
        let sink = Arc::new(RecordingSink::default());
        let v = verifier_with(vec![], "t1", Arc::clone(&sink));
        v.pre_lock(key(1), true);
        v.post_lock(key(1), libc_like_eagain());
        // Holder was popped, so unlock now is NotHeld.
        assert_eq!(v.pre_unlock(key(1)), HookStatus::Deny(DenyReason::PermissionViolation));
    }

    fn libc_like_eagain() -> NativeResult {
        11
    }

    #[test]
    fn ignored_frame_suppresses_inversion_but_not_holder_tracking() {
        let sink = Arc::new(RecordingSink::default());
        let v = Verifier::new(
            Collaborators {
                registry_lock: Box::new(RawLock(AtomicBool::new(false))),
                backtrace: Box::new(FixedBacktrace(vec!["ignore1"])),
                sink: Box::new(ArcSink(Arc::clone(&sink))),
                thread_naming: Box::new(FixedName("t1")),
            },
            FrameFilter::from_colon_lists("ignore1", ""),
        );

        v.pre_lock(key(1), true);
        v.post_lock(key(1), 0);
        v.pre_lock(key(2), true);
        v.post_lock(key(2), 0);
        v.pre_unlock(key(2));
        v.post_unlock(key(2));
        v.pre_unlock(key(1));
        v.post_unlock(key(1));

        v.pre_lock(key(2), true);
        v.post_lock(key(2), 0);
        v.pre_lock(key(1), true);
        v.post_lock(key(1), 0);

        assert!(sink.0.lock().unwrap().iter().all(|d| !matches!(d, Diagnostic::LockInversion { .. })));

        v.pre_unlock(key(1));
        v.post_unlock(key(1));
        v.pre_unlock(key(2));
        v.post_unlock(key(2));
    }
}
