//! Core engine of Locksmith, a runtime lock-discipline verifier for
//! POSIX-style threading primitives.
//!
//! This crate is the hard part named by the project: the global
//! lock-dependency graph (C4), the per-thread held-lock bookkeeping (C2),
//! and the interposition protocol (C6) that drives both and produces
//! diagnostics. It depends on four named-interface collaborators
//! ([`collab::RegistryLock`], [`collab::BacktraceProvider`],
//! [`collab::DiagnosticSink`], [`collab::ThreadNaming`]) but implements
//! none of them: dynamic symbol resolution, stack capture, diagnostic
//! formatting, and platform thread naming all live in `locksmith-collab`,
//! used by the `locksmith-shim` `cdylib` that actually gets `LD_PRELOAD`ed
//! ahead of the host threading library.

#![warn(missing_docs)]

mod bootstrap;
mod collab;
mod diagnostic;
mod error;
mod frame_filter;
mod graph;
mod hooks;
mod key;
mod lock_record;
mod registry;
mod sorted_set;
mod thread_ctx;
mod verifier;

pub use bootstrap::{bootstrap, try_get};
pub use collab::{Backtrace, BacktraceProvider, Collaborators, DiagnosticSink, Frame, RegistryLock, ThreadNaming};
pub use diagnostic::{Diagnostic, DenyReason, HookStatus, NativeResult, Severity};
pub use error::{Error, Result};
pub use frame_filter::FrameFilter;
pub use key::LockKey;
pub use lock_record::Kind;
pub use registry::Registry;
pub use sorted_set::SortedSet;
pub use verifier::Verifier;

/// Sets the calling thread's display name, silently truncating overlong
/// names.
///
/// Exposed directly to user code per the thread-naming API; independent of
/// [`collab::ThreadNaming`], which only supplies a *default* when no name
/// has been set.
pub fn set_thread_name(name: &str) {
    thread_ctx::set_name(name);
}

/// Returns the calling thread's display name, assigning a default from the
/// live verifier's [`collab::ThreadNaming`] collaborator (or a bare
/// `"thread_<id>"` fallback if the verifier has not bootstrapped yet) if
/// none was ever set.
#[must_use]
pub fn get_thread_name() -> String {
    thread_ctx::name_or_init(|| match try_get() {
        Some(v) => v.collaborators().thread_naming.default_name_for_current_thread(),
        None => format!("thread_{:?}", std::thread::current().id()),
    })
}
