//! Default collaborator implementations for `locksmith-core`: the things
//! that actually talk to the operating system.
//!
//! `locksmith-core` depends only on the named traits ([`locksmith_core::RegistryLock`],
//! [`locksmith_core::BacktraceProvider`], [`locksmith_core::DiagnosticSink`],
//! [`locksmith_core::ThreadNaming`]) and never on `libc` or `backtrace`
//! directly. This crate is where those traits get real bodies, and where
//! the `LKSMITH_*` environment variables are read.

#![warn(missing_docs)]

pub mod backtrace;
pub mod config;
pub mod native;
pub mod sink;
pub mod thread_naming;

use locksmith_core::Collaborators;

pub use config::Config;
pub use native::{NativeSymbols, RawPthreadLock, SymbolResolutionError};
pub use sink::SinkParseError;

/// Builds the full [`Collaborators`] bundle a production shim should use,
/// reading sink configuration from the process environment.
///
/// # Safety
///
/// If `LKSMITH_LOG` names a `callback://` target, the same obligations as
/// [`sink::CallbackSink::new`] apply.
#[must_use]
pub unsafe fn default_collaborators(config: &Config) -> Collaborators {
    Collaborators {
        registry_lock: Box::new(native::RawPthreadLock::new()),
        backtrace: Box::new(backtrace::StackBacktraceProvider::new()),
        // SAFETY: forwarded to the caller of this function.
        sink: unsafe { config.build_sink() },
        thread_naming: Box::new(thread_naming::KernelThreadNaming),
    }
}
