//! The failure taxonomy the interposition hooks emit.

use crate::key::LockKey;
use serde::Serialize;

/// Severity of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    /// The operation proceeds but the finding is worth a user's attention.
    Warning,
    /// A lock-discipline violation was observed.
    Error,
}

/// One emitted finding, numbered per the documented taxonomy.
///
/// The numeric `code()` is stable across releases; it is what a shim maps to
/// the host threading API's native error convention.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum Diagnostic {
    /// Acquiring `acquiring` would create a cycle with `held`, which was
    /// already held by the same thread.
    LockInversion {
        /// The lock whose acquisition would close the cycle.
        acquiring: LockKey,
        /// The already-held lock that the new edge would have to precede.
        held: LockKey,
    },
    /// A non-recursive lock was re-acquired by the thread already holding it.
    SelfDeadlock {
        /// The lock re-entered.
        key: LockKey,
    },
    /// Unlock of a lock not held by the calling thread.
    NotHeld {
        /// The lock the caller tried to release.
        key: LockKey,
    },
    /// Destroy of a lock whose holder list is non-empty.
    DestroyInUse {
        /// The lock being destroyed.
        key: LockKey,
    },
    /// `cond_wait` on a mutex the calling thread does not hold.
    CondWaitUnheld {
        /// The mutex passed to `cond_wait`.
        key: LockKey,
    },
    /// A sleeper (blocking) lock was acquired while a spin lock was held.
    SpinHoldingSleeper {
        /// The sleeper lock that triggered the warning.
        key: LockKey,
    },
    /// The verifier failed to allocate some piece of bookkeeping state.
    OutOfMemory {
        /// Human-readable description of what could not be allocated.
        context: &'static str,
    },
    /// An internal invariant was violated (a bug in the verifier itself).
    Internal {
        /// Human-readable description of the broken invariant.
        context: &'static str,
    },
}

impl Diagnostic {
    /// The stable numeric code for this diagnostic, per the documented
    /// taxonomy.
    #[must_use]
    pub const fn code(&self) -> u32 {
        match self {
            Self::LockInversion { .. } => 1,
            Self::SelfDeadlock { .. } => 2,
            Self::NotHeld { .. } => 3,
            Self::DestroyInUse { .. } => 4,
            Self::CondWaitUnheld { .. } => 5,
            Self::SpinHoldingSleeper { .. } => 6,
            Self::OutOfMemory { .. } => 7,
            Self::Internal { .. } => 8,
        }
    }

    /// The severity of this diagnostic.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::SpinHoldingSleeper { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl core::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::LockInversion { acquiring, held } => write!(
                f,
                "lock inversion: acquiring {acquiring} would order it before already-held {held}"
            ),
            Self::SelfDeadlock { key } => {
                write!(f, "self-deadlock: non-recursive lock {key} re-acquired by holder")
            }
            Self::NotHeld { key } => write!(f, "unlock of {key} by a thread not holding it"),
            Self::DestroyInUse { key } => write!(f, "destroy of {key} while still held"),
            Self::CondWaitUnheld { key } => write!(f, "cond_wait on {key} without holding it"),
            Self::SpinHoldingSleeper { key } => {
                write!(f, "sleeper lock {key} acquired while holding a spin lock")
            }
            Self::OutOfMemory { context } => write!(f, "allocation failure: {context}"),
            Self::Internal { context } => write!(f, "internal invariant violated: {context}"),
        }
    }
}

/// Outcome of a pre-hook, telling the shim layer what to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStatus {
    /// Proceed with the native call as usual.
    Proceed,
    /// A diagnostic was emitted but the native call should still proceed.
    WarningOnly,
    /// The native call must be skipped; return this status to the caller
    /// instead (mapped to the host's error convention by the shim).
    Deny(DenyReason),
}

/// Raw return code from a native primitive call, POSIX-style: `0` success,
/// non-zero an errno-like failure code. Opaque to the verifier beyond that.
pub type NativeResult = i32;

/// Why a pre-hook denied the native call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Maps to the host's "resource busy" convention.
    Busy,
    /// Maps to the host's "operation not permitted" convention.
    PermissionViolation,
}
