//! Errors at the Rust API boundary.
//!
//! Distinct from [`crate::diagnostic::Diagnostic`]: a `Diagnostic` is an
//! expected, documented finding about the *user's* program. An [`Error`] is a
//! failure of the verifier's own machinery.

use thiserror::Error;

/// Result alias used throughout `locksmith-core`'s Rust API.
pub type Result<T> = core::result::Result<T, Error>;

/// Failure of the verifier's own machinery, as opposed to a lock-discipline
/// finding about the observed program.
#[derive(Debug, Error)]
pub enum Error {
    /// A collaborator reported that a native call could not complete.
    #[error("native primitive call failed: {0}")]
    NativeCallFailed(&'static str),

    /// Bootstrap was attempted twice, or a hook ran before bootstrap
    /// completed and after it was given up on.
    #[error("verifier bootstrap failed: {0}")]
    BootstrapFailed(&'static str),

    /// An internal invariant was found broken (e.g. a post-hook could not
    /// find the record its matching pre-hook prepared).
    #[error("internal invariant violated: {0}")]
    Invariant(&'static str),

    /// A sorted-set or registry insertion could not allocate.
    #[error("allocation failed: {0}")]
    OutOfMemory(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_context() {
        let e = Error::Invariant("holder list empty on release");
        assert!(e.to_string().contains("holder list empty on release"));
    }
}
