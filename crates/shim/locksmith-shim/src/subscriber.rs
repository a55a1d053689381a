//! Installs a `tracing` subscriber for the verifier's own internal
//! logging, best-effort: a host process that already installed its own
//! global subscriber wins, and this is not treated as an error.

use tracing_subscriber::EnvFilter;

/// Attempts to install a `fmt` subscriber filtered by `directive`.
///
/// Called once, from within the C8 bootstrap closure, so it can never race
/// itself. If a global subscriber is already set (most likely the host
/// process installed its own), this is a silent no-op.
pub(crate) fn install(directive: &str) {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(locksmith_collab::config::DEFAULT_TRACE_FILTER));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).finish();
    // `set_global_default` fails if a subscriber is already installed;
    // that is the host process's choice, not a bootstrap failure here.
    let _ = tracing::subscriber::set_global_default(subscriber);
}
