//! C7: deciding whether a captured backtrace matches a user-supplied ignore
//! list.

use std::collections::BTreeSet;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::collab::Backtrace;

/// Exact-symbol and glob-pattern suppression of backtraces.
///
/// When a lock acquisition's backtrace matches, the dependency-graph update
/// for that acquisition is skipped — the holder is still recorded so unlock
/// bookkeeping keeps working.
pub struct FrameFilter {
    exact: BTreeSet<String>,
    patterns: GlobSet,
}

impl FrameFilter {
    /// An empty filter that matches nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self { exact: BTreeSet::new(), patterns: GlobSetBuilder::new().build().expect("empty globset") }
    }

    /// Builds a filter from a colon-separated list of exact symbols and a
    /// colon-separated list of glob patterns.
    ///
    /// A pattern that fails to parse is dropped rather than rejecting the
    /// whole configuration; the caller is expected to log the rejection via
    /// the ambient tracing layer.
    #[must_use]
    pub fn from_colon_lists(ignored_frames: &str, ignored_frame_patterns: &str) -> Self {
        let exact = ignored_frames
            .split(':')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let mut builder = GlobSetBuilder::new();
        for pattern in ignored_frame_patterns.split(':').map(str::trim).filter(|s| !s.is_empty()) {
            if let Ok(glob) = Glob::new(pattern) {
                builder.add(glob);
            }
        }
        let patterns = builder.build().unwrap_or_else(|_| GlobSetBuilder::new().build().expect("empty globset"));

        Self { exact, patterns }
    }

    /// Whether any frame in `backtrace` matches the exact set or a pattern.
    #[must_use]
    pub fn matches(&self, backtrace: &Backtrace) -> bool {
        backtrace
            .frames
            .iter()
            .any(|f| self.exact.contains(&f.symbol) || self.patterns.is_match(&f.symbol))
    }
}
