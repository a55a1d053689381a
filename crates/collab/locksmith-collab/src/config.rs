//! Resolves the `LKSMITH_*` environment variables into a typed [`Config`],
//! once, at bootstrap.

use serde::Serialize;

/// Default `tracing` filter directive when `LKSMITH_TRACE` is unset.
pub const DEFAULT_TRACE_FILTER: &str = "locksmith=warn";

/// Resolved configuration for one process.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Raw `LKSMITH_LOG` value, or `"stderr"` if unset — the default sink
    /// target, chosen so a freshly preloaded process has somewhere to
    /// report violations without extra setup.
    pub log_target: String,
    /// Colon-separated exact frame symbols to ignore, as given verbatim
    /// in `LKSMITH_IGNORED_FRAMES`.
    pub ignored_frames: String,
    /// Colon-separated glob patterns to ignore, as given verbatim in
    /// `LKSMITH_IGNORED_FRAME_PATTERNS`.
    pub ignored_frame_patterns: String,
    /// `tracing` `EnvFilter` directive string for internal logging.
    pub trace_filter: String,
}

impl Config {
    /// Reads `LKSMITH_LOG`, `LKSMITH_IGNORED_FRAMES`,
    /// `LKSMITH_IGNORED_FRAME_PATTERNS`, and `LKSMITH_TRACE` from the
    /// process environment. Never fails: unset or unreadable variables
    /// fall back to documented defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            log_target: std::env::var("LKSMITH_LOG").unwrap_or_else(|_| "stderr".to_string()),
            ignored_frames: std::env::var("LKSMITH_IGNORED_FRAMES").unwrap_or_default(),
            ignored_frame_patterns: std::env::var("LKSMITH_IGNORED_FRAME_PATTERNS").unwrap_or_default(),
            trace_filter: std::env::var("LKSMITH_TRACE").unwrap_or_else(|_| DEFAULT_TRACE_FILTER.to_string()),
        }
    }

    /// Builds the [`locksmith_core::FrameFilter`] this configuration
    /// describes.
    #[must_use]
    pub fn frame_filter(&self) -> locksmith_core::FrameFilter {
        locksmith_core::FrameFilter::from_colon_lists(&self.ignored_frames, &self.ignored_frame_patterns)
    }

    /// Builds the [`locksmith_core::DiagnosticSink`] this configuration
    /// names, falling back to [`crate::sink::StderrSink`] and logging a
    /// warning if `log_target` cannot be parsed.
    ///
    /// # Safety
    ///
    /// If `log_target` names a `callback://` target, the same obligations
    /// as [`crate::sink::CallbackSink::new`] apply.
    pub unsafe fn build_sink(&self) -> Box<dyn locksmith_core::DiagnosticSink> {
        // SAFETY: forwarded to the caller of this function.
        match unsafe { crate::sink::from_str(&self.log_target) } {
            Ok(sink) => sink,
            Err(err) => {
                tracing::warn!(target: "locksmith", error = %err, value = %self.log_target, "falling back to stderr sink");
                Box::new(crate::sink::StderrSink)
            }
        }
    }
}
