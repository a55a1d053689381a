//! [`BacktraceProvider`] backed by the `backtrace` crate, with symbols
//! demangled through `rustc-demangle` for readability in diagnostics.

use locksmith_core::{Backtrace as CapturedBacktrace, BacktraceProvider, Frame};

/// Default backtrace capture, walking the stack with `backtrace::trace`.
///
/// Caps the number of frames it walks so a pathological call stack cannot
/// make every lock operation's hot path unbounded.
pub struct StackBacktraceProvider {
    max_frames: usize,
}

/// Frames beyond this depth are dropped rather than walked.
const DEFAULT_MAX_FRAMES: usize = 64;

impl StackBacktraceProvider {
    /// Builds a provider with the default frame cap.
    #[must_use]
    pub fn new() -> Self {
        Self { max_frames: DEFAULT_MAX_FRAMES }
    }

    /// Builds a provider with an explicit frame cap.
    #[must_use]
    pub fn with_max_frames(max_frames: usize) -> Self {
        Self { max_frames }
    }
}

impl Default for StackBacktraceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl BacktraceProvider for StackBacktraceProvider {
    fn capture(&self) -> CapturedBacktrace {
        let mut frames = Vec::with_capacity(self.max_frames);
        backtrace::trace(|bt_frame| {
            if frames.len() >= self.max_frames {
                return false;
            }
            let mut resolved = false;
            backtrace::resolve_frame(bt_frame, |symbol| {
                resolved = true;
                let name = symbol
                    .name()
                    .map(|n| rustc_demangle::demangle(&n.to_string()).to_string())
                    .unwrap_or_else(|| "<unknown>".to_string());
                frames.push(Frame { symbol: name });
            });
            if !resolved {
                frames.push(Frame { symbol: "<unresolved>".to_string() });
            }
            frames.len() < self.max_frames
        });
        CapturedBacktrace { frames }
    }
}
