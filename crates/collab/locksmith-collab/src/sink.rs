//! [`DiagnosticSink`] implementations for every `LKSMITH_LOG` target:
//! `stderr`, `stdout`, `syslog`, `file://PATH`, and `callback://0xADDR`.

use std::ffi::CString;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use locksmith_core::{Diagnostic, DiagnosticSink};

/// Writes each diagnostic as a line of JSON to stderr.
#[derive(Default)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        match serde_json::to_string(diagnostic) {
            Ok(line) => eprintln!("{line}"),
            Err(_) => eprintln!("{diagnostic}"),
        }
    }
}

/// Writes each diagnostic as a line of JSON to stdout.
#[derive(Default)]
pub struct StdoutSink;

impl DiagnosticSink for StdoutSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        match serde_json::to_string(diagnostic) {
            Ok(line) => println!("{line}"),
            Err(_) => println!("{diagnostic}"),
        }
    }
}

/// Appends each diagnostic as a line of JSON to a file, opened once and
/// held for the process lifetime.
pub struct FileSink {
    file: Mutex<std::fs::File>,
}

/// Failure opening the target file for a `file://` sink.
#[derive(Debug, thiserror::Error)]
#[error("failed to open diagnostic log file {path:?}: {source}")]
pub struct FileSinkError {
    path: String,
    #[source]
    source: std::io::Error,
}

impl FileSink {
    /// Opens `path` for appending, creating it if it does not yet exist.
    pub fn open(path: &str) -> Result<Self, FileSinkError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| FileSinkError { path: path.to_string(), source })?;
        Ok(Self { file: Mutex::new(file) })
    }
}

impl DiagnosticSink for FileSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        let line = serde_json::to_string(diagnostic).unwrap_or_else(|_| diagnostic.to_string());
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{line}");
        }
    }
}

/// Sends each diagnostic to the platform syslog via `libc::syslog`.
#[derive(Default)]
pub struct SyslogSink;

impl DiagnosticSink for SyslogSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        let line = diagnostic.to_string();
        if let Ok(cline) = CString::new(line) {
            let priority = match diagnostic.severity() {
                locksmith_core::Severity::Warning => libc::LOG_WARNING,
                locksmith_core::Severity::Error => libc::LOG_ERR,
            };
            // SAFETY: `cline` is a valid NUL-terminated string for the
            // duration of this call; `syslog` does not retain the pointer.
            unsafe {
                libc::syslog(libc::LOG_USER | priority, c"%s".as_ptr(), cline.as_ptr());
            }
        }
    }
}

/// Invokes a user-supplied `extern "C" fn(code: i32, msg: *const c_char)` at
/// a fixed address, as named by `callback://0xADDR`.
pub struct CallbackSink {
    f: unsafe extern "C" fn(i32, *const std::os::raw::c_char),
}

impl CallbackSink {
    /// Builds a sink around a raw function pointer at `addr`.
    ///
    /// # Safety
    ///
    /// `addr` MUST be the address of a function with the exact signature
    /// `extern "C" fn(i32, *const c_char)`, valid for the remaining
    /// lifetime of the process.
    #[must_use]
    pub unsafe fn new(addr: usize) -> Self {
        // SAFETY: caller's obligation, documented above.
        let f = unsafe { std::mem::transmute::<usize, unsafe extern "C" fn(i32, *const std::os::raw::c_char)>(addr) };
        Self { f }
    }
}

impl DiagnosticSink for CallbackSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        let Ok(cmsg) = CString::new(diagnostic.to_string()) else { return };
        // SAFETY: `self.f` was validated by the caller of `new`; `cmsg`
        // outlives the call.
        unsafe {
            (self.f)(diagnostic.code() as i32, cmsg.as_ptr());
        }
    }
}

/// Error parsing an `LKSMITH_LOG` value into a concrete sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkParseError {
    /// `file://` was given with no path.
    #[error("file:// sink requires a path, e.g. file:///var/log/locksmith.log")]
    MissingFilePath,
    /// Opening the target file failed.
    #[error(transparent)]
    File(#[from] FileSinkError),
    /// `callback://` was given with no address, or the address did not
    /// parse as hex.
    #[error("callback:// sink requires a hex address, e.g. callback://0x7f0000001000")]
    MalformedCallbackAddress,
    /// The value did not match any known scheme.
    #[error("unrecognized LKSMITH_LOG target {0:?}")]
    UnknownTarget(String),
}

/// Resolves an `LKSMITH_LOG` value into a boxed [`DiagnosticSink`].
///
/// # Safety
///
/// If `value` names a `callback://` target, the same obligations as
/// [`CallbackSink::new`] apply to the embedded address.
pub unsafe fn from_str(value: &str) -> Result<Box<dyn DiagnosticSink>, SinkParseError> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("stderr") {
        return Ok(Box::new(StderrSink));
    }
    if trimmed.eq_ignore_ascii_case("stdout") {
        return Ok(Box::new(StdoutSink));
    }
    if trimmed.eq_ignore_ascii_case("syslog") {
        return Ok(Box::new(SyslogSink));
    }
    if let Some(path) = trimmed.strip_prefix("file://") {
        if path.is_empty() {
            return Err(SinkParseError::MissingFilePath);
        }
        return Ok(Box::new(FileSink::open(path)?));
    }
    if let Some(addr) = trimmed.strip_prefix("callback://") {
        let addr = addr.strip_prefix("0x").unwrap_or(addr);
        let addr = usize::from_str_radix(addr, 16).map_err(|_| SinkParseError::MalformedCallbackAddress)?;
        // SAFETY: propagated to the caller via this function's own
        // safety contract.
        return Ok(Box::new(unsafe { CallbackSink::new(addr) }));
    }
    Err(SinkParseError::UnknownTarget(trimmed.to_string()))
}
