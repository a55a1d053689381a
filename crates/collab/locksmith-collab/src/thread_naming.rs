//! Default [`ThreadNaming`] implementation: prefers the kernel thread id
//! (`gettid` on Linux), falling back to a monotonic per-process counter on
//! platforms where that syscall is unavailable.

use std::sync::atomic::{AtomicU64, Ordering};

use locksmith_core::ThreadNaming;

static NEXT_FALLBACK_ID: AtomicU64 = AtomicU64::new(1);

/// Names threads `tid-<n>` from the kernel, or `thread-<n>` from a counter
/// when no kernel thread id is available.
#[derive(Default)]
pub struct KernelThreadNaming;

impl ThreadNaming for KernelThreadNaming {
    fn default_name_for_current_thread(&self) -> String {
        match linux_gettid() {
            Some(tid) => format!("tid-{tid}"),
            None => format!("thread-{}", NEXT_FALLBACK_ID.fetch_add(1, Ordering::Relaxed)),
        }
    }
}

#[cfg(target_os = "linux")]
fn linux_gettid() -> Option<i64> {
    // SAFETY: SYS_gettid takes no arguments and cannot fail.
    let tid = unsafe { libc::syscall(libc::SYS_gettid) };
    if tid >= 0 {
        Some(tid)
    } else {
        None
    }
}

#[cfg(not(target_os = "linux"))]
fn linux_gettid() -> Option<i64> {
    None
}
