//! `LD_PRELOAD`-able interposition layer.
//!
//! Exports the `pthread_*` C ABI symbols a dynamic linker resolves ahead of
//! glibc's own, so every call a target program makes into its threading
//! library is observed by the Locksmith verifier before and after the real
//! operation runs.
//!
//! Every exported function follows the same shape: run the matching
//! `pre_*` hook, skip or run the real glibc call depending on the returned
//! [`HookStatus`], then run the matching `post_*` hook if one exists.

#![allow(clippy::missing_safety_doc)]

mod subscriber;

use std::sync::OnceLock;

use locksmith_core::{DenyReason, HookStatus, LockKey, Verifier};
use locksmith_collab::{Config, NativeSymbols};

static NATIVE: OnceLock<NativeSymbols> = OnceLock::new();

fn native() -> &'static NativeSymbols {
    NATIVE.get_or_init(|| {
        // SAFETY: called only from within exported pthread_* symbols,
        // which only run once this shared object is loaded into a process
        // whose C library exports the real pthread entry points.
        unsafe { NativeSymbols::resolve() }.expect("locksmith-shim: failed to resolve native pthread symbols")
    })
}

fn verifier() -> &'static Verifier {
    locksmith_core::bootstrap(|| {
        let config = Config::from_env();
        subscriber::install(&config.trace_filter);
        let filter = config.frame_filter();
        // SAFETY: collaborator construction happens once, under the C8
        // latch, before any hook can run concurrently.
        let collaborators = unsafe { locksmith_collab::default_collaborators(&config) };
        (collaborators, filter)
    })
}

fn deny_to_errno(reason: DenyReason) -> libc::c_int {
    match reason {
        DenyReason::Busy => libc::EBUSY,
        DenyReason::PermissionViolation => libc::EPERM,
    }
}

/// # Safety
/// `mutex` must point to valid, suitably aligned `pthread_mutex_t` storage.
#[no_mangle]
pub unsafe extern "C" fn pthread_mutex_init(
    mutex: *mut libc::pthread_mutex_t,
    attr: *const libc::pthread_mutexattr_t,
) -> libc::c_int {
    let key = LockKey::from_addr(mutex as usize);
    let recursive = if attr.is_null() {
        false
    } else {
        let mut kind = 0;
        // SAFETY: `attr` was checked non-null and is caller-supplied,
        // initialized attribute storage.
        unsafe { libc::pthread_mutexattr_gettype(attr, &mut kind) };
        kind == libc::PTHREAD_MUTEX_RECURSIVE
    };
    verifier().pre_init(key, true, recursive);
    // SAFETY: forwarded to the real glibc entry point with the caller's
    // own arguments.
    let rc = unsafe { (native().mutex_init)(mutex, attr) };
    verifier().post_init(key, rc);
    rc
}

/// # Safety
/// `mutex` must point to a `pthread_mutex_t` previously initialized by
/// [`pthread_mutex_init`].
#[no_mangle]
pub unsafe extern "C" fn pthread_mutex_destroy(mutex: *mut libc::pthread_mutex_t) -> libc::c_int {
    let key = LockKey::from_addr(mutex as usize);
    if let HookStatus::Deny(reason) = verifier().pre_destroy(key) {
        return deny_to_errno(reason);
    }
    // SAFETY: forwarded to the real glibc entry point.
    unsafe { (native().mutex_destroy)(mutex) }
}

/// # Safety
/// `mutex` must point to a live, initialized `pthread_mutex_t`.
#[no_mangle]
pub unsafe extern "C" fn pthread_mutex_lock(mutex: *mut libc::pthread_mutex_t) -> libc::c_int {
    let key = LockKey::from_addr(mutex as usize);
    verifier().pre_lock(key, true);
    // SAFETY: forwarded to the real glibc entry point.
    let rc = unsafe { (native().mutex_lock)(mutex) };
    verifier().post_lock(key, rc);
    rc
}

/// # Safety
/// `mutex` must point to a live, initialized `pthread_mutex_t`.
#[no_mangle]
pub unsafe extern "C" fn pthread_mutex_trylock(mutex: *mut libc::pthread_mutex_t) -> libc::c_int {
    let key = LockKey::from_addr(mutex as usize);
    verifier().pre_lock(key, true);
    // SAFETY: forwarded to the real glibc entry point.
    let rc = unsafe { (native().mutex_trylock)(mutex) };
    verifier().post_lock(key, rc);
    rc
}

/// # Safety
/// `mutex` must point to a live, initialized `pthread_mutex_t`; `abstime`,
/// if non-null, must point to a valid `timespec`.
#[no_mangle]
pub unsafe extern "C" fn pthread_mutex_timedlock(
    mutex: *mut libc::pthread_mutex_t,
    abstime: *const libc::timespec,
) -> libc::c_int {
    let key = LockKey::from_addr(mutex as usize);
    verifier().pre_lock(key, true);
    // SAFETY: forwarded to the real glibc entry point; the deadline is
    // passed through untouched per the timeout policy.
    let rc = unsafe { (native().mutex_timedlock)(mutex, abstime) };
    verifier().post_lock(key, rc);
    rc
}

/// # Safety
/// `mutex` must be held by the calling thread.
#[no_mangle]
pub unsafe extern "C" fn pthread_mutex_unlock(mutex: *mut libc::pthread_mutex_t) -> libc::c_int {
    let key = LockKey::from_addr(mutex as usize);
    if let HookStatus::Deny(reason) = verifier().pre_unlock(key) {
        return deny_to_errno(reason);
    }
    // SAFETY: forwarded to the real glibc entry point.
    let rc = unsafe { (native().mutex_unlock)(mutex) };
    verifier().post_unlock(key);
    rc
}

/// # Safety
/// `lock` must point to valid, suitably aligned `pthread_spinlock_t` storage.
#[no_mangle]
pub unsafe extern "C" fn pthread_spin_init(lock: *mut libc::pthread_spinlock_t, pshared: libc::c_int) -> libc::c_int {
    let key = LockKey::from_addr(lock as usize);
    verifier().pre_init(key, false, false);
    // SAFETY: forwarded to the real glibc entry point.
    let rc = unsafe { (native().spin_init)(lock, pshared) };
    verifier().post_init(key, rc);
    rc
}

/// # Safety
/// `lock` must point to a `pthread_spinlock_t` previously initialized by
/// [`pthread_spin_init`].
#[no_mangle]
pub unsafe extern "C" fn pthread_spin_destroy(lock: *mut libc::pthread_spinlock_t) -> libc::c_int {
    let key = LockKey::from_addr(lock as usize);
    if let HookStatus::Deny(reason) = verifier().pre_destroy(key) {
        return deny_to_errno(reason);
    }
    // SAFETY: forwarded to the real glibc entry point.
    unsafe { (native().spin_destroy)(lock) }
}

/// # Safety
/// `lock` must point to a live, initialized `pthread_spinlock_t`.
#[no_mangle]
pub unsafe extern "C" fn pthread_spin_lock(lock: *mut libc::pthread_spinlock_t) -> libc::c_int {
    let key = LockKey::from_addr(lock as usize);
    verifier().pre_lock(key, false);
    // SAFETY: forwarded to the real glibc entry point.
    let rc = unsafe { (native().spin_lock)(lock) };
    verifier().post_lock(key, rc);
    rc
}

/// # Safety
/// `lock` must point to a live, initialized `pthread_spinlock_t`.
#[no_mangle]
pub unsafe extern "C" fn pthread_spin_trylock(lock: *mut libc::pthread_spinlock_t) -> libc::c_int {
    let key = LockKey::from_addr(lock as usize);
    verifier().pre_lock(key, false);
    // SAFETY: forwarded to the real glibc entry point.
    let rc = unsafe { (native().spin_trylock)(lock) };
    verifier().post_lock(key, rc);
    rc
}

/// # Safety
/// `lock` must be held by the calling thread.
#[no_mangle]
pub unsafe extern "C" fn pthread_spin_unlock(lock: *mut libc::pthread_spinlock_t) -> libc::c_int {
    let key = LockKey::from_addr(lock as usize);
    if let HookStatus::Deny(reason) = verifier().pre_unlock(key) {
        return deny_to_errno(reason);
    }
    // SAFETY: forwarded to the real glibc entry point.
    let rc = unsafe { (native().spin_unlock)(lock) };
    verifier().post_unlock(key);
    rc
}

/// # Safety
/// `cond` must be a live, initialized `pthread_cond_t`; `mutex` must be
/// held by the calling thread.
#[no_mangle]
pub unsafe extern "C" fn pthread_cond_wait(
    cond: *mut libc::pthread_cond_t,
    mutex: *mut libc::pthread_mutex_t,
) -> libc::c_int {
    let key = LockKey::from_addr(mutex as usize);
    if let HookStatus::Deny(reason) = verifier().pre_cond_wait(key) {
        return deny_to_errno(reason);
    }
    // SAFETY: forwarded to the real glibc entry point; glibc itself
    // handles releasing and reacquiring `mutex` around the wait.
    unsafe { (native().cond_wait)(cond, mutex) }
}

/// # Safety
/// `cond` must be a live, initialized `pthread_cond_t`; `mutex` must be
/// held by the calling thread; `abstime` must point to a valid `timespec`.
#[no_mangle]
pub unsafe extern "C" fn pthread_cond_timedwait(
    cond: *mut libc::pthread_cond_t,
    mutex: *mut libc::pthread_mutex_t,
    abstime: *const libc::timespec,
) -> libc::c_int {
    let key = LockKey::from_addr(mutex as usize);
    if let HookStatus::Deny(reason) = verifier().pre_cond_wait(key) {
        return deny_to_errno(reason);
    }
    // SAFETY: forwarded to the real glibc entry point.
    unsafe { (native().cond_timedwait)(cond, mutex, abstime) }
}

/// Re-exported so a host process (or `locksmith-cli config`) can set the
/// current thread's diagnostic name without linking `locksmith-core`
/// directly.
pub fn set_thread_name(name: &str) {
    locksmith_core::set_thread_name(name);
}

/// Re-exported thread-naming accessor; see [`set_thread_name`].
#[must_use]
pub fn get_thread_name() -> String {
    locksmith_core::get_thread_name()
}
