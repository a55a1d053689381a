//! The registry lock, built directly on a raw `pthread_mutex_t` so it is
//! never itself an observed lock and the verifier's own hooks never see it.
//!
//! This is the narrow slice of the "native-primitive resolver" that
//! `locksmith-core` actually depends on. Resolving the *user's* pthread
//! entry points (so the shim can call the real glibc implementation after
//! the verifier's pre-hook runs) is a separate, shim-side concern: see
//! [`NativeSymbols`].

use std::cell::UnsafeCell;
use std::ffi::c_void;

use locksmith_core::RegistryLock;

/// A [`RegistryLock`] backed by a raw, unwrapped `pthread_mutex_t`.
///
/// Recursive by construction (`PTHREAD_MUTEX_RECURSIVE`) so that nested
/// calls from within the verifier (which always run with `intercepting`
/// cleared, and therefore never re-enter the hooks, but may still legally
/// re-enter the registry lock itself on some call paths) cannot deadlock
/// against themselves.
pub struct RawPthreadLock {
    mutex: UnsafeCell<libc::pthread_mutex_t>,
}

// SAFETY: `pthread_mutex_t` is valid to share across threads once
// initialized; all access goes through `lock`/`unlock`.
unsafe impl Send for RawPthreadLock {}
unsafe impl Sync for RawPthreadLock {}

impl RawPthreadLock {
    /// Constructs and initializes a recursive raw mutex.
    ///
    /// # Panics
    ///
    /// Panics if `pthread_mutexattr_init`/`pthread_mutex_init` report
    /// failure — this happens only under resource exhaustion so severe that
    /// bootstrap cannot proceed regardless.
    #[must_use]
    pub fn new() -> Self {
        // SAFETY: `attr` is a plain C struct initialized by the pthread
        // API before use and destroyed after `pthread_mutex_init` copies
        // out of it.
        unsafe {
            let mut attr: libc::pthread_mutexattr_t = std::mem::zeroed();
            assert_eq!(libc::pthread_mutexattr_init(&mut attr), 0, "pthread_mutexattr_init failed");
            assert_eq!(
                libc::pthread_mutexattr_settype(&mut attr, libc::PTHREAD_MUTEX_RECURSIVE),
                0,
                "pthread_mutexattr_settype failed"
            );
            let mut mutex: libc::pthread_mutex_t = std::mem::zeroed();
            assert_eq!(libc::pthread_mutex_init(&mut mutex, &attr), 0, "pthread_mutex_init failed");
            libc::pthread_mutexattr_destroy(&mut attr);
            Self { mutex: UnsafeCell::new(mutex) }
        }
    }
}

impl Default for RawPthreadLock {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryLock for RawPthreadLock {
    fn lock(&self) {
        // SAFETY: the mutex was initialized in `new` and lives as long as
        // `self`; pthread mutexes are safe to lock from any thread.
        let rc = unsafe { libc::pthread_mutex_lock(self.mutex.get()) };
        assert_eq!(rc, 0, "registry lock: pthread_mutex_lock failed with {rc}");
    }

    fn unlock(&self) {
        // SAFETY: only called by the thread that holds the lock, per the
        // `RegistryLock` contract.
        let rc = unsafe { libc::pthread_mutex_unlock(self.mutex.get()) };
        assert_eq!(rc, 0, "registry lock: pthread_mutex_unlock failed with {rc}");
    }
}

impl Drop for RawPthreadLock {
    fn drop(&mut self) {
        // SAFETY: no other reference to `self` can exist at this point.
        unsafe {
            libc::pthread_mutex_destroy(self.mutex.get());
        }
    }
}

/// Real glibc entry points resolved once via `dlsym(RTLD_NEXT, ...)`.
///
/// This is the shim's "native-primitive resolver": function pointers the
/// shim calls between a `pre_*` hook and its matching `post_*` hook so the
/// underlying pthread implementation still actually runs the user's lock
/// operation.
pub struct NativeSymbols {
    /// `pthread_mutex_init`.
    pub mutex_init: unsafe extern "C" fn(*mut libc::pthread_mutex_t, *const libc::pthread_mutexattr_t) -> i32,
    /// `pthread_mutex_destroy`.
    pub mutex_destroy: unsafe extern "C" fn(*mut libc::pthread_mutex_t) -> i32,
    /// `pthread_mutex_lock`.
    pub mutex_lock: unsafe extern "C" fn(*mut libc::pthread_mutex_t) -> i32,
    /// `pthread_mutex_trylock`.
    pub mutex_trylock: unsafe extern "C" fn(*mut libc::pthread_mutex_t) -> i32,
    /// `pthread_mutex_timedlock`.
    pub mutex_timedlock: unsafe extern "C" fn(*mut libc::pthread_mutex_t, *const libc::timespec) -> i32,
    /// `pthread_mutex_unlock`.
    pub mutex_unlock: unsafe extern "C" fn(*mut libc::pthread_mutex_t) -> i32,
    /// `pthread_spin_init`.
    pub spin_init: unsafe extern "C" fn(*mut libc::pthread_spinlock_t, i32) -> i32,
    /// `pthread_spin_destroy`.
    pub spin_destroy: unsafe extern "C" fn(*mut libc::pthread_spinlock_t) -> i32,
    /// `pthread_spin_lock`.
    pub spin_lock: unsafe extern "C" fn(*mut libc::pthread_spinlock_t) -> i32,
    /// `pthread_spin_trylock`.
    pub spin_trylock: unsafe extern "C" fn(*mut libc::pthread_spinlock_t) -> i32,
    /// `pthread_spin_unlock`.
    pub spin_unlock: unsafe extern "C" fn(*mut libc::pthread_spinlock_t) -> i32,
    /// `pthread_cond_wait`.
    pub cond_wait: unsafe extern "C" fn(*mut libc::pthread_cond_t, *mut libc::pthread_mutex_t) -> i32,
    /// `pthread_cond_timedwait`.
    pub cond_timedwait:
        unsafe extern "C" fn(*mut libc::pthread_cond_t, *mut libc::pthread_mutex_t, *const libc::timespec) -> i32,
}

/// Error resolving one of the real glibc symbols.
#[derive(Debug, thiserror::Error)]
#[error("failed to resolve native symbol {0:?} via dlsym(RTLD_NEXT, ...)")]
pub struct SymbolResolutionError(&'static str);

impl NativeSymbols {
    /// Resolves every symbol this struct names, or fails on the first miss.
    ///
    /// # Safety
    ///
    /// MUST only be called after the dynamic linker has finished loading
    /// this shared object into the address space of a process whose
    /// threading library actually exports these symbols.
    pub unsafe fn resolve() -> Result<Self, SymbolResolutionError> {
        // SAFETY: caller's obligation, documented above.
        unsafe {
            Ok(Self {
                mutex_init: std::mem::transmute::<*mut c_void, _>(resolve_one("pthread_mutex_init")?),
                mutex_destroy: std::mem::transmute::<*mut c_void, _>(resolve_one("pthread_mutex_destroy")?),
                mutex_lock: std::mem::transmute::<*mut c_void, _>(resolve_one("pthread_mutex_lock")?),
                mutex_trylock: std::mem::transmute::<*mut c_void, _>(resolve_one("pthread_mutex_trylock")?),
                mutex_timedlock: std::mem::transmute::<*mut c_void, _>(resolve_one("pthread_mutex_timedlock")?),
                mutex_unlock: std::mem::transmute::<*mut c_void, _>(resolve_one("pthread_mutex_unlock")?),
                spin_init: std::mem::transmute::<*mut c_void, _>(resolve_one("pthread_spin_init")?),
                spin_destroy: std::mem::transmute::<*mut c_void, _>(resolve_one("pthread_spin_destroy")?),
                spin_lock: std::mem::transmute::<*mut c_void, _>(resolve_one("pthread_spin_lock")?),
                spin_trylock: std::mem::transmute::<*mut c_void, _>(resolve_one("pthread_spin_trylock")?),
                spin_unlock: std::mem::transmute::<*mut c_void, _>(resolve_one("pthread_spin_unlock")?),
                cond_wait: std::mem::transmute::<*mut c_void, _>(resolve_one("pthread_cond_wait")?),
                cond_timedwait: std::mem::transmute::<*mut c_void, _>(resolve_one("pthread_cond_timedwait")?),
            })
        }
    }
}

/// # Safety
///
/// See [`NativeSymbols::resolve`].
unsafe fn resolve_one(name: &'static str) -> Result<*mut c_void, SymbolResolutionError> {
    let cname = std::ffi::CString::new(name).expect("symbol name has no interior NUL");
    // SAFETY: `cname` is a valid, NUL-terminated C string for the duration
    // of this call.
    let ptr = unsafe { libc::dlsym(libc::RTLD_NEXT, cname.as_ptr()) };
    if ptr.is_null() {
        Err(SymbolResolutionError(name))
    } else {
        Ok(ptr)
    }
}
