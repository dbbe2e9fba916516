//! Binding to the native hashpipe library
//!
//! `libhashpipe.so` is loaded at runtime; attach, detach, lock and unlock are
//! resolved from it. The timed lock is not exported by the library, so it
//! waits on the status semaphore directly with `sem_timedwait`.

use std::ffi::{c_int, c_void};
use std::path::{Path, PathBuf};
use std::time::Duration;

use libloading::Library;

use crate::config::LibraryLocator;
use crate::ipc::{RawStatus, StatusIpc};
use crate::{Error, Result};

type AttachFn = unsafe extern "C" fn(c_int, *mut RawStatus) -> c_int;
type StatusFn = unsafe extern "C" fn(*mut RawStatus) -> c_int;

/// Loaded `libhashpipe.so`
pub struct Libhashpipe {
    path: PathBuf,
    attach: AttachFn,
    detach: StatusFn,
    lock: StatusFn,
    unlock: StatusFn,
    /// Keeps the symbols above alive
    _library: Library,
}

impl Libhashpipe {
    /// Load the library at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // SAFETY: loading runs the library's initialisers; libhashpipe has
        // none beyond the C runtime's.
        let library = unsafe { Library::new(path) }.map_err(|e| Error::LibraryLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        // SAFETY: the signatures match hashpipe_status.h.
        let (attach, detach, lock, unlock) = unsafe {
            (
                symbol::<AttachFn>(&library, path, b"hashpipe_status_attach\0")?,
                symbol::<StatusFn>(&library, path, b"hashpipe_status_detach\0")?,
                symbol::<StatusFn>(&library, path, b"hashpipe_status_lock\0")?,
                symbol::<StatusFn>(&library, path, b"hashpipe_status_unlock\0")?,
            )
        };

        tracing::debug!(path = %path.display(), "loaded hashpipe library");

        Ok(Self {
            path: path.to_path_buf(),
            attach,
            detach,
            lock,
            unlock,
            _library: library,
        })
    }

    /// Locate the library from the environment and load it
    pub fn discover() -> Result<Self> {
        let path = LibraryLocator::from_env().locate()?;
        Self::load(path)
    }

    /// Path the library was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for Libhashpipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Libhashpipe").field("path", &self.path).finish()
    }
}

unsafe fn symbol<T: Copy>(library: &Library, path: &Path, name: &[u8]) -> Result<T> {
    library
        .get::<T>(name)
        .map(|sym| *sym)
        .map_err(|e| Error::LibraryLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

impl StatusIpc for Libhashpipe {
    fn attach(&self, instance_id: i32, status: &mut RawStatus) -> i32 {
        unsafe { (self.attach)(instance_id, status) }
    }

    fn detach(&self, status: &mut RawStatus) -> i32 {
        unsafe { (self.detach)(status) }
    }

    fn lock(&self, status: &mut RawStatus) {
        unsafe { (self.lock)(status) };
    }

    fn lock_timeout(&self, status: &mut RawStatus, timeout: Duration) -> i32 {
        sem_lock_timeout(status.lock, timeout)
    }

    fn unlock(&self, status: &mut RawStatus) {
        unsafe { (self.unlock)(status) };
    }
}

/// Wait on the semaphore at `lock` for at most `timeout`, returning an errno
fn sem_lock_timeout(lock: *mut c_void, timeout: Duration) -> i32 {
    if lock.is_null() {
        return libc::EINVAL;
    }
    let deadline = deadline_after(timeout);
    loop {
        // SAFETY: `lock` is the semaphore set up by hashpipe_status_attach.
        let rc = unsafe { libc::sem_timedwait(lock.cast::<libc::sem_t>(), &deadline) };
        if rc == 0 {
            return 0;
        }
        let errno = std::io::Error::last_os_error()
            .raw_os_error()
            .unwrap_or(libc::ETIMEDOUT);
        if errno != libc::EINTR {
            return errno;
        }
    }
}

/// Absolute `CLOCK_REALTIME` deadline `timeout` from now, as `sem_timedwait` wants
fn deadline_after(timeout: Duration) -> libc::timespec {
    let mut now = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut now) };

    let nanos = now.tv_nsec as u64 + u64::from(timeout.subsec_nanos());
    let tv_sec = timeout
        .as_secs()
        .checked_add(nanos / 1_000_000_000)
        .and_then(|secs| libc::time_t::try_from(secs).ok())
        .and_then(|secs| now.tv_sec.checked_add(secs));
    match tv_sec {
        Some(tv_sec) => libc::timespec {
            tv_sec,
            tv_nsec: (nanos % 1_000_000_000) as _,
        },
        // Saturate rather than wrap into the past
        None => libc::timespec {
            tv_sec: libc::time_t::MAX,
            tv_nsec: 999_999_999,
        },
    }
}
