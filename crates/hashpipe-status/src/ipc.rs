//! Status buffer IPC primitives

use std::ffi::{c_char, c_int, c_void};
use std::sync::Arc;
use std::time::Duration;

use crate::record::RECORD_SIZE;

/// Number of records a status segment holds
pub const STATUS_RECORDS: usize = 2304;

/// Size of a status segment in bytes
pub const STATUS_TOTAL_SIZE: usize = STATUS_RECORDS * RECORD_SIZE;

/// Native status descriptor, filled in by attach
#[repr(C)]
#[derive(Debug)]
pub struct RawStatus {
    /// Instance ID of this status buffer
    pub instance_id: c_int,
    /// Shared memory segment id
    pub shmid: c_int,
    /// POSIX semaphore guarding the segment
    pub lock: *mut c_void,
    /// Start of the record area
    pub buf: *mut c_char,
}

impl Default for RawStatus {
    fn default() -> Self {
        Self {
            instance_id: 0,
            shmid: -1,
            lock: std::ptr::null_mut(),
            buf: std::ptr::null_mut(),
        }
    }
}

/// Attach/detach/lock/unlock primitives of the environment
///
/// Return codes follow the native convention: zero on success, anything else
/// is a failure. Implementations must leave `buf` valid for `segment_len()`
/// bytes between a successful `attach` and the matching `detach`.
pub trait StatusIpc {
    /// Attach to the status buffer of `instance_id`, filling in `status`
    fn attach(&self, instance_id: i32, status: &mut RawStatus) -> i32;

    fn detach(&self, status: &mut RawStatus) -> i32;

    /// Block until the lock is held
    fn lock(&self, status: &mut RawStatus);

    /// Try to take the lock within `timeout`
    fn lock_timeout(&self, status: &mut RawStatus, timeout: Duration) -> i32;

    fn unlock(&self, status: &mut RawStatus);

    /// Readable length of the attached record area
    fn segment_len(&self) -> usize {
        STATUS_TOTAL_SIZE
    }
}

macro_rules! forward_status_ipc {
    ($($ty:ty),*) => {$(
        impl<T: StatusIpc + ?Sized> StatusIpc for $ty {
            fn attach(&self, instance_id: i32, status: &mut RawStatus) -> i32 {
                (**self).attach(instance_id, status)
            }

            fn detach(&self, status: &mut RawStatus) -> i32 {
                (**self).detach(status)
            }

            fn lock(&self, status: &mut RawStatus) {
                (**self).lock(status)
            }

            fn lock_timeout(&self, status: &mut RawStatus, timeout: Duration) -> i32 {
                (**self).lock_timeout(status, timeout)
            }

            fn unlock(&self, status: &mut RawStatus) {
                (**self).unlock(status)
            }

            fn segment_len(&self) -> usize {
                (**self).segment_len()
            }
        }
    )*};
}

forward_status_ipc!(&T, Box<T>, Arc<T>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_size() {
        assert_eq!(STATUS_TOTAL_SIZE, 184_320);
        assert_eq!(STATUS_TOTAL_SIZE % RECORD_SIZE, 0);
    }

    #[test]
    fn test_raw_status_default_is_detached() {
        let raw = RawStatus::default();
        assert!(raw.lock.is_null());
        assert!(raw.buf.is_null());
        assert_eq!(raw.shmid, -1);
    }
}
