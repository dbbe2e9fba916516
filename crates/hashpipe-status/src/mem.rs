//! Process-local status buffer
//!
//! Stands in for the native library: the record area is an owned byte
//! buffer and the lock is a flag. Every primitive call is counted so callers
//! can check lock/unlock pairing.

use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::time::Duration;

use crate::ipc::{RawStatus, StatusIpc};
use crate::record::{encode_record, END_RECORD};
use crate::Result;

/// Segment id reported by [`InMemoryStatus`]
pub const IN_MEMORY_SHMID: i32 = 0x5354;

/// In-memory status buffer
#[derive(Debug, Default)]
pub struct InMemoryStatus {
    bytes: Box<[u8]>,
    locked: AtomicBool,
    attach_code: AtomicI32,
    detach_code: AtomicI32,
    timed_lock_code: AtomicI32,
    attaches: AtomicUsize,
    detaches: AtomicUsize,
    locks: AtomicUsize,
    timed_locks: AtomicUsize,
    unlocks: AtomicUsize,
}

impl InMemoryStatus {
    /// Use `bytes` verbatim as the record area
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into().into_boxed_slice(),
            ..Self::default()
        }
    }

    /// Lay out `KEY=VALUE` records followed by the END record
    pub fn from_records<K, V>(records: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut bytes = Vec::new();
        for (key, value) in records {
            bytes.extend_from_slice(&encode_record(key.as_ref(), value.as_ref())?);
        }
        bytes.extend_from_slice(END_RECORD);
        Ok(Self::from_bytes(bytes))
    }

    /// Make attach report `code`
    pub fn fail_attach(self, code: i32) -> Self {
        self.attach_code.store(code, Ordering::SeqCst);
        self
    }

    /// Make detach report `code`
    pub fn fail_detach(self, code: i32) -> Self {
        self.detach_code.store(code, Ordering::SeqCst);
        self
    }

    /// Make the timed lock report `code`, as if another process held the lock
    pub fn fail_timed_lock(self, code: i32) -> Self {
        self.timed_lock_code.store(code, Ordering::SeqCst);
        self
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    pub fn attaches(&self) -> usize {
        self.attaches.load(Ordering::SeqCst)
    }

    pub fn detaches(&self) -> usize {
        self.detaches.load(Ordering::SeqCst)
    }

    /// Blocking lock calls
    pub fn locks(&self) -> usize {
        self.locks.load(Ordering::SeqCst)
    }

    pub fn timed_locks(&self) -> usize {
        self.timed_locks.load(Ordering::SeqCst)
    }

    pub fn unlocks(&self) -> usize {
        self.unlocks.load(Ordering::SeqCst)
    }

    fn take_lock(&self) {
        let was_locked = self.locked.swap(true, Ordering::SeqCst);
        debug_assert!(!was_locked, "status lock is not reentrant");
    }
}

impl StatusIpc for InMemoryStatus {
    fn attach(&self, instance_id: i32, status: &mut RawStatus) -> i32 {
        self.attaches.fetch_add(1, Ordering::SeqCst);
        let code = self.attach_code.load(Ordering::SeqCst);
        if code == 0 {
            status.instance_id = instance_id;
            status.shmid = IN_MEMORY_SHMID;
            status.buf = self.bytes.as_ptr().cast_mut().cast();
            // opaque token, never dereferenced
            status.lock = status.buf.cast::<c_void>();
        }
        code
    }

    fn detach(&self, status: &mut RawStatus) -> i32 {
        self.detaches.fetch_add(1, Ordering::SeqCst);
        status.lock = std::ptr::null_mut();
        status.buf = std::ptr::null_mut();
        self.detach_code.load(Ordering::SeqCst)
    }

    fn lock(&self, _status: &mut RawStatus) {
        self.locks.fetch_add(1, Ordering::SeqCst);
        self.take_lock();
    }

    fn lock_timeout(&self, _status: &mut RawStatus, _timeout: Duration) -> i32 {
        self.timed_locks.fetch_add(1, Ordering::SeqCst);
        let code = self.timed_lock_code.load(Ordering::SeqCst);
        if code == 0 {
            self.take_lock();
        }
        code
    }

    fn unlock(&self, _status: &mut RawStatus) {
        self.unlocks.fetch_add(1, Ordering::SeqCst);
        let was_locked = self.locked.swap(false, Ordering::SeqCst);
        debug_assert!(was_locked, "unlock without a held lock");
    }

    fn segment_len(&self) -> usize {
        self.bytes.len()
    }
}
