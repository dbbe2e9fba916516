//! Attached status buffer handle and its RAII lock guard

use std::time::Duration;

use crate::config::StatusOptions;
use crate::ipc::{RawStatus, StatusIpc};
use crate::map::StatusMap;
use crate::record::parse_records;
use crate::schema::{registry, Status};
use crate::{Error, Result};

/// Handle on one attached status buffer
///
/// Detaches exactly once: either through [`StatusHandle::detach`] or when
/// dropped. A detach failure on drop is logged, not raised.
pub struct StatusHandle<B: StatusIpc> {
    ipc: B,
    raw: RawStatus,
    instance_id: i32,
    options: StatusOptions,
    attached: bool,
}

// Safety: the raw pointers refer to the attached segment, which is valid from
// any thread of this process until detach.
unsafe impl<B: StatusIpc + Send> Send for StatusHandle<B> {}

impl<B: StatusIpc> StatusHandle<B> {
    /// Attach to `instance_id`, locking without a timeout
    pub fn attach(ipc: B, instance_id: i32) -> Result<Self> {
        Self::attach_with(ipc, instance_id, StatusOptions::default())
    }

    pub fn attach_with(ipc: B, instance_id: i32, options: StatusOptions) -> Result<Self> {
        let mut raw = RawStatus::default();
        let code = ipc.attach(instance_id, &mut raw);
        if code != 0 {
            return Err(Error::AttachFailure { instance_id, code });
        }
        tracing::debug!(instance_id, shmid = raw.shmid, "attached to status buffer");

        Ok(Self {
            ipc,
            raw,
            instance_id,
            options,
            attached: true,
        })
    }

    pub fn instance_id(&self) -> i32 {
        self.instance_id
    }

    /// Native segment id
    pub fn segment_id(&self) -> i32 {
        self.raw.shmid
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.options.lock_timeout
    }

    pub fn options(&self) -> &StatusOptions {
        &self.options
    }

    pub fn ipc(&self) -> &B {
        &self.ipc
    }

    /// Take the status lock
    ///
    /// Blocks indefinitely without a timeout. With one, a failed timed wait
    /// returns [`Error::LockTimeout`] and nothing is left to unlock.
    pub fn lock(&mut self) -> Result<StatusLock<'_, B>> {
        match self.options.lock_timeout {
            None => self.ipc.lock(&mut self.raw),
            Some(timeout) => {
                let code = self.ipc.lock_timeout(&mut self.raw, timeout);
                if code != 0 {
                    let seconds = timeout.as_secs_f64();
                    tracing::warn!(instance_id = self.instance_id, seconds, code, "status lock timed out");
                    return Err(Error::LockTimeout { seconds });
                }
            }
        }
        Ok(StatusLock { handle: self })
    }

    /// Run `body` over the record area while holding the lock
    ///
    /// The lock is released however `body` exits, panics included.
    pub fn with_lock<T>(&mut self, body: impl FnOnce(&[u8]) -> Result<T>) -> Result<T> {
        let guard = self.lock()?;
        body(guard.bytes())
    }

    /// Read all records under the lock
    pub fn parse(&mut self) -> Result<StatusMap> {
        let max_records = self.options.max_records;
        self.with_lock(|bytes| parse_records(bytes, max_records))
    }

    /// Read all records and classify them against the process-wide registry
    pub fn parse_buffer(&mut self) -> Result<Status> {
        let map = self.parse()?;
        Ok(registry().classify(map))
    }

    pub fn detach(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        if !self.attached {
            return Ok(());
        }
        self.attached = false;

        let code = self.ipc.detach(&mut self.raw);
        if code != 0 {
            return Err(Error::DetachFailure {
                instance_id: self.instance_id,
                code,
            });
        }
        tracing::debug!(instance_id = self.instance_id, "detached from status buffer");
        Ok(())
    }
}

impl<B: StatusIpc> std::fmt::Debug for StatusHandle<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusHandle")
            .field("instance_id", &self.instance_id)
            .field("shmid", &self.raw.shmid)
            .field("options", &self.options)
            .field("attached", &self.attached)
            .finish()
    }
}

impl<B: StatusIpc> Drop for StatusHandle<B> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(error = %e, "status buffer detach failed");
        }
    }
}

/// Held status lock, released on drop
pub struct StatusLock<'a, B: StatusIpc> {
    handle: &'a mut StatusHandle<B>,
}

impl<B: StatusIpc> StatusLock<'_, B> {
    /// Record area of the locked segment
    pub fn bytes(&self) -> &[u8] {
        let raw = &self.handle.raw;
        if raw.buf.is_null() {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(raw.buf.cast::<u8>(), self.handle.ipc.segment_len()) }
    }
}

impl<B: StatusIpc> Drop for StatusLock<'_, B> {
    fn drop(&mut self) {
        let handle = &mut *self.handle;
        handle.ipc.unlock(&mut handle.raw);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::{InMemoryStatus, IN_MEMORY_SHMID};
    use crate::value::Value;
    use std::sync::Arc;

    fn status(records: &[(&str, &str)]) -> Arc<InMemoryStatus> {
        Arc::new(InMemoryStatus::from_records(records.iter().copied()).unwrap())
    }

    #[test]
    fn test_attach_and_drop_detaches_once() {
        let ipc = status(&[]);
        {
            let handle = StatusHandle::attach(ipc.clone(), 2).unwrap();
            assert_eq!(handle.instance_id(), 2);
            assert_eq!(handle.segment_id(), IN_MEMORY_SHMID);
            assert_eq!(handle.lock_timeout(), None);
        }
        assert_eq!(ipc.attaches(), 1);
        assert_eq!(ipc.detaches(), 1);
    }

    #[test]
    fn test_explicit_detach_is_not_repeated_on_drop() {
        let ipc = status(&[]);
        let handle = StatusHandle::attach(ipc.clone(), 0).unwrap();
        handle.detach().unwrap();
        assert_eq!(ipc.detaches(), 1);
    }

    #[test]
    fn test_attach_failure() {
        let ipc = Arc::new(InMemoryStatus::default().fail_attach(-1));
        match StatusHandle::attach(ipc.clone(), 7) {
            Err(Error::AttachFailure { instance_id, code }) => {
                assert_eq!(instance_id, 7);
                assert_eq!(code, -1);
            }
            other => panic!("expected AttachFailure, got {:?}", other),
        }
        assert_eq!(ipc.detaches(), 0);
    }

    #[test]
    fn test_detach_failure_reported() {
        let ipc = Arc::new(InMemoryStatus::default().fail_detach(1));
        let handle = StatusHandle::attach(ipc.clone(), 4).unwrap();
        assert!(matches!(
            handle.detach(),
            Err(Error::DetachFailure { instance_id: 4, code: 1 })
        ));

        // drop path logs instead of panicking
        let handle = StatusHandle::attach(ipc.clone(), 4).unwrap();
        drop(handle);
        assert_eq!(ipc.detaches(), 2);
    }

    #[test]
    fn test_with_lock_pairs_lock_and_unlock() {
        let ipc = status(&[("PULSE", "1")]);
        let mut handle = StatusHandle::attach(ipc.clone(), 0).unwrap();

        let len = handle
            .with_lock(|bytes| {
                assert!(ipc.is_locked());
                Ok(bytes.len())
            })
            .unwrap();
        assert_eq!(len, 160);

        let err = handle
            .with_lock(|_| -> Result<()> {
                Err(Error::MalformedRecord {
                    offset: 0,
                    record: String::new(),
                })
            })
            .unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { .. }));

        assert_eq!(ipc.locks(), 2);
        assert_eq!(ipc.unlocks(), 2);
        assert!(!ipc.is_locked());
    }

    #[test]
    fn test_with_lock_unlocks_on_panic() {
        let ipc = status(&[]);
        let mut handle = StatusHandle::attach(ipc.clone(), 0).unwrap();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            handle.with_lock(|_| -> Result<()> { panic!("body failed") })
        }));
        assert!(result.is_err());
        assert_eq!(ipc.unlocks(), 1);
        assert!(!ipc.is_locked());
    }

    #[test]
    fn test_timed_lock_uses_timeout_primitive() {
        let ipc = status(&[("PULSE", "1")]);
        let options = StatusOptions::new().with_lock_timeout_secs(0.25);
        let mut handle = StatusHandle::attach_with(ipc.clone(), 0, options).unwrap();

        assert_eq!(handle.options().lock_timeout, Some(Duration::from_millis(250)));
        let map = handle.parse().unwrap();
        assert_eq!(map.get("PULSE"), Some(&Value::Int(1)));
        assert_eq!(handle.ipc().timed_locks(), 1);
        assert_eq!(ipc.locks(), 0);
        assert_eq!(ipc.unlocks(), 1);
    }

    #[test]
    fn test_lock_timeout_skips_body_and_unlock() {
        let ipc = Arc::new(
            InMemoryStatus::from_records([("PULSE", "1")])
                .unwrap()
                .fail_timed_lock(libc::ETIMEDOUT),
        );
        let options = StatusOptions::new().with_lock_timeout(Some(Duration::from_millis(1500)));
        let mut handle = StatusHandle::attach_with(ipc.clone(), 0, options).unwrap();

        let mut ran = false;
        let err = handle
            .with_lock(|_| {
                ran = true;
                Ok(())
            })
            .unwrap_err();

        assert!(!ran);
        assert!(err.is_recoverable());
        match err {
            Error::LockTimeout { seconds } => assert_eq!(seconds, 1.5),
            other => panic!("expected LockTimeout, got {:?}", other),
        }
        assert_eq!(ipc.unlocks(), 0);
    }

    #[test]
    fn test_parse_error_releases_lock() {
        let ipc = Arc::new(InMemoryStatus::from_bytes(vec![b'x'; 80]));
        let mut handle = StatusHandle::attach(ipc.clone(), 0).unwrap();

        assert!(matches!(handle.parse(), Err(Error::MalformedRecord { .. })));
        assert_eq!(ipc.locks(), 1);
        assert_eq!(ipc.unlocks(), 1);
    }
}
