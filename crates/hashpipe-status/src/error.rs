//! Error types for hashpipe-status

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to attach to status buffer of instance {instance_id} (rc={code})")]
    AttachFailure { instance_id: i32, code: i32 },

    #[error("failed to detach from status buffer of instance {instance_id} (rc={code})")]
    DetachFailure { instance_id: i32, code: i32 },

    #[error("timed out after {seconds}s waiting for the status buffer lock")]
    LockTimeout { seconds: f64 },

    #[error("could not decode record at offset {offset}: {raw:?}")]
    RecordDecodeError { offset: usize, raw: Vec<u8> },

    #[error("malformed record at offset {offset}: {record:?}")]
    MalformedRecord { offset: usize, record: String },

    #[error("no END record after {records} records (offset {offset})")]
    UnterminatedBuffer { offset: usize, records: usize },

    #[error("failed to load {path:?}: {reason}")]
    LibraryLoad { path: PathBuf, reason: String },

    #[error("hashpipe library not found, searched: {searched:?}")]
    LibraryNotFound { searched: Vec<PathBuf> },
}

impl Error {
    /// Whether retrying the attach-lock-parse sequence can succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::LockTimeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
