//! hashpipe-status - Reader for hashpipe shared-memory status buffers
//!
//! A status buffer is a run of 80-byte `KEY=VALUE` records in a shared
//! memory segment guarded by a POSIX semaphore. [`StatusHandle`] attaches to
//! it through a [`StatusIpc`] backend, parses the records under the lock and
//! classifies the result against known telescope schemas.
//!
//! ```no_run
//! use hashpipe_status::{Libhashpipe, StatusHandle, StatusOptions};
//!
//! let lib = Libhashpipe::discover()?;
//! let options = StatusOptions::new().with_lock_timeout_secs(1.0);
//! let mut status = StatusHandle::attach_with(lib, 0, options)?;
//! let buffer = status.parse_buffer()?;
//! if let Some(view) = buffer.as_schema() {
//!     println!("{} pulse={:?}", view.schema().name, view.get_i64("pulse"));
//! }
//! # Ok::<(), hashpipe_status::Error>(())
//! ```

pub mod config;
pub mod error;
#[cfg(target_os = "linux")]
pub mod ffi;
pub mod handle;
pub mod ipc;
pub mod map;
pub mod mem;
pub mod record;
pub mod schema;
pub mod telescopes;
pub mod value;

pub use config::{LibraryLocator, StatusOptions};
pub use error::{Error, Result};
#[cfg(target_os = "linux")]
pub use ffi::Libhashpipe;
pub use handle::{StatusHandle, StatusLock};
pub use ipc::{RawStatus, StatusIpc, STATUS_TOTAL_SIZE};
pub use map::StatusMap;
pub use mem::InMemoryStatus;
pub use record::{parse_records, END_RECORD, RECORD_SIZE};
pub use schema::{
    install_registry, registry, Accessor, Discriminator, SchemaDescriptor, SchemaRegistry,
    SchemaView, Status,
};
pub use value::{Value, ValueKind};
