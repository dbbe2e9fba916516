//! Dump a status buffer as JSON
//!
//! Without a library path the buffer is a canned in-memory one, which makes
//! this handy for checking what downstream JSON consumers will see.
//!
//! Usage:
//! ```bash
//! cargo run --example status_json --features serde
//! ```

use hashpipe_status::{InMemoryStatus, StatusHandle};
use tracing_subscriber::EnvFilter;

#[cfg(target_os = "linux")]
fn native(instance_id: i32) -> Result<Option<serde_json::Value>, Box<dyn std::error::Error>> {
    use hashpipe_status::{Libhashpipe, LibraryLocator};

    let Ok(path) = LibraryLocator::from_env().locate() else {
        return Ok(None);
    };
    let mut handle = StatusHandle::attach(Libhashpipe::load(path)?, instance_id)?;
    let map = handle.parse()?;
    Ok(Some(serde_json::to_value(&map)?))
}

#[cfg(not(target_os = "linux"))]
fn native(_instance_id: i32) -> Result<Option<serde_json::Value>, Box<dyn std::error::Error>> {
    Ok(None)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let json = match native(0)? {
        Some(json) => json,
        None => {
            let status = InMemoryStatus::from_records([
                ("TELESCOP", "'ATA'"),
                ("DAQSTATE", "'RECORD'"),
                ("PULSE", "1"),
                ("OBSFREQ", "1420.405"),
                ("OBSBW", "-250.0"),
            ])?;
            let mut handle = StatusHandle::attach(status, 0)?;
            let status = handle.parse_buffer()?;
            tracing::info!(schema = ?status.schema_name(), "parsed canned buffer");
            serde_json::to_value(status.map())?
        }
    };

    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
