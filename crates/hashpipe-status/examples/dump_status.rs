//! Print the status buffer of a hashpipe instance
//!
//! Locates libhashpipe through `HASHPIPE_SO_PATH` or `LD_LIBRARY_PATH`.
//!
//! Usage:
//! ```bash
//! HASHPIPE_SO_PATH=/usr/local/lib/libhashpipe.so cargo run --example dump_status -- 0
//! ```

use hashpipe_status::{Libhashpipe, StatusHandle, StatusOptions};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let instance_id: i32 = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 0,
    };

    let lib = Libhashpipe::discover()?;
    let mut handle = StatusHandle::attach_with(lib, instance_id, StatusOptions::from_env())?;
    println!("Library: {}", handle.ipc().path().display());
    println!("Instance {} (shmid {})", handle.instance_id(), handle.segment_id());
    if let Some(timeout) = handle.options().lock_timeout {
        println!("Lock timeout: {:?}", timeout);
    }

    let status = handle.parse_buffer()?;
    match status.as_schema() {
        Some(view) => {
            println!("Schema: {}", view.schema().name);
            for name in view.accessor_names() {
                if let Some(value) = view.get(name) {
                    println!("  .{:<10} {}", name, value);
                }
            }
        }
        None => println!("Schema: none"),
    }

    for (key, value) in status.iter() {
        println!("{:<8} = {}", key, value);
    }

    handle.detach()?;
    Ok(())
}
