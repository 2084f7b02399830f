//! Checkpoint inspection: where the next sync will resume per device.

use std::error::Error;
use std::path::Path;

use emberlog_core::ReportStore;

pub fn run(config: Option<&Path>, device: Option<String>) -> Result<(), Box<dyn Error>> {
    let config = super::load_config(config)?;
    let store = ReportStore::open(&config.database_path()?)?;

    let names = match device {
        Some(name) => vec![name],
        None => store.device_names()?,
    };
    if names.is_empty() {
        println!("No devices in the store yet.");
        return Ok(());
    }

    for name in names {
        match store.last_checkpoint(&name)? {
            Some(at) => println!("{name}: {}", at.format("%Y-%m-%d %H:%M:%S")),
            None => println!("{name}: no data"),
        }
    }
    Ok(())
}
