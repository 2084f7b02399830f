pub mod auth;
pub mod checkpoint;
pub mod sync;

use std::path::Path;

use emberlog_core::Config;

/// Load configuration from an explicit path or the default location.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match path {
        Some(p) => Config::load_from(p)?,
        None => Config::load()?,
    };
    Ok(config)
}
