//! SQLite persistence for the report history.

pub mod columns;
pub mod database;
pub mod writer;

pub use database::{InsertOutcome, ReportStore, StoredRow};
pub use writer::{ReconciliationWriter, WriteOutcome};

use std::path::PathBuf;

/// Returns `~/.config/emberlog[-dev]/` based on EMBERLOG_ENV.
///
/// Set EMBERLOG_ENV=dev to use a development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("EMBERLOG_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("emberlog-dev")
    } else {
        base_dir.join("emberlog")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
