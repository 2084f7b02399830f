//! Revision marker helpers and the intermediate revision cache file.
//!
//! The remote encodes "data available up to here" as a `yymmddHHMMSS`
//! string, which sorts lexicographically in time order. The summary result
//! is cached to a local JSON file purely to decouple the two stages of one
//! run; it is never treated as a checkpoint.

use std::fs;
use std::io;
use std::path::Path;

use chrono::NaiveDateTime;

use crate::remote::DeviceSummary;

/// Format used by the remote for revision markers.
pub const REVISION_FORMAT: &str = "%y%m%d%H%M%S";

/// Render a time in the remote's revision encoding.
pub fn to_revision_string(t: NaiveDateTime) -> String {
    t.format(REVISION_FORMAT).to_string()
}

/// Parse a revision marker back into a time. `None` for anything that does
/// not match the remote's encoding (including the "no data" sentinel).
pub fn parse_revision(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, REVISION_FORMAT).ok()
}

/// Write the per-run revision cache. Failures here are benign: the caller
/// logs and continues with the in-memory summaries.
pub fn write_cache(path: &Path, summaries: &[DeviceSummary]) -> io::Result<()> {
    let json = serde_json::to_string_pretty(summaries)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, json)
}
