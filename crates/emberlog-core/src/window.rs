//! Windowed-fetch scheduling.
//!
//! The remote report API refuses ranges longer than 31 days; windows are
//! capped at 30 for a safety margin. The sequence starts at the device's
//! checkpoint (or its first-connected time on an empty store) and covers
//! everything up to the remote's latest interval revision, exactly, with no
//! overlap between windows.

use chrono::{Duration, NaiveDateTime};

/// Window length cap, one day below the remote's hard per-call limit.
pub const MAX_WINDOW_DAYS: i64 = 30;

/// A half-open time range `[start, end)` submitted to the report API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Compute the sequence of report windows for one device.
///
/// `checkpoint` is the latest non-blank observation already persisted, if
/// any; `latest` is the remote's interval revision converted to a time. A
/// checkpoint equal to `latest` yields no windows. A start beyond `latest`
/// (clock skew on `first_connected`) yields a single degenerate
/// `[start, start)` window; the caller's revision short-circuit drops it
/// before any remote call is made.
pub fn windows(
    checkpoint: Option<NaiveDateTime>,
    first_connected: NaiveDateTime,
    latest: NaiveDateTime,
) -> Vec<Window> {
    let mut start = checkpoint.unwrap_or(first_connected);
    if start == latest {
        return Vec::new();
    }
    if start > latest {
        return vec![Window { start, end: start }];
    }

    let cap = Duration::days(MAX_WINDOW_DAYS);
    let mut out = Vec::new();
    while start < latest {
        let end = (start + cap).min(latest);
        out.push(Window { start, end });
        start = end;
    }
    out
}
