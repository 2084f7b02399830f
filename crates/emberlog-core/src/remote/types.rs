//! Response types for the remote API, with explicit parsers for the two
//! externally-versioned wire shapes we bind to a fixed local schema: the
//! colon-delimited summary tuple and the comma-delimited report row.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::RemoteError;
use crate::storage::columns::MEASUREMENT_COLUMNS;

/// Opaque, lexicographically sortable version tokens per device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionMarker {
    pub thermostat: String,
    pub alerts: String,
    pub runtime: String,
    /// Upper bound on how far the report API may safely be queried.
    pub interval: String,
}

/// One entry of the summary call's revision list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub id: String,
    pub name: String,
    pub connected: bool,
    pub revisions: RevisionMarker,
}

impl DeviceSummary {
    /// Parse a colon-delimited revision tuple
    /// `id:name:connected:thermostatRev:alertsRev:runtimeRev:intervalRev`.
    pub fn parse(line: &str) -> Result<Self, RemoteError> {
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() != 7 {
            return Err(RemoteError::Malformed(format!(
                "expected 7 colon-delimited summary fields, got {}: '{line}'",
                fields.len()
            )));
        }
        Ok(DeviceSummary {
            id: fields[0].to_string(),
            name: fields[1].to_string(),
            connected: fields[2].eq_ignore_ascii_case("true"),
            revisions: RevisionMarker {
                thermostat: fields[3].to_string(),
                alerts: fields[4].to_string(),
                runtime: fields[5].to_string(),
                interval: fields[6].to_string(),
            },
        })
    }
}

/// A registered device. Read-only from this system's perspective.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub first_connected: NaiveDateTime,
}

/// PIN + authorization code from the authorize endpoint.
#[derive(Debug, Clone)]
pub struct AuthGrant {
    pub pin: String,
    pub code: String,
}

/// Access/refresh token pair from the token endpoint.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp derived from `expires_in`, when supplied.
    pub expires_at: Option<i64>,
}

/// One fixed-width report observation, keyed by (device, run_date, run_time).
///
/// `values` holds the 28 measurement fields in [`MEASUREMENT_COLUMNS`]
/// order; an empty string means the remote has not (yet) reported that
/// field for the slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub device_id: String,
    pub device_name: String,
    pub run_date: NaiveDate,
    pub run_time: NaiveTime,
    pub values: Vec<String>,
}

impl ReportRow {
    /// Parse one report CSV line: `YYYY-MM-DD,HH:MM:SS,v1,...,v28`.
    ///
    /// The remote occasionally returns rows with a different field count;
    /// those are malformed here and skipped (not fatal) by the caller. A
    /// trailing delimiter, which the remote always emits, is tolerated.
    pub fn from_csv(device_id: &str, device_name: &str, line: &str) -> Result<Self, RemoteError> {
        let trimmed = line.strip_suffix(',').unwrap_or(line);
        let fields: Vec<&str> = trimmed.split(',').collect();
        let expected = 2 + MEASUREMENT_COLUMNS.len();
        if fields.len() != expected {
            return Err(RemoteError::Malformed(format!(
                "expected {expected} report fields, got {}: '{line}'",
                fields.len()
            )));
        }
        let run_date = NaiveDate::parse_from_str(fields[0], "%Y-%m-%d").map_err(|e| {
            RemoteError::Malformed(format!("bad run_date '{}': {e}", fields[0]))
        })?;
        let run_time = NaiveTime::parse_from_str(fields[1], "%H:%M:%S").map_err(|e| {
            RemoteError::Malformed(format!("bad run_time '{}': {e}", fields[1]))
        })?;
        Ok(ReportRow {
            device_id: device_id.to_string(),
            device_name: device_name.to_string(),
            run_date,
            run_time,
            values: fields[2..].iter().map(|s| s.trim().to_string()).collect(),
        })
    }

    /// Count of non-empty measurement fields.
    pub fn populated(&self) -> usize {
        self.values.iter().filter(|v| !v.is_empty()).count()
    }

    /// A blank row carries only its key: a reporting artifact, never written.
    pub fn is_blank(&self) -> bool {
        self.populated() == 0
    }

    /// The observation time of this row's slot.
    pub fn timestamp(&self) -> NaiveDateTime {
        self.run_date.and_time(self.run_time)
    }
}
