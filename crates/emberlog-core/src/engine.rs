//! Per-run sync orchestration.
//!
//! One run is a straight line: activate the credential, fetch the summary
//! and device list, then walk each device's report windows from its stored
//! checkpoint up to the remote's interval revision, writing rows through
//! the reconciliation path. Devices are independent; a device missing from
//! the summary or carrying a garbage revision is skipped and counted, not
//! fatal. Remote failures that survive the retry budget abort the run --
//! the checkpoint guarantees the next run resumes where this one stopped.

use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::error::SyncError;
use crate::remote::{AuthApi, Device, DeviceSummary, ReportApi, ReportRow};
use crate::retry::with_retry;
use crate::revision;
use crate::storage::{ReconciliationWriter, ReportStore, WriteOutcome};
use crate::token::TokenManager;
use crate::window::windows;

/// Counters for one device within a run.
#[derive(Debug, Default, Clone)]
pub struct DeviceStats {
    pub name: String,
    pub rows_written: u64,
    pub duplicates_merged: u64,
    pub duplicates_kept: u64,
    pub blanks_discarded: u64,
    pub malformed_rows: u64,
    pub windows_requested: u64,
    pub windows_skipped: u64,
    pub retries: u64,
}

impl DeviceStats {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

/// Run-wide totals plus the per-device breakdown. Populated even when the
/// run fails partway, so the summary printed at exit reflects the work
/// actually done.
#[derive(Debug, Default)]
pub struct RunStats {
    pub rows_written: u64,
    pub duplicates_merged: u64,
    pub duplicates_kept: u64,
    pub blanks_discarded: u64,
    pub malformed_rows: u64,
    pub windows_requested: u64,
    pub windows_skipped: u64,
    pub retries: u64,
    pub devices_synced: u64,
    pub devices_skipped: u64,
    pub devices: Vec<DeviceStats>,
}

impl RunStats {
    fn absorb(&mut self, d: DeviceStats) {
        self.rows_written += d.rows_written;
        self.duplicates_merged += d.duplicates_merged;
        self.duplicates_kept += d.duplicates_kept;
        self.blanks_discarded += d.blanks_discarded;
        self.malformed_rows += d.malformed_rows;
        self.windows_requested += d.windows_requested;
        self.windows_skipped += d.windows_skipped;
        self.retries += d.retries;
        self.devices.push(d);
    }
}

/// Orchestrates one sync run over all registered devices, sequentially.
pub struct SyncEngine<R: ReportApi, A: AuthApi> {
    api: R,
    tokens: TokenManager<A>,
    store: ReportStore,
    revision_cache: PathBuf,
}

impl<R: ReportApi, A: AuthApi> SyncEngine<R, A> {
    pub fn new(
        api: R,
        tokens: TokenManager<A>,
        store: ReportStore,
        revision_cache: PathBuf,
    ) -> Self {
        Self {
            api,
            tokens,
            store,
            revision_cache,
        }
    }

    pub fn store(&self) -> &ReportStore {
        &self.store
    }

    /// Execute one full run. `stats` is filled in as work happens so the
    /// caller can report it whether or not the run completed.
    pub fn run(&mut self, stats: &mut RunStats) -> Result<(), SyncError> {
        let Self {
            api,
            tokens,
            store,
            revision_cache,
        } = self;

        tokens.ensure_active()?;

        let summaries = with_retry("thermostat-summary", tokens, |token| {
            api.thermostat_summary(token)
        })?;
        stats.retries += u64::from(summaries.retries);
        let summaries = summaries.value;
        info!(devices = summaries.len(), "revision summary fetched");

        if let Err(e) = revision::write_cache(revision_cache, &summaries) {
            warn!(
                path = %revision_cache.display(),
                error = %e,
                "revision cache write failed; continuing with in-memory summaries"
            );
        }

        let devices = with_retry("thermostat-details", tokens, |token| api.thermostats(token))?;
        stats.retries += u64::from(devices.retries);
        let devices = devices.value;

        for device in &devices {
            let Some(summary) = summaries.iter().find(|s| s.id == device.id) else {
                warn!(device = %device.name, id = %device.id, "device absent from summary; skipped");
                stats.devices_skipped += 1;
                continue;
            };
            let Some(latest) = revision::parse_revision(&summary.revisions.interval) else {
                error!(
                    device = %device.name,
                    revision = %summary.revisions.interval,
                    "unparseable interval revision; device skipped"
                );
                stats.devices_skipped += 1;
                continue;
            };

            let mut dstats = DeviceStats::new(&device.name);
            let result = sync_device(
                &*api,
                tokens,
                store,
                device,
                summary,
                latest,
                &mut dstats,
            );
            let synced = result.is_ok();
            info!(
                device = %device.name,
                rows_written = dstats.rows_written,
                duplicates_merged = dstats.duplicates_merged,
                duplicates_kept = dstats.duplicates_kept,
                blanks_discarded = dstats.blanks_discarded,
                malformed_rows = dstats.malformed_rows,
                windows = dstats.windows_requested,
                complete = synced,
                "device sync finished"
            );
            stats.absorb(dstats);
            result?;
            stats.devices_synced += 1;
        }

        Ok(())
    }
}

fn sync_device<R: ReportApi, A: AuthApi>(
    api: &R,
    tokens: &mut TokenManager<A>,
    store: &ReportStore,
    device: &Device,
    summary: &DeviceSummary,
    latest: chrono::NaiveDateTime,
    stats: &mut DeviceStats,
) -> Result<(), SyncError> {
    if !summary.connected {
        warn!(device = %device.name, "device reports disconnected; syncing available history");
    }

    let checkpoint = store.last_checkpoint(&device.name)?;
    let plan = windows(checkpoint, device.first_connected, latest);
    info!(
        device = %device.name,
        checkpoint = %checkpoint.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string()),
        latest = %latest,
        windows = plan.len(),
        "window plan computed"
    );

    let writer = ReconciliationWriter::new(store);
    for window in &plan {
        // No data can exist past the interval revision; asking would waste
        // a remote call (covers the degenerate future-start window).
        if revision::to_revision_string(window.start) > summary.revisions.interval {
            stats.windows_skipped += 1;
            continue;
        }

        let lines = with_retry("runtime-report", tokens, |token| {
            api.runtime_report(token, &device.id, window)
        })?;
        stats.retries += u64::from(lines.retries);
        stats.windows_requested += 1;

        for line in &lines.value {
            let row = match ReportRow::from_csv(&device.id, &device.name, line) {
                Ok(row) => row,
                Err(e) => {
                    warn!(device = %device.name, error = %e, "malformed report row skipped");
                    stats.malformed_rows += 1;
                    continue;
                }
            };
            match writer.write(&row)? {
                WriteOutcome::Written => stats.rows_written += 1,
                WriteOutcome::MergedDuplicate => stats.duplicates_merged += 1,
                WriteOutcome::KeptExisting => stats.duplicates_kept += 1,
                WriteOutcome::DiscardedBlank => stats.blanks_discarded += 1,
            }
        }
    }

    Ok(())
}
