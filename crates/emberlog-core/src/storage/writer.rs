//! Duplicate/partial-record reconciliation.
//!
//! The remote frequently reports the most recent slots with only the key
//! populated, then settles with full data on a later poll. Blank rows are
//! suppressed outright; a key collision is resolved by a monotone
//! "more-detail-wins" merge, with ties going to the incoming (newer) data.

use chrono::Utc;
use tracing::{debug, info};

use crate::error::StorageError;
use crate::remote::ReportRow;
use crate::storage::database::{InsertOutcome, ReportStore};

/// Per-row outcome, accumulated into the run stats by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// New row inserted.
    Written,
    /// Key collision; incoming row had equal-or-more populated fields and
    /// overwrote the stored one.
    MergedDuplicate,
    /// Key collision; stored row had strictly more populated fields.
    KeptExisting,
    /// All measurement fields empty; never written.
    DiscardedBlank,
}

/// Routes incoming rows into the store with dedup-aware writes.
pub struct ReconciliationWriter<'a> {
    store: &'a ReportStore,
}

impl<'a> ReconciliationWriter<'a> {
    pub fn new(store: &'a ReportStore) -> Self {
        Self { store }
    }

    pub fn write(&self, row: &ReportRow) -> Result<WriteOutcome, StorageError> {
        if row.is_blank() {
            debug!(
                device = %row.device_name,
                slot = %row.timestamp(),
                "blank row discarded"
            );
            return Ok(WriteOutcome::DiscardedBlank);
        }

        let written_utc = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        match self.store.insert(row, &written_utc)? {
            InsertOutcome::Inserted => Ok(WriteOutcome::Written),
            InsertOutcome::KeyConflict => {
                let existing = self
                    .store
                    .fetch(&row.device_id, row.run_date, row.run_time)?
                    .ok_or_else(|| {
                        StorageError::Inconsistent(format!(
                            "key conflict for {} {} but row not found",
                            row.device_id,
                            row.timestamp()
                        ))
                    })?;

                if existing.populated() > row.populated() {
                    debug!(
                        device = %row.device_name,
                        slot = %row.timestamp(),
                        existing = existing.populated(),
                        incoming = row.populated(),
                        "stored row richer; incoming discarded"
                    );
                    Ok(WriteOutcome::KeptExisting)
                } else {
                    self.store.update(row, &written_utc)?;
                    info!(
                        device = %row.device_name,
                        slot = %row.timestamp(),
                        "duplicate slot updated with newer data"
                    );
                    Ok(WriteOutcome::MergedDuplicate)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::columns::MEASUREMENT_COLUMNS;
    use chrono::{NaiveDate, NaiveTime};

    fn row(populated: &[(usize, &str)]) -> ReportRow {
        let mut values = vec![String::new(); MEASUREMENT_COLUMNS.len()];
        for (idx, v) in populated {
            values[*idx] = (*v).to_string();
        }
        ReportRow {
            device_id: "t1".to_string(),
            device_name: "Main Floor".to_string(),
            run_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            run_time: NaiveTime::from_hms_opt(0, 5, 0).unwrap(),
            values,
        }
    }

    #[test]
    fn blank_row_is_never_written() {
        let store = ReportStore::open_memory().unwrap();
        let writer = ReconciliationWriter::new(&store);
        assert_eq!(writer.write(&row(&[])).unwrap(), WriteOutcome::DiscardedBlank);
        assert_eq!(store.row_count().unwrap(), 0);
    }

    #[test]
    fn richer_incoming_overwrites_stored() {
        let store = ReportStore::open_memory().unwrap();
        let writer = ReconciliationWriter::new(&store);
        assert_eq!(
            writer.write(&row(&[(0, "300")])).unwrap(),
            WriteOutcome::Written
        );
        assert_eq!(
            writer.write(&row(&[(0, "300"), (1, "60")])).unwrap(),
            WriteOutcome::MergedDuplicate
        );
        let stored = store
            .fetch("t1", NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), NaiveTime::from_hms_opt(0, 5, 0).unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(stored.populated(), 2);
    }

    #[test]
    fn poorer_incoming_is_discarded() {
        let store = ReportStore::open_memory().unwrap();
        let writer = ReconciliationWriter::new(&store);
        writer.write(&row(&[(0, "300"), (1, "60"), (2, "15")])).unwrap();
        assert_eq!(
            writer.write(&row(&[(0, "999")])).unwrap(),
            WriteOutcome::KeptExisting
        );
        let stored = store
            .fetch("t1", NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), NaiveTime::from_hms_opt(0, 5, 0).unwrap())
            .unwrap()
            .unwrap();
        // Original values untouched.
        assert_eq!(stored.values[0], "300");
        assert_eq!(stored.populated(), 3);
    }

    #[test]
    fn equal_population_favors_incoming() {
        let store = ReportStore::open_memory().unwrap();
        let writer = ReconciliationWriter::new(&store);
        writer.write(&row(&[(0, "old")])).unwrap();
        assert_eq!(
            writer.write(&row(&[(0, "new")])).unwrap(),
            WriteOutcome::MergedDuplicate
        );
        let stored = store
            .fetch("t1", NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), NaiveTime::from_hms_opt(0, 5, 0).unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(stored.values[0], "new");
    }

    #[test]
    fn merge_is_monotone_in_populated_count() {
        let store = ReportStore::open_memory().unwrap();
        let writer = ReconciliationWriter::new(&store);
        let sequences: &[&[(usize, &str)]] = &[
            &[(0, "a"), (1, "b")],
            &[(5, "x")],
            &[(0, "a"), (1, "b"), (2, "c")],
            &[(9, "y")],
        ];
        let mut max_seen = 0usize;
        for populated in sequences {
            let incoming = row(populated);
            max_seen = max_seen.max(incoming.populated());
            writer.write(&incoming).unwrap();
            let stored = store
                .fetch("t1", incoming.run_date, incoming.run_time)
                .unwrap()
                .unwrap();
            assert!(stored.populated() >= max_seen);
        }
    }

    #[test]
    fn replay_is_idempotent() {
        let store = ReportStore::open_memory().unwrap();
        let writer = ReconciliationWriter::new(&store);
        let incoming = row(&[(0, "300"), (3, "72")]);
        writer.write(&incoming).unwrap();
        let first = store
            .fetch("t1", incoming.run_date, incoming.run_time)
            .unwrap()
            .unwrap();
        // Same data again: merged in place, values unchanged, still one row.
        assert_eq!(
            writer.write(&incoming).unwrap(),
            WriteOutcome::MergedDuplicate
        );
        let second = store
            .fetch("t1", incoming.run_date, incoming.run_time)
            .unwrap()
            .unwrap();
        assert_eq!(store.row_count().unwrap(), 1);
        assert_eq!(first.values, second.values);
    }
}
