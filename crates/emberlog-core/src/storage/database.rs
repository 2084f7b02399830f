//! The persisted report store.
//!
//! One append-style `runtime` table keyed by (device_id, run_date,
//! run_time) plus a write-audit timestamp and the 28 measurement columns.
//! Measurement fields store `''` for "not reported", mirroring the wire
//! format, so populated-field counting is a plain non-empty check. The
//! primary-key constraint is what makes "insert, catch conflict,
//! reconcile" safe as a single-writer idempotent write pattern.
//!
//! The checkpoint for a device is derived here, never cached: the latest
//! (run_date, run_time) among rows with at least one populated measurement.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::{params, params_from_iter, Connection};
use tracing::debug;

use crate::error::StorageError;
use crate::remote::ReportRow;
use crate::storage::columns::db_columns;

/// A row as stored, read back for reconciliation.
#[derive(Debug, Clone)]
pub struct StoredRow {
    pub record_written_utc: String,
    pub device_name: String,
    pub device_id: String,
    pub run_date: String,
    pub run_time: String,
    pub values: Vec<String>,
}

impl StoredRow {
    /// Count of non-empty measurement fields.
    pub fn populated(&self) -> usize {
        self.values.iter().filter(|v| !v.is_empty()).count()
    }
}

/// Result of an insert attempt against the unique key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    KeyConflict,
}

/// SQLite store for the historical report rows.
pub struct ReportStore {
    conn: Connection,
}

impl ReportStore {
    /// Open (or create) the database and ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Inconsistent(format!(
                    "cannot create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|source| StorageError::OpenFailed {
            path: ":memory:".into(),
            source,
        })?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        let mut sql = String::from(
            "CREATE TABLE IF NOT EXISTS runtime (
                record_written_utc TEXT NOT NULL,
                device_name        TEXT NOT NULL,
                device_id          TEXT NOT NULL,
                run_date           TEXT NOT NULL,
                run_time           TEXT NOT NULL,\n",
        );
        for col in db_columns() {
            let _ = writeln!(sql, "                {col} TEXT NOT NULL DEFAULT '',");
        }
        sql.push_str(
            "                PRIMARY KEY (device_id, run_date, run_time)
            );

            CREATE INDEX IF NOT EXISTS idx_runtime_device_id ON runtime(device_id);
            CREATE INDEX IF NOT EXISTS idx_runtime_device_name ON runtime(device_name);",
        );
        self.conn
            .execute_batch(&sql)
            .map_err(StorageError::MigrationFailed)
    }

    /// Latest (run_date, run_time) of any non-blank row for this device,
    /// or None when the device has no real data yet.
    pub fn last_checkpoint(
        &self,
        device_name: &str,
    ) -> Result<Option<NaiveDateTime>, StorageError> {
        let not_blank = db_columns()
            .map(|c| format!("{c} = ''"))
            .collect::<Vec<_>>()
            .join(" AND ");
        let sql = format!(
            "SELECT run_date, run_time FROM runtime
             WHERE device_name = ?1 AND NOT ({not_blank})
             ORDER BY run_date DESC, run_time DESC LIMIT 1"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![device_name])?;
        match rows.next()? {
            Some(row) => {
                let date: String = row.get(0)?;
                let time: String = row.get(1)?;
                let parsed = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                    .ok()
                    .zip(NaiveTime::parse_from_str(&time, "%H:%M:%S").ok())
                    .map(|(d, t)| d.and_time(t));
                match parsed {
                    Some(at) => Ok(Some(at)),
                    None => Err(StorageError::Inconsistent(format!(
                        "unparseable checkpoint '{date} {time}' for device '{device_name}'"
                    ))),
                }
            }
            None => {
                debug!(device = device_name, "no checkpoint; device has no non-blank rows");
                Ok(None)
            }
        }
    }

    /// Attempt an insert; a primary-key collision is reported, not raised.
    pub fn insert(
        &self,
        row: &ReportRow,
        record_written_utc: &str,
    ) -> Result<InsertOutcome, StorageError> {
        let mut cols = vec![
            "record_written_utc".to_string(),
            "device_name".to_string(),
            "device_id".to_string(),
            "run_date".to_string(),
            "run_time".to_string(),
        ];
        cols.extend(db_columns().map(str::to_string));
        let placeholders = (1..=cols.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO runtime ({}) VALUES ({placeholders})",
            cols.join(", ")
        );

        let mut bind: Vec<String> = vec![
            record_written_utc.to_string(),
            row.device_name.clone(),
            row.device_id.clone(),
            row.run_date.format("%Y-%m-%d").to_string(),
            row.run_time.format("%H:%M:%S").to_string(),
        ];
        bind.extend(row.values.iter().cloned());

        match self.conn.execute(&sql, params_from_iter(bind.iter())) {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Ok(InsertOutcome::KeyConflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Read back the stored row for a key, if any.
    pub fn fetch(
        &self,
        device_id: &str,
        run_date: NaiveDate,
        run_time: NaiveTime,
    ) -> Result<Option<StoredRow>, StorageError> {
        let cols = db_columns().collect::<Vec<_>>().join(", ");
        let sql = format!(
            "SELECT record_written_utc, device_name, device_id, run_date, run_time, {cols}
             FROM runtime WHERE device_id = ?1 AND run_date = ?2 AND run_time = ?3"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![
            device_id,
            run_date.format("%Y-%m-%d").to_string(),
            run_time.format("%H:%M:%S").to_string(),
        ])?;
        match rows.next()? {
            Some(row) => {
                let mut values = Vec::with_capacity(db_columns().count());
                for idx in 0..db_columns().count() {
                    values.push(row.get::<_, String>(5 + idx)?);
                }
                Ok(Some(StoredRow {
                    record_written_utc: row.get(0)?,
                    device_name: row.get(1)?,
                    device_id: row.get(2)?,
                    run_date: row.get(3)?,
                    run_time: row.get(4)?,
                    values,
                }))
            }
            None => Ok(None),
        }
    }

    /// Overwrite the measurement fields and audit timestamp for a key.
    pub fn update(
        &self,
        row: &ReportRow,
        record_written_utc: &str,
    ) -> Result<(), StorageError> {
        let assignments = std::iter::once("record_written_utc = ?1".to_string())
            .chain(
                db_columns()
                    .enumerate()
                    .map(|(i, col)| format!("{col} = ?{}", i + 2)),
            )
            .collect::<Vec<_>>()
            .join(", ");
        let n = db_columns().count();
        let sql = format!(
            "UPDATE runtime SET {assignments}
             WHERE device_id = ?{} AND run_date = ?{} AND run_time = ?{}",
            n + 2,
            n + 3,
            n + 4
        );

        let mut bind: Vec<String> = vec![record_written_utc.to_string()];
        bind.extend(row.values.iter().cloned());
        bind.push(row.device_id.clone());
        bind.push(row.run_date.format("%Y-%m-%d").to_string());
        bind.push(row.run_time.format("%H:%M:%S").to_string());

        self.conn.execute(&sql, params_from_iter(bind.iter()))?;
        Ok(())
    }

    /// Distinct device names present in the store.
    pub fn device_names(&self) -> Result<Vec<String>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT device_name FROM runtime ORDER BY device_name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Total stored rows (for the CLI status output).
    pub fn row_count(&self) -> Result<u64, StorageError> {
        let count: u64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM runtime", [], |row| row.get(0))?;
        Ok(count)
    }
}
