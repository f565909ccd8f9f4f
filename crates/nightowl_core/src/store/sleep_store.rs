//! Sleep store contract and CSV implementation.
//!
//! # Responsibility
//! - Load and write the persisted sleep history.
//! - Keep the CSV column layout inside the storage boundary.
//!
//! # Invariants
//! - The header is the fixed column set, in fixed order.
//! - `is_nap` is stored as `0`/`1`; absent metrics as empty cells.
//! - Loaded history is sorted by dedup key, with one record per key.
//! - Writes replace the file atomically.

use crate::model::sleep::{Metric, SleepRecord};
use crate::persist::write_atomic;
use chrono::NaiveDate;
use log::{error, info};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const DATE_COLUMN: &str = "date";
pub const NAP_COLUMN: &str = "is_nap";

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage failure. Always fatal to a run.
#[derive(Debug)]
pub enum StoreError {
    Io { path: PathBuf, source: io::Error },
    Csv(csv::Error),
    Header { expected: String, found: String },
    Malformed { line: u64, message: String },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "store file `{}`: {source}", path.display()),
            Self::Csv(err) => write!(f, "store csv error: {err}"),
            Self::Header { expected, found } => {
                write!(f, "store header mismatch: expected `{expected}`, found `{found}`")
            }
            Self::Malformed { line, message } => {
                write!(f, "malformed store row at line {line}: {message}")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Csv(err) => Some(err),
            Self::Header { .. } => None,
            Self::Malformed { .. } => None,
        }
    }
}

impl From<csv::Error> for StoreError {
    fn from(value: csv::Error) -> Self {
        if let csv::ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } = value.kind()
        {
            return Self::Malformed {
                line: pos.as_ref().map(csv::Position::line).unwrap_or(0),
                message: format!("expected {expected_len} columns, found {len}"),
            };
        }
        Self::Csv(value)
    }
}

/// Persisted column names in order.
pub fn columns() -> Vec<&'static str> {
    let mut columns = vec![DATE_COLUMN, NAP_COLUMN];
    columns.extend(Metric::ALL.iter().map(|metric| metric.column()));
    columns
}

/// Persistence contract for the sleep history.
pub trait SleepStore {
    /// Returns stored records; empty when nothing was stored yet.
    fn load(&self) -> StoreResult<Vec<SleepRecord>>;
    /// Replaces the stored records.
    fn write(&self, records: &[SleepRecord]) -> StoreResult<()>;
}

/// CSV file backed sleep store.
#[derive(Debug, Clone)]
pub struct CsvSleepStore {
    path: PathBuf,
}

impl CsvSleepStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SleepStore for CsvSleepStore {
    fn load(&self) -> StoreResult<Vec<SleepRecord>> {
        load(&self.path)
    }

    fn write(&self, records: &[SleepRecord]) -> StoreResult<()> {
        write(&self.path, records)
    }
}

/// Loads the sleep history at `path`.
///
/// A missing file yields an empty history.
pub fn load(path: &Path) -> StoreResult<Vec<SleepRecord>> {
    if !path.exists() {
        info!(
            "event=store_load module=store status=skip reason=missing path={}",
            path.display()
        );
        return Ok(Vec::new());
    }

    let started_at = Instant::now();
    let bytes = std::fs::read(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    match decode(&bytes) {
        Ok(records) => {
            info!(
                "event=store_load module=store status=ok records={} duration_ms={}",
                records.len(),
                started_at.elapsed().as_millis()
            );
            Ok(records)
        }
        Err(err) => {
            error!(
                "event=store_load module=store status=error path={} error={}",
                path.display(),
                err
            );
            Err(err)
        }
    }
}

/// Atomically replaces the sleep history at `path`.
pub fn write(path: &Path, records: &[SleepRecord]) -> StoreResult<()> {
    let started_at = Instant::now();
    let bytes = encode(records)?;
    write_atomic(path, &bytes).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        "event=store_write module=store status=ok records={} duration_ms={}",
        records.len(),
        started_at.elapsed().as_millis()
    );
    Ok(())
}

/// Serializes records to CSV bytes, header included.
pub fn encode(records: &[SleepRecord]) -> StoreResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(columns())?;
    for record in records {
        let mut row = Vec::with_capacity(Metric::ALL.len() + 2);
        row.push(record.date.format("%Y-%m-%d").to_string());
        row.push(if record.is_nap { "1" } else { "0" }.to_string());
        row.extend(Metric::ALL.iter().map(|metric| metric.to_cell(record)));
        writer.write_record(&row)?;
    }
    writer.into_inner().map_err(|err| StoreError::Io {
        path: PathBuf::new(),
        source: err.into_error(),
    })
}

/// Parses CSV bytes produced by [`encode`].
///
/// Rows may appear in any order; a repeated `(date, is_nap)` key is malformed.
pub fn decode(bytes: &[u8]) -> StoreResult<Vec<SleepRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);

    let expected = columns();
    let header = reader.headers()?.clone();
    if header.iter().ne(expected.iter().copied()) {
        return Err(StoreError::Header {
            expected: expected.join(","),
            found: header.iter().collect::<Vec<_>>().join(","),
        });
    }

    let mut by_key = BTreeMap::new();
    for row in reader.records() {
        let row = row?;
        let line = row.position().map(csv::Position::line).unwrap_or(0);
        let record =
            decode_row(&row).map_err(|message| StoreError::Malformed { line, message })?;
        let key = record.dedup_key();
        if by_key.insert(key, record).is_some() {
            return Err(StoreError::Malformed {
                line,
                message: format!(
                    "duplicate session for date {} (is_nap={})",
                    key.date, key.is_nap
                ),
            });
        }
    }
    Ok(by_key.into_values().collect())
}

fn decode_row(row: &csv::StringRecord) -> Result<SleepRecord, String> {
    let date_cell = row.get(0).unwrap_or_default();
    if date_cell.is_empty() {
        return Err("empty date".to_string());
    }
    let date = NaiveDate::parse_from_str(date_cell, "%Y-%m-%d")
        .map_err(|err| format!("invalid date `{date_cell}`: {err}"))?;

    let mut record = SleepRecord::new(date);
    record.is_nap = match row.get(1).unwrap_or_default() {
        "0" => false,
        "1" => true,
        other => return Err(format!("is_nap must be 0 or 1, got `{other}`")),
    };

    for (index, metric) in Metric::ALL.iter().enumerate() {
        let cell = row.get(index + 2).unwrap_or_default();
        metric
            .set_from_cell(&mut record, cell)
            .map_err(|message| format!("column `{}`: {message}", metric.column()))?;
    }
    record.validate().map_err(|err| err.to_string())?;
    Ok(record)
}
