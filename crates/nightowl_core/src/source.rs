//! Record sources and fetch windows.
//!
//! # Responsibility
//! - Define the seam through which raw records enter the pipeline.
//! - Resolve the requested date window from run parameters.
//! - Read records exported from the remote service to a JSON file.
//!
//! # Invariants
//! - Sources return raw records untouched; normalization happens downstream.

use crate::normalize::{extract_date, RawRecord};
use chrono::{Duration, NaiveDate};
use log::info;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_FETCH_DAYS: u32 = 7;

/// Record source failure. Fatal to a run.
#[derive(Debug)]
pub enum SourceError {
    InvalidWindow { start: NaiveDate, end: NaiveDate },
    DaysOutOfRange { days: u32, today: NaiveDate },
    Io { path: PathBuf, source: io::Error },
    Json { path: PathBuf, source: serde_json::Error },
    UnexpectedShape { path: PathBuf, message: String },
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidWindow { start, end } => {
                write!(f, "start date {start} is after end date {end}")
            }
            Self::DaysOutOfRange { days, today } => {
                write!(f, "{days} days before {today} is not a representable date")
            }
            Self::Io { path, source } => write!(f, "reading `{}`: {source}", path.display()),
            Self::Json { path, source } => write!(f, "parsing `{}`: {source}", path.display()),
            Self::UnexpectedShape { path, message } => {
                write!(f, "unexpected payload in `{}`: {message}", path.display())
            }
        }
    }
}

impl Error for SourceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidWindow { .. } | Self::DaysOutOfRange { .. } => None,
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::UnexpectedShape { .. } => None,
        }
    }
}

/// Inclusive date range requested from a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FetchWindow {
    /// Resolves optional run parameters into a concrete window.
    ///
    /// `end` defaults to `today`; `start` defaults to `today - days`.
    ///
    /// # Errors
    /// - `DaysOutOfRange` when `today - days` leaves the calendar range.
    /// - `InvalidWindow` when `start` is after `end`.
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        days: u32,
        today: NaiveDate,
    ) -> Result<Self, SourceError> {
        let end = end.unwrap_or(today);
        let start = match start {
            Some(start) => start,
            None => today
                .checked_sub_signed(Duration::days(i64::from(days)))
                .ok_or(SourceError::DaysOutOfRange { days, today })?,
        };
        if start > end {
            return Err(SourceError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Producer of raw sleep records.
pub trait RecordSource {
    /// Short identifier used in logs.
    fn source_id(&self) -> &str;
    fn fetch(&self, window: &FetchWindow) -> Result<Vec<RawRecord>, SourceError>;
}

/// Reads records exported from the remote service.
///
/// Accepts a bare JSON array or the service's `{ "data": [...] }` envelope.
#[derive(Debug, Clone)]
pub struct JsonExportSource {
    path: PathBuf,
}

impl JsonExportSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unexpected(&self, message: impl Into<String>) -> SourceError {
        SourceError::UnexpectedShape {
            path: self.path.clone(),
            message: message.into(),
        }
    }
}

impl RecordSource for JsonExportSource {
    fn source_id(&self) -> &str {
        "json_export"
    }

    fn fetch(&self, window: &FetchWindow) -> Result<Vec<RawRecord>, SourceError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        let payload: Value = serde_json::from_str(&text).map_err(|source| SourceError::Json {
            path: self.path.clone(),
            source,
        })?;

        let items = match payload {
            Value::Array(items) => items,
            Value::Object(mut envelope) => match envelope.remove("data") {
                Some(Value::Array(items)) => items,
                _ => return Err(self.unexpected("object payload has no `data` array")),
            },
            _ => return Err(self.unexpected("expected an array or an object")),
        };

        let total = items.len();
        let mut records = Vec::with_capacity(total);
        for (index, item) in items.into_iter().enumerate() {
            let Value::Object(record) = item else {
                return Err(self.unexpected(format!("item {index} is not an object")));
            };
            // Undated records pass through so normalization reports them.
            match extract_date(&record) {
                Ok(date) if !window.contains(date) => continue,
                _ => records.push(record),
            }
        }

        info!(
            "event=source_fetch module=source status=ok source={} start={} end={} total={} kept={}",
            self.source_id(),
            window.start,
            window.end,
            total,
            records.len()
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::{FetchWindow, JsonExportSource, RecordSource, SourceError};
    use chrono::NaiveDate;
    use std::fs;

    fn day(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn window_defaults_to_trailing_days() {
        let window = FetchWindow::resolve(None, None, 7, day("2024-03-10")).unwrap();
        assert_eq!(window.start, day("2024-03-03"));
        assert_eq!(window.end, day("2024-03-10"));
    }

    #[test]
    fn window_rejects_reversed_range() {
        let err = FetchWindow::resolve(
            Some(day("2024-03-10")),
            Some(day("2024-03-01")),
            7,
            day("2024-03-10"),
        )
        .unwrap_err();
        assert!(matches!(err, SourceError::InvalidWindow { .. }));
    }

    #[test]
    fn window_rejects_days_beyond_calendar() {
        let err = FetchWindow::resolve(None, None, u32::MAX, day("2024-03-10")).unwrap_err();
        assert!(matches!(err, SourceError::DaysOutOfRange { days: u32::MAX, .. }));

        let explicit =
            FetchWindow::resolve(Some(day("2024-03-01")), None, u32::MAX, day("2024-03-10"));
        assert!(explicit.is_ok());
    }

    #[test]
    fn export_envelope_is_filtered_to_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sleep.json");
        fs::write(
            &path,
            r#"{"data":[{"day":"2024-03-01","score":70},{"day":"2024-03-05","score":80},{"score":1}]}"#,
        )
        .unwrap();

        let window = FetchWindow::resolve(Some(day("2024-03-02")), Some(day("2024-03-06")), 7, day("2024-03-06")).unwrap();
        let records = JsonExportSource::new(&path).fetch(&window).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["day"], "2024-03-05");
        assert!(records[1].get("day").is_none());
    }

    #[test]
    fn scalar_payload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sleep.json");
        fs::write(&path, "42").unwrap();
        let window = FetchWindow::resolve(None, None, 7, day("2024-03-06")).unwrap();
        let err = JsonExportSource::new(&path).fetch(&window).unwrap_err();
        assert!(matches!(err, SourceError::UnexpectedShape { .. }));
    }
}
