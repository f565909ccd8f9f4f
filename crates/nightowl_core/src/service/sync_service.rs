//! Fetch-merge-report use-case service.
//!
//! # Responsibility
//! - Normalize one batch of raw records and merge it into the store.
//! - Regenerate dashboards from the full stored history.
//!
//! # Invariants
//! - Normalization, load and write failures abort the run before reporting.
//! - Report failures never fail a run; they surface as warnings.
//! - An empty batch leaves the store file untouched.

use crate::model::sleep::SleepRecord;
use crate::normalize::{normalize_all, NormalizationError, RawRecord};
use crate::report::generator::{ReportError, ReportGenerator};
use crate::store::merge::merge;
use crate::store::sleep_store::{SleepStore, StoreError};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Instant;

/// Fatal run failure.
#[derive(Debug)]
pub enum SyncError {
    /// A fetched record could not be normalized.
    Normalization(NormalizationError),
    /// The store file could not be read or replaced.
    Store(StoreError),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normalization(err) => write!(f, "normalization failed: {err}"),
            Self::Store(err) => write!(f, "store failed: {err}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Normalization(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<NormalizationError> for SyncError {
    fn from(value: NormalizationError) -> Self {
        Self::Normalization(value)
    }
}

impl From<StoreError> for SyncError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Raw records handed to the run.
    pub fetched: usize,
    /// Records whose key was not stored before.
    pub inserted: usize,
    /// Stored records replaced by different values.
    pub replaced: usize,
    /// Records in the store after the run.
    pub stored: usize,
    /// Dashboard pages written.
    pub dashboards: Vec<PathBuf>,
    /// Non-fatal problems, one per line.
    pub warnings: Vec<String>,
}

/// Run service over a store implementation.
pub struct SyncService<S: SleepStore> {
    store: S,
    reports: Option<ReportGenerator>,
}

impl<S: SleepStore> SyncService<S> {
    /// Creates a service that only maintains the store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            reports: None,
        }
    }

    /// Attaches a dashboard generator run after every successful write.
    pub fn with_reports(mut self, reports: ReportGenerator) -> Self {
        self.reports = Some(reports);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs one batch through normalize, merge, write and report.
    ///
    /// # Errors
    /// - `Normalization` when any raw record is invalid; the store is untouched.
    /// - `Store` when the stored history cannot be loaded or replaced.
    pub fn run(&self, raw: &[RawRecord], overwrite: bool) -> Result<SyncReport, SyncError> {
        let started_at = Instant::now();
        let incoming = normalize_all(raw).map_err(|err| {
            warn!(
                "event=sync_run module=service status=error stage=normalize error={}",
                err
            );
            SyncError::from(err)
        })?;

        let existing = self.store.load()?;
        let mut report = SyncReport {
            fetched: raw.len(),
            ..SyncReport::default()
        };

        let history = if incoming.is_empty() {
            info!("event=sync_run module=service status=skip stage=write reason=no_new_records");
            existing
        } else {
            let outcome = merge(&existing, &incoming, overwrite);
            report.inserted = outcome.inserted;
            report.replaced = outcome.replaced;
            let records = outcome.into_records();
            self.store.write(&records)?;
            records
        };
        report.stored = history.len();

        self.generate_reports(&history, &mut report);

        info!(
            "event=sync_run module=service status=ok fetched={} inserted={} replaced={} stored={} dashboards={} warnings={} overwrite={} duration_ms={}",
            report.fetched,
            report.inserted,
            report.replaced,
            report.stored,
            report.dashboards.len(),
            report.warnings.len(),
            overwrite,
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }

    fn generate_reports(&self, history: &[SleepRecord], report: &mut SyncReport) {
        let Some(reports) = &self.reports else {
            return;
        };
        match reports.generate_all(history) {
            Ok(summary) => {
                report.dashboards = summary.written;
                report
                    .warnings
                    .extend(summary.failures.iter().map(ToString::to_string));
            }
            Err(err @ ReportError::DependencyMissing { .. }) => {
                report
                    .warnings
                    .push(format!("dashboards skipped: {err}"));
            }
            Err(err) => report.warnings.push(err.to_string()),
        }
    }
}
