//! Run parameters supplied by the entry point.

use crate::source::{FetchWindow, SourceError, DEFAULT_FETCH_DAYS};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

pub const DEFAULT_OUTPUT_DIR: &str = "exports/data";
pub const STORE_FILE_NAME: &str = "sleep_data.csv";
const LOG_DIR_NAME: &str = "logs";

/// Parameters of one fetch-merge-report run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Trailing days fetched when `start_date` is unset.
    pub days: u32,
    /// Directory holding the store file and the dashboards.
    pub output_dir: PathBuf,
    /// Replace stored history instead of merging into it.
    pub overwrite: bool,
    pub debug: bool,
    /// Log directory; `<output_dir>/logs` when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            days: DEFAULT_FETCH_DAYS,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            overwrite: false,
            debug: false,
            log_dir: None,
        }
    }
}

impl RunConfig {
    pub fn store_path(&self) -> PathBuf {
        self.output_dir.join(STORE_FILE_NAME)
    }

    pub fn dashboard_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.join(LOG_DIR_NAME))
    }

    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }

    pub fn fetch_window(&self, today: NaiveDate) -> Result<FetchWindow, SourceError> {
        FetchWindow::resolve(self.start_date, self.end_date, self.days, today)
    }
}
