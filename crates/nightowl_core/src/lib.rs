//! Core domain logic for NightOwl.
//! Normalizes fetched sleep records, keeps the deduplicated history on disk
//! and renders the dashboards derived from it.

pub mod config;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod persist;
pub mod report;
pub mod service;
pub mod source;
pub mod store;

pub use config::{RunConfig, DEFAULT_OUTPUT_DIR, STORE_FILE_NAME};
pub use logging::{init_logging, logging_status};
pub use model::sleep::{
    classify_nap, DedupKey, Metric, SleepRecord, SleepValidationError, Unit,
    NAP_THRESHOLD_SECONDS,
};
pub use normalize::{normalize, normalize_all, NormalizationError, RawRecord};
pub use report::generator::{charts_available, ReportError, ReportGenerator, ReportSummary};
pub use report::navigation::{build_breadcrumbs, Breadcrumb};
pub use report::template::{ChartKind, ChartSpec, Template, TemplateError, TemplateRegistry};
pub use service::sync_service::{SyncError, SyncReport, SyncService};
pub use source::{FetchWindow, JsonExportSource, RecordSource, SourceError, DEFAULT_FETCH_DAYS};
pub use store::merge::{merge, MergeOutcome};
pub use store::sleep_store::{CsvSleepStore, SleepStore, StoreError, StoreResult};
