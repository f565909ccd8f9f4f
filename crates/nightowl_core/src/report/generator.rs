//! Dashboard generation across the template catalog.
//!
//! # Responsibility
//! - Render one page per registry template from the stored history.
//! - Isolate template failures from each other.
//!
//! # Invariants
//! - Nap sessions never reach a page.
//! - Pages are rebuilt in full and replaced atomically.
//! - A failing template never prevents the remaining ones from rendering.

use crate::logging::panic_summary;
use crate::model::sleep::SleepRecord;
use crate::persist::write_atomic;
use crate::report::aggregate::main_sleep_only;
use crate::report::navigation::build_breadcrumbs;
use crate::report::page::{render_page, DashboardPage, RenderedChart};
use crate::report::template::{Template, TemplateRegistry};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Instant;

const CHART_DEPENDENCY: &str = "plotly (cargo feature `charts`)";

/// Report failures. Neither variant is fatal to a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    /// The charting backend is not compiled in; no page can be built.
    DependencyMissing { dependency: &'static str },
    /// One template failed to render or write.
    Render { template: String, message: String },
}

impl Display for ReportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DependencyMissing { dependency } => {
                write!(f, "dashboard generation requires {dependency}")
            }
            Self::Render { template, message } => {
                write!(f, "dashboard `{template}` failed: {message}")
            }
        }
    }
}

impl Error for ReportError {}

/// Outcome of one generation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportSummary {
    /// Pages written, in registry order.
    pub written: Vec<PathBuf>,
    /// Per-template failures, in registry order.
    pub failures: Vec<ReportError>,
}

/// Whether the charting backend is compiled in.
pub fn charts_available() -> bool {
    cfg!(feature = "charts")
}

/// Builds dashboard pages for every template of a registry.
pub struct ReportGenerator {
    registry: TemplateRegistry,
    output_dir: PathBuf,
}

impl ReportGenerator {
    pub fn new(registry: TemplateRegistry, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            output_dir: output_dir.into(),
        }
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Renders every template from `records`.
    ///
    /// # Errors
    /// - `DependencyMissing` when no chart backend is available; nothing is
    ///   written in that case.
    ///
    /// Template failures are reported in [`ReportSummary::failures`].
    pub fn generate_all(&self, records: &[SleepRecord]) -> Result<ReportSummary, ReportError> {
        if !charts_available() {
            warn!("event=report_generate module=report status=skip reason=dependency_missing");
            return Err(ReportError::DependencyMissing {
                dependency: CHART_DEPENDENCY,
            });
        }

        let started_at = Instant::now();
        let filtered = main_sleep_only(records);
        if filtered.is_empty() {
            warn!("event=report_generate module=report status=empty reason=no_main_sleep_records");
        }
        let generated_at = chrono::Local::now().format("%Y-%m-%d %H:%M").to_string();

        let mut summary = ReportSummary::default();
        for template in self.registry.iter() {
            match self.render_isolated(template, &filtered, &generated_at) {
                Ok(path) => summary.written.push(path),
                Err(err) => {
                    warn!(
                        "event=report_template module=report status=error template={} error={}",
                        template.name, err
                    );
                    summary.failures.push(err);
                }
            }
        }

        info!(
            "event=report_generate module=report status=ok written={} failed={} records={} duration_ms={}",
            summary.written.len(),
            summary.failures.len(),
            filtered.len(),
            started_at.elapsed().as_millis()
        );
        Ok(summary)
    }

    /// Renders a single template by name.
    pub fn generate_template(
        &self,
        name: &str,
        records: &[SleepRecord],
    ) -> Result<PathBuf, ReportError> {
        if !charts_available() {
            return Err(ReportError::DependencyMissing {
                dependency: CHART_DEPENDENCY,
            });
        }
        let template = self.registry.get(name).ok_or_else(|| ReportError::Render {
            template: name.to_string(),
            message: "template is not registered".to_string(),
        })?;
        let generated_at = chrono::Local::now().format("%Y-%m-%d %H:%M").to_string();
        self.render_isolated(template, &main_sleep_only(records), &generated_at)
    }

    fn render_isolated(
        &self,
        template: &Template,
        records: &[SleepRecord],
        generated_at: &str,
    ) -> Result<PathBuf, ReportError> {
        panic::catch_unwind(AssertUnwindSafe(|| {
            self.render_template(template, records, generated_at)
        }))
        .unwrap_or_else(|payload| {
            Err(render_error(
                template,
                format!("panic: {}", panic_summary(payload.as_ref())),
            ))
        })
    }

    fn render_template(
        &self,
        template: &Template,
        records: &[SleepRecord],
        generated_at: &str,
    ) -> Result<PathBuf, ReportError> {
        #[cfg(test)]
        tests::fail_if_requested(&template.name);

        let charts = build_template_charts(template, records)?;
        let breadcrumbs = build_breadcrumbs(&self.registry, &template.name);
        let html = render_page(&DashboardPage {
            template,
            breadcrumbs: &breadcrumbs,
            charts: &charts,
            records,
            generated_at: generated_at.to_string(),
        })
        .map_err(|err| render_error(template, format!("embedding data: {err}")))?;

        let path = self.output_dir.join(template.file_name());
        write_atomic(&path, html.as_bytes())
            .map_err(|err| render_error(template, format!("writing {}: {err}", path.display())))?;
        info!(
            "event=report_template module=report status=ok template={} charts={} path={}",
            template.name,
            charts.len(),
            path.display()
        );
        Ok(path)
    }
}

#[cfg(feature = "charts")]
fn build_template_charts(
    template: &Template,
    records: &[SleepRecord],
) -> Result<Vec<RenderedChart>, ReportError> {
    Ok(crate::report::charts::build_charts(&template.charts, records))
}

#[cfg(not(feature = "charts"))]
fn build_template_charts(
    _template: &Template,
    _records: &[SleepRecord],
) -> Result<Vec<RenderedChart>, ReportError> {
    Err(ReportError::DependencyMissing {
        dependency: CHART_DEPENDENCY,
    })
}

fn render_error(template: &Template, message: String) -> ReportError {
    ReportError::Render {
        template: template.name.clone(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::{ReportError, ReportGenerator};
    use crate::model::sleep::SleepRecord;
    use crate::report::template::TemplateRegistry;
    use chrono::NaiveDate;
    use std::cell::RefCell;

    thread_local! {
        static PANICKING_TEMPLATE: RefCell<Option<String>> = const { RefCell::new(None) };
    }

    /// Panics inside a render when the current thread asked for it.
    pub(super) fn fail_if_requested(template: &str) {
        let requested = PANICKING_TEMPLATE.with(|cell| cell.borrow().clone());
        if requested.as_deref() == Some(template) {
            panic!("renderer exploded on `{template}`");
        }
    }

    fn nights() -> Vec<SleepRecord> {
        ["2024-03-01", "2024-03-02"]
            .iter()
            .map(|day| {
                let mut record =
                    SleepRecord::new(NaiveDate::parse_from_str(day, "%Y-%m-%d").unwrap());
                record.total_sleep_duration = Some(27_000);
                record
            })
            .collect()
    }

    #[cfg(feature = "charts")]
    #[test]
    fn panicking_template_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ReportGenerator::new(TemplateRegistry::builtin(), dir.path());
        PANICKING_TEMPLATE.with(|cell| *cell.borrow_mut() = Some("overview".to_string()));

        let summary = generator.generate_all(&nights());
        PANICKING_TEMPLATE.with(|cell| *cell.borrow_mut() = None);
        let summary = summary.unwrap();

        assert_eq!(summary.written.len(), 2);
        assert!(dir.path().join("deep_sleep_dashboard.html").is_file());
        assert!(dir.path().join("recovery_dashboard.html").is_file());
        assert!(!dir.path().join("overview_dashboard.html").exists());
        match &summary.failures[..] {
            [ReportError::Render { template, message }] => {
                assert_eq!(template, "overview");
                assert!(message.starts_with("panic:"), "{message}");
                assert!(message.contains("renderer exploded"));
            }
            other => panic!("unexpected failures: {other:?}"),
        }
    }

    #[cfg(not(feature = "charts"))]
    #[test]
    fn missing_chart_backend_skips_generation() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ReportGenerator::new(TemplateRegistry::builtin(), dir.path());
        assert!(matches!(
            generator.generate_all(&nights()),
            Err(ReportError::DependencyMissing { .. })
        ));
    }
}
