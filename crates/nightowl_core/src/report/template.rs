//! Report template catalog.
//!
//! # Responsibility
//! - Declare which charts each dashboard contains.
//! - Keep the catalog an explicit value handed to the generator.
//!
//! # Invariants
//! - Template names are unique, lowercase `[a-z][a-z0-9_]*`.
//! - Registry order is breadcrumb order.

use crate::model::sleep::Metric;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

static TEMPLATE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("template name regex is valid"));

/// Chart shape and the metrics it draws.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartKind {
    /// One line per metric over time.
    Lines { metrics: Vec<Metric> },
    /// Per-night stacked bars.
    StackedBars { metrics: Vec<Metric> },
    /// Mean of each metric over the range, as one stacked bar.
    StageAverages { metrics: Vec<Metric> },
    /// Percentage share of each metric in the summed total.
    Share { metrics: Vec<Metric> },
    /// Scatter of paired nightly values.
    Correlation { x: Metric, y: Metric },
    /// Low/mid/high lines with an overall min/avg/max summary.
    Band { low: Metric, mid: Metric, high: Metric },
}

impl ChartKind {
    /// Metrics the chart reads, in trace order.
    pub fn metrics(&self) -> Vec<Metric> {
        match self {
            Self::Lines { metrics }
            | Self::StackedBars { metrics }
            | Self::StageAverages { metrics }
            | Self::Share { metrics } => metrics.clone(),
            Self::Correlation { x, y } => vec![*x, *y],
            Self::Band { low, mid, high } => vec![*low, *mid, *high],
        }
    }
}

/// One chart of a template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub title: String,
    pub kind: ChartKind,
}

impl ChartSpec {
    pub fn new(title: impl Into<String>, kind: ChartKind) -> Self {
        Self {
            title: title.into(),
            kind,
        }
    }

    pub fn lines(title: &str, metrics: &[Metric]) -> Self {
        Self::new(
            title,
            ChartKind::Lines {
                metrics: metrics.to_vec(),
            },
        )
    }

    pub fn correlation(title: &str, x: Metric, y: Metric) -> Self {
        Self::new(title, ChartKind::Correlation { x, y })
    }
}

/// Named dashboard definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub name: String,
    pub title: String,
    pub charts: Vec<ChartSpec>,
}

impl Template {
    pub fn new(name: impl Into<String>, title: impl Into<String>, charts: Vec<ChartSpec>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            charts,
        }
    }

    /// File name of the rendered dashboard.
    pub fn file_name(&self) -> String {
        dashboard_file_name(&self.name)
    }
}

pub fn dashboard_file_name(template_name: &str) -> String {
    format!("{template_name}_dashboard.html")
}

/// Template registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    InvalidName(String),
    Duplicate(String),
    Empty(String),
}

impl Display for TemplateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(name) => write!(f, "template name is invalid: `{name}`"),
            Self::Duplicate(name) => write!(f, "template already registered: {name}"),
            Self::Empty(name) => write!(f, "template declares no charts: {name}"),
        }
    }
}

impl Error for TemplateError {}

/// Ordered template catalog.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: Vec<Template>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in catalog: overview, deep sleep and recovery dashboards.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for template in [overview(), deep_sleep(), recovery()] {
            // Built-in definitions are static and always valid.
            if let Err(err) = registry.register(template) {
                log::error!("event=template_register module=report status=error error={err}");
            }
        }
        registry
    }

    /// Appends one template.
    pub fn register(&mut self, template: Template) -> Result<(), TemplateError> {
        if !TEMPLATE_NAME_RE.is_match(&template.name) {
            return Err(TemplateError::InvalidName(template.name));
        }
        if self.get(&template.name).is_some() {
            return Err(TemplateError::Duplicate(template.name));
        }
        if template.charts.is_empty() {
            return Err(TemplateError::Empty(template.name));
        }
        self.templates.push(template);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.iter().find(|template| template.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.templates.iter().map(|template| template.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

const STAGES: [Metric; 3] = [
    Metric::DeepSleepDuration,
    Metric::RemSleepDuration,
    Metric::LightSleepDuration,
];

fn overview() -> Template {
    Template::new(
        "overview",
        "Sleep Overview",
        vec![
            ChartSpec::lines("Total Sleep Duration", &[Metric::TotalSleepDuration]),
            ChartSpec::new(
                "Sleep Stages Breakdown",
                ChartKind::StageAverages {
                    metrics: STAGES.to_vec(),
                },
            ),
            ChartSpec::new(
                "Heart Rate Trends",
                ChartKind::Band {
                    low: Metric::LowestHeartRate,
                    mid: Metric::AverageHeartRate,
                    high: Metric::HighestHeartRate,
                },
            ),
            ChartSpec::lines("Heart Rate Variability", &[Metric::AverageHrv]),
            ChartSpec::lines("Breathing Rate", &[Metric::AverageBreath]),
            ChartSpec::lines(
                "Time in Bed vs Sleep",
                &[Metric::TimeInBed, Metric::TotalSleepDuration],
            ),
            ChartSpec::lines("Sleep Score", &[Metric::Score]),
        ],
    )
}

fn deep_sleep() -> Template {
    Template::new(
        "deep_sleep",
        "Deep Sleep Focus",
        vec![
            ChartSpec::lines("Deep Sleep per Night", &[Metric::DeepSleepDuration]),
            ChartSpec::new(
                "Stage Composition",
                ChartKind::Share {
                    metrics: STAGES.to_vec(),
                },
            ),
            ChartSpec::new(
                "Nightly Stages",
                ChartKind::StackedBars {
                    metrics: STAGES.to_vec(),
                },
            ),
            ChartSpec::correlation(
                "Deep Sleep vs HRV",
                Metric::DeepSleepDuration,
                Metric::AverageHrv,
            ),
            ChartSpec::correlation(
                "Deep Sleep vs Heart Rate",
                Metric::DeepSleepDuration,
                Metric::AverageHeartRate,
            ),
            ChartSpec::lines("Deep Sleep Contributor", &[Metric::ContributorDeepSleep]),
        ],
    )
}

fn recovery() -> Template {
    Template::new(
        "recovery",
        "Heart & Recovery",
        vec![
            ChartSpec::new(
                "Nightly Heart Rate Range",
                ChartKind::Band {
                    low: Metric::LowestHeartRate,
                    mid: Metric::AverageHeartRate,
                    high: Metric::HighestHeartRate,
                },
            ),
            ChartSpec::lines("HRV Trend", &[Metric::AverageHrv]),
            ChartSpec::correlation("HRV vs Sleep Score", Metric::AverageHrv, Metric::Score),
            ChartSpec::correlation(
                "Lowest HR vs Deep Sleep",
                Metric::LowestHeartRate,
                Metric::DeepSleepDuration,
            ),
            ChartSpec::lines(
                "Contributor Scores",
                &[
                    Metric::ContributorEfficiency,
                    Metric::ContributorRestfulness,
                    Metric::ContributorTiming,
                ],
            ),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::{ChartSpec, Template, TemplateError, TemplateRegistry};
    use crate::model::sleep::Metric;

    fn single_chart(name: &str) -> Template {
        Template::new(name, "Title", vec![ChartSpec::lines("Score", &[Metric::Score])])
    }

    #[test]
    fn builtin_order_is_stable() {
        let registry = TemplateRegistry::builtin();
        assert_eq!(registry.names(), vec!["overview", "deep_sleep", "recovery"]);
    }

    #[test]
    fn register_rejects_bad_names_and_duplicates() {
        let mut registry = TemplateRegistry::builtin();
        assert_eq!(
            registry.register(single_chart("../escape")),
            Err(TemplateError::InvalidName("../escape".to_string()))
        );
        assert_eq!(
            registry.register(single_chart("overview")),
            Err(TemplateError::Duplicate("overview".to_string()))
        );
        assert_eq!(
            registry.register(Template::new("bare", "Bare", Vec::new())),
            Err(TemplateError::Empty("bare".to_string()))
        );
        registry.register(single_chart("scores")).unwrap();
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn chart_kind_serializes_with_tag() {
        let spec = ChartSpec::correlation("c", Metric::AverageHrv, Metric::Score);
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["kind"]["kind"], "correlation");
        assert_eq!(json["kind"]["x"], "average_hrv");
    }
}
