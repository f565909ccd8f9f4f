//! Self-contained dashboard page rendering.
//!
//! # Responsibility
//! - Lay out breadcrumbs, the date-range control and chart containers.
//! - Embed the dataset snapshot, chart specs and figures as JSON so the page
//!   script can re-render any date range without fetching anything.
//!
//! # Invariants
//! - Embedded JSON never contains a raw `</` sequence.

use crate::model::sleep::{Metric, SleepRecord};
use crate::report::navigation::Breadcrumb;
use crate::report::template::{ChartSpec, Template};
use maud::{html, Markup, PreEscaped, DOCTYPE};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";
const PAGE_SCRIPT: &str = include_str!("assets/dashboard.js");
const PAGE_STYLE: &str = include_str!("assets/dashboard.css");
pub const DATA_ELEMENT_ID: &str = "nightowl-data";

/// One chart ready to be embedded.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedChart {
    /// DOM id of the chart container.
    pub id: String,
    pub title: String,
    /// Plotly figure (`data` + `layout`) as JSON text.
    pub figure_json: String,
}

/// Everything one dashboard page shows.
pub struct DashboardPage<'a> {
    pub template: &'a Template,
    pub breadcrumbs: &'a [Breadcrumb],
    pub charts: &'a [RenderedChart],
    /// Nap-free snapshot embedded for client-side filtering.
    pub records: &'a [SleepRecord],
    pub generated_at: String,
}

#[derive(Serialize)]
struct EmbeddedChart<'a> {
    id: &'a str,
    spec: &'a ChartSpec,
    figure: Value,
}

#[derive(Serialize)]
struct MetricMeta {
    label: &'static str,
    scale: f64,
    unit: &'static str,
}

#[derive(Serialize)]
struct EmbeddedData<'a> {
    template: &'a str,
    records: &'a [SleepRecord],
    charts: Vec<EmbeddedChart<'a>>,
    metrics: BTreeMap<&'static str, MetricMeta>,
}

/// Renders the complete HTML document.
pub fn render_page(page: &DashboardPage<'_>) -> Result<String, serde_json::Error> {
    let payload = embedded_json(page)?;
    let first_day = page
        .records
        .first()
        .map(|record| record.date.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    let last_day = page
        .records
        .last()
        .map(|record| record.date.format("%Y-%m-%d").to_string())
        .unwrap_or_default();

    let markup: Markup = html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (page.template.title) " | NightOwl" }
                script src=(PLOTLY_CDN) {}
                style { (PreEscaped(PAGE_STYLE)) }
            }
            body {
                nav class="breadcrumbs" {
                    @for crumb in page.breadcrumbs {
                        @if crumb.active {
                            span class="crumb active" { (crumb.title) }
                        } @else {
                            a class="crumb" href=(crumb.href) { (crumb.title) }
                        }
                    }
                }
                h1 { (page.template.title) }
                p class="meta" {
                    "Generated " (page.generated_at) " from " (page.records.len()) " nights (naps excluded)"
                }
                section class="range" {
                    label {
                        "From "
                        input id="range-from" type="date" value=(first_day) min=(first_day) max=(last_day);
                    }
                    label {
                        "To "
                        input id="range-to" type="date" value=(last_day) min=(first_day) max=(last_day);
                    }
                    button id="range-reset" type="button" { "Reset" }
                    span id="range-count" {}
                }
                div class="charts" {
                    @for chart in page.charts {
                        div class="chart" id=(chart.id) title=(chart.title) {}
                    }
                }
                script type="application/json" id=(DATA_ELEMENT_ID) { (PreEscaped(payload)) }
                script { (PreEscaped(PAGE_SCRIPT)) }
            }
        }
    };
    Ok(markup.into_string())
}

fn embedded_json(page: &DashboardPage<'_>) -> Result<String, serde_json::Error> {
    let charts = page
        .charts
        .iter()
        .zip(&page.template.charts)
        .map(|(chart, spec)| {
            Ok(EmbeddedChart {
                id: chart.id.as_str(),
                spec,
                figure: serde_json::from_str(&chart.figure_json)?,
            })
        })
        .collect::<Result<Vec<_>, serde_json::Error>>()?;

    let metrics = Metric::ALL
        .iter()
        .map(|metric| {
            (
                metric.column(),
                MetricMeta {
                    label: metric.label(),
                    scale: metric.unit().display_scale(),
                    unit: metric.unit().axis_title(),
                },
            )
        })
        .collect();

    let data = EmbeddedData {
        template: page.template.name.as_str(),
        records: page.records,
        charts,
        metrics,
    };
    Ok(escape_script_json(&serde_json::to_string(&data)?))
}

/// Keeps markup in string values from closing or re-entering the data element.
///
/// `<` only occurs inside JSON strings, where `\u003c` decodes to the same text.
fn escape_script_json(json: &str) -> String {
    json.replace('<', "\\u003c")
}

/// Extracts and parses the embedded JSON payload of a rendered page.
pub fn extract_embedded_data(html: &str) -> Option<Value> {
    let marker = format!("id=\"{DATA_ELEMENT_ID}\">");
    let start = html.find(&marker)? + marker.len();
    let end = start + html[start..].find("</script>")?;
    serde_json::from_str(&html[start..end]).ok()
}
