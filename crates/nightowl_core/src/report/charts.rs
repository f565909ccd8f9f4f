//! Plotly figure construction for chart specifications.
//!
//! Trace order per chart kind is mirrored by the page script, which rebuilds
//! the same traces when the date range changes.

use crate::model::sleep::{Metric, SleepRecord};
use crate::report::aggregate::{dates, mean, pairs, series, shares, BandSummary};
use crate::report::page::RenderedChart;
use crate::report::template::{ChartKind, ChartSpec};
use plotly::common::{Line, Marker, Mode, Title};
use plotly::layout::{Axis, BarMode, Layout};
use plotly::{Bar, Plot, Scatter};

const PALETTE: [&str; 10] = [
    "#1f77b4", "#2ca02c", "#ff7f0e", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];
const CHART_HEIGHT: usize = 420;

/// Builds every chart of a template against an already filtered dataset.
pub fn build_charts(specs: &[ChartSpec], records: &[SleepRecord]) -> Vec<RenderedChart> {
    specs
        .iter()
        .enumerate()
        .map(|(index, spec)| RenderedChart {
            id: format!("chart-{index}"),
            title: spec.title.clone(),
            figure_json: build_plot(spec, records).to_json(),
        })
        .collect()
}

fn build_plot(spec: &ChartSpec, records: &[SleepRecord]) -> Plot {
    let mut plot = Plot::new();
    let days = dates(records);

    let layout = match &spec.kind {
        ChartKind::Lines { metrics } => {
            for (index, metric) in metrics.iter().enumerate() {
                plot.add_trace(
                    Scatter::new(days.clone(), series(records, *metric))
                        .mode(Mode::LinesMarkers)
                        .name(metric.label())
                        .line(Line::new().color(color(index)).width(2.0)),
                );
            }
            date_layout(&spec.title, unit_title(metrics))
        }
        ChartKind::StackedBars { metrics } => {
            for (index, metric) in metrics.iter().enumerate() {
                plot.add_trace(
                    Bar::new(days.clone(), series(records, *metric))
                        .name(metric.label())
                        .marker(Marker::new().color(color(index))),
                );
            }
            date_layout(&spec.title, unit_title(metrics)).bar_mode(BarMode::Stack)
        }
        ChartKind::StageAverages { metrics } => {
            for (index, metric) in metrics.iter().enumerate() {
                plot.add_trace(
                    Bar::new(vec!["Average"], vec![mean(records, *metric)])
                        .name(metric.label())
                        .marker(Marker::new().color(color(index))),
                );
            }
            base_layout(&spec.title)
                .y_axis(Axis::new().title(Title::from(unit_title(metrics))))
                .bar_mode(BarMode::Stack)
        }
        ChartKind::Share { metrics } => {
            let values = shares(records, metrics);
            for (index, (metric, value)) in metrics.iter().zip(values).enumerate() {
                plot.add_trace(
                    Bar::new(vec!["Share"], vec![value])
                        .name(metric.label())
                        .marker(Marker::new().color(color(index))),
                );
            }
            base_layout(&spec.title)
                .y_axis(Axis::new().title(Title::from("% of total")))
                .bar_mode(BarMode::Stack)
        }
        ChartKind::Correlation { x, y } => {
            let (xs, ys) = pairs(records, *x, *y);
            let name = format!("{} vs {}", y.label(), x.label());
            plot.add_trace(
                Scatter::new(xs, ys)
                    .mode(Mode::Markers)
                    .name(&name)
                    .marker(Marker::new().color(color(0))),
            );
            base_layout(&spec.title)
                .x_axis(Axis::new().title(Title::from(axis_label(*x).as_str())))
                .y_axis(Axis::new().title(Title::from(axis_label(*y).as_str())))
        }
        ChartKind::Band { low, mid, high } => {
            for (index, metric) in [*low, *mid, *high].iter().enumerate() {
                plot.add_trace(
                    Scatter::new(days.clone(), series(records, *metric))
                        .mode(Mode::LinesMarkers)
                        .name(metric.label())
                        .line(Line::new().color(color(index + 3)).width(2.0)),
                );
            }
            let summary = BandSummary::compute(records, *low, *mid, *high);
            let title = format!("{} ({})", spec.title, summary.label());
            date_layout(&title, mid.unit().axis_title())
        }
    };

    plot.set_layout(layout);
    plot
}

fn base_layout(title: &str) -> Layout {
    Layout::new()
        .title(Title::from(title))
        .height(CHART_HEIGHT)
        .show_legend(true)
}

fn date_layout(title: &str, y_title: &str) -> Layout {
    base_layout(title)
        .x_axis(Axis::new().title(Title::from("Date")))
        .y_axis(Axis::new().title(Title::from(y_title)))
}

fn unit_title(metrics: &[Metric]) -> &'static str {
    metrics
        .first()
        .map(|metric| metric.unit().axis_title())
        .unwrap_or_default()
}

fn axis_label(metric: Metric) -> String {
    format!("{} ({})", metric.label(), metric.unit().axis_title())
}

fn color(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

#[cfg(test)]
mod tests {
    use super::build_charts;
    use crate::model::sleep::SleepRecord;
    use crate::report::template::TemplateRegistry;
    use chrono::NaiveDate;

    #[test]
    fn every_builtin_chart_produces_a_figure() {
        let mut record = SleepRecord::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        record.total_sleep_duration = Some(28_800);
        record.deep_sleep_duration = Some(5_400);
        record.average_hrv = Some(42.0);

        for template in TemplateRegistry::builtin().iter() {
            let charts = build_charts(&template.charts, &[record.clone()]);
            assert_eq!(charts.len(), template.charts.len());
            for chart in charts {
                let figure: serde_json::Value = serde_json::from_str(&chart.figure_json).unwrap();
                assert!(figure["data"].is_array(), "{} has no traces", chart.title);
            }
        }
    }

    #[test]
    fn empty_dataset_still_renders() {
        let registry = TemplateRegistry::builtin();
        let overview = registry.get("overview").unwrap();
        let charts = build_charts(&overview.charts, &[]);
        assert_eq!(charts[0].id, "chart-0");
    }
}
