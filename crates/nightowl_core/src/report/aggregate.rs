//! Dataset filtering and chart aggregates.
//!
//! All values returned here are in display units (`Metric::display_value`).

use crate::model::sleep::{Metric, SleepRecord};

/// Drops nap sessions; dashboards only chart main sleeps.
pub fn main_sleep_only(records: &[SleepRecord]) -> Vec<SleepRecord> {
    records.iter().filter(|record| !record.is_nap).cloned().collect()
}

/// Dates as `YYYY-MM-DD`, one per record.
pub fn dates(records: &[SleepRecord]) -> Vec<String> {
    records
        .iter()
        .map(|record| record.date.format("%Y-%m-%d").to_string())
        .collect()
}

/// One value per record, `None` where the metric is absent.
pub fn series(records: &[SleepRecord], metric: Metric) -> Vec<Option<f64>> {
    records
        .iter()
        .map(|record| metric.display_value(record))
        .collect()
}

/// Mean over the records where the metric is present.
pub fn mean(records: &[SleepRecord], metric: Metric) -> Option<f64> {
    let (sum, count) = records
        .iter()
        .filter_map(|record| metric.display_value(record))
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Percentage each metric contributes to the summed total of all of them.
///
/// Returns zeros when nothing is recorded.
pub fn shares(records: &[SleepRecord], metrics: &[Metric]) -> Vec<f64> {
    let totals: Vec<f64> = metrics
        .iter()
        .map(|metric| records.iter().filter_map(|r| metric.value(r)).sum())
        .collect();
    let grand_total: f64 = totals.iter().sum();
    if grand_total <= 0.0 {
        return vec![0.0; metrics.len()];
    }
    totals
        .iter()
        .map(|total| total / grand_total * 100.0)
        .collect()
}

/// Paired values for nights where both metrics are present.
pub fn pairs(records: &[SleepRecord], x: Metric, y: Metric) -> (Vec<f64>, Vec<f64>) {
    records
        .iter()
        .filter_map(|record| Some((x.display_value(record)?, y.display_value(record)?)))
        .unzip()
}

/// Overall summary of a low/mid/high series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandSummary {
    pub min: Option<f64>,
    pub avg: Option<f64>,
    pub max: Option<f64>,
}

impl BandSummary {
    pub fn compute(records: &[SleepRecord], low: Metric, mid: Metric, high: Metric) -> Self {
        let min = records
            .iter()
            .filter_map(|record| low.display_value(record))
            .reduce(f64::min);
        let max = records
            .iter()
            .filter_map(|record| high.display_value(record))
            .reduce(f64::max);
        Self {
            min,
            avg: mean(records, mid),
            max,
        }
    }

    /// Short label such as `min 48 / avg 56.3 / max 92`.
    pub fn label(&self) -> String {
        let format = |value: Option<f64>| match value {
            Some(value) => format!("{}", (value * 10.0).round() / 10.0),
            None => "n/a".to_string(),
        };
        format!(
            "min {} / avg {} / max {}",
            format(self.min),
            format(self.avg),
            format(self.max)
        )
    }
}
