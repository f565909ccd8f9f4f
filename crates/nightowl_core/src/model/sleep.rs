//! Sleep session domain model.
//!
//! # Responsibility
//! - Define `SleepRecord`, the canonical shape persisted by the store.
//! - Describe every numeric column once through `Metric`, so the CSV codec,
//!   the normalizer and the chart layer agree on names and units.
//!
//! # Invariants
//! - `is_nap` is derived from durations, see [`classify_nap`].
//! - Present numeric values are finite and non-negative.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Sessions strictly shorter than this many seconds are naps.
pub const NAP_THRESHOLD_SECONDS: u32 = 10_800;

/// Display unit of a metric column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    /// Stored as whole seconds, displayed as hours.
    Seconds,
    Score,
    Bpm,
    Milliseconds,
    BreathsPerMinute,
    Count,
}

impl Unit {
    /// Factor applied to stored values before display.
    pub fn display_scale(self) -> f64 {
        match self {
            Self::Seconds => 1.0 / 3600.0,
            _ => 1.0,
        }
    }

    pub fn axis_title(self) -> &'static str {
        match self {
            Self::Seconds => "Hours",
            Self::Score => "Score",
            Self::Bpm => "BPM",
            Self::Milliseconds => "ms",
            Self::BreathsPerMinute => "Breaths/min",
            Self::Count => "Count",
        }
    }
}

/// Raw value conversion shared by whole-number and measured metric fields.
pub trait MetricValue: Copy + Into<f64> + Sized {
    /// Reads a JSON value. `Ok(None)` for `null`.
    fn from_json(value: &Value) -> Result<Option<Self>, String>;
    /// Parses one non-empty CSV cell.
    fn parse_cell(raw: &str) -> Result<Self, String>;
    fn to_cell(self) -> String;
}

impl MetricValue for u32 {
    fn from_json(value: &Value) -> Result<Option<Self>, String> {
        match value {
            Value::Null => Ok(None),
            Value::Number(number) => {
                if let Some(whole) = number.as_u64() {
                    return u32::try_from(whole)
                        .map(Some)
                        .map_err(|_| format!("value {whole} is out of range"));
                }
                if number.as_i64().is_some() {
                    return Err(format!("value {number} is negative"));
                }
                // Whole-valued floats such as `28800.0` are accepted.
                match number.as_f64() {
                    Some(float) if float < 0.0 => Err(format!("value {float} is negative")),
                    Some(float) if float.fract() == 0.0 && float <= f64::from(u32::MAX) => {
                        Ok(Some(float as u32))
                    }
                    _ => Err(format!("value {number} is not a whole number")),
                }
            }
            other => Err(format!("expected a number, got `{other}`")),
        }
    }

    fn parse_cell(raw: &str) -> Result<Self, String> {
        raw.parse::<u32>()
            .map_err(|err| format!("`{raw}` is not a non-negative integer: {err}"))
    }

    fn to_cell(self) -> String {
        self.to_string()
    }
}

impl MetricValue for f64 {
    fn from_json(value: &Value) -> Result<Option<Self>, String> {
        match value {
            Value::Null => Ok(None),
            Value::Number(number) => match number.as_f64() {
                Some(float) => check_measure(float).map(Some),
                None => Err(format!("value {number} is not representable")),
            },
            other => Err(format!("expected a number, got `{other}`")),
        }
    }

    fn parse_cell(raw: &str) -> Result<Self, String> {
        let float = raw
            .parse::<f64>()
            .map_err(|err| format!("`{raw}` is not a number: {err}"))?;
        check_measure(float)
    }

    fn to_cell(self) -> String {
        self.to_string()
    }
}

fn check_measure(value: f64) -> Result<f64, String> {
    if !value.is_finite() {
        return Err(format!("value {value} is not finite"));
    }
    if value < 0.0 {
        return Err(format!("value {value} is negative"));
    }
    Ok(value)
}

/// Invalid numeric state found by [`SleepRecord::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct SleepValidationError {
    pub metric: Metric,
    pub value: f64,
}

impl Display for SleepValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "metric `{}` must be finite and non-negative, got {}",
            self.metric.column(),
            self.value
        )
    }
}

impl Error for SleepValidationError {}

macro_rules! sleep_metrics {
    ($($variant:ident => $field:ident: $ty:ty, $label:literal, $unit:ident;)+) => {
        /// Canonical sleep session record.
        ///
        /// One record is one sleep or nap session of a calendar day.
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct SleepRecord {
            pub date: NaiveDate,
            pub is_nap: bool,
            $(pub $field: Option<$ty>,)+
        }

        impl SleepRecord {
            /// Creates a main-sleep record with every metric absent.
            pub fn new(date: NaiveDate) -> Self {
                Self {
                    date,
                    is_nap: false,
                    $($field: None,)+
                }
            }
        }

        /// Numeric column of a [`SleepRecord`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum Metric {
            $($variant,)+
        }

        impl Metric {
            /// Every metric in persisted column order.
            pub const ALL: &'static [Metric] = &[$(Metric::$variant,)+];

            pub fn column(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($field),)+
                }
            }

            pub fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }

            pub fn unit(self) -> Unit {
                match self {
                    $(Self::$variant => Unit::$unit,)+
                }
            }

            pub fn from_column(column: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|metric| metric.column() == column)
            }

            /// Stored value widened to `f64`.
            pub fn value(self, record: &SleepRecord) -> Option<f64> {
                match self {
                    $(Self::$variant => record.$field.map(Into::into),)+
                }
            }

            /// Stored value scaled to the display unit.
            pub fn display_value(self, record: &SleepRecord) -> Option<f64> {
                self.value(record).map(|value| value * self.unit().display_scale())
            }

            /// Sets the field from a JSON value; `null` clears it.
            pub fn set_from_json(self, record: &mut SleepRecord, value: &Value) -> Result<(), String> {
                match self {
                    $(Self::$variant => record.$field = <$ty as MetricValue>::from_json(value)?,)+
                }
                Ok(())
            }

            /// Sets the field from a CSV cell; an empty cell clears it.
            pub fn set_from_cell(self, record: &mut SleepRecord, raw: &str) -> Result<(), String> {
                match self {
                    $(Self::$variant => {
                        record.$field = if raw.is_empty() {
                            None
                        } else {
                            Some(<$ty as MetricValue>::parse_cell(raw)?)
                        };
                    })+
                }
                Ok(())
            }

            /// CSV cell for the field; empty when absent.
            pub fn to_cell(self, record: &SleepRecord) -> String {
                match self {
                    $(Self::$variant => record.$field.map(MetricValue::to_cell).unwrap_or_default(),)+
                }
            }
        }
    };
}

sleep_metrics! {
    Score => score: u32, "Sleep Score", Score;
    TotalSleepDuration => total_sleep_duration: u32, "Sleep Duration", Seconds;
    TotalSleepTime => total_sleep_time: u32, "Total Sleep Time", Seconds;
    TimeInBed => time_in_bed: u32, "Time in Bed", Seconds;
    AwakeTime => awake_time: u32, "Awake Time", Seconds;
    RemSleepDuration => rem_sleep_duration: u32, "REM Sleep", Seconds;
    DeepSleepDuration => deep_sleep_duration: u32, "Deep Sleep", Seconds;
    LightSleepDuration => light_sleep_duration: u32, "Light Sleep", Seconds;
    AverageBreath => average_breath: f64, "Breathing Rate", BreathsPerMinute;
    AverageHeartRate => average_heart_rate: f64, "Avg Heart Rate", Bpm;
    AverageHrv => average_hrv: f64, "HRV", Milliseconds;
    LowestHeartRate => lowest_heart_rate: f64, "Lowest HR", Bpm;
    HighestHeartRate => highest_heart_rate: f64, "Highest HR", Bpm;
    ContributorDeepSleep => contributor_deep_sleep: u32, "Deep Sleep Contributor", Score;
    ContributorEfficiency => contributor_efficiency: u32, "Efficiency Contributor", Score;
    ContributorLatency => contributor_latency: u32, "Latency Contributor", Score;
    ContributorRemSleep => contributor_rem_sleep: u32, "REM Contributor", Score;
    ContributorRestfulness => contributor_restfulness: u32, "Restfulness Contributor", Score;
    ContributorTiming => contributor_timing: u32, "Timing Contributor", Score;
    ContributorTotalSleep => contributor_total_sleep: u32, "Total Sleep Contributor", Score;
    PhasesCount => phases_count: u32, "Sleep Phases", Count;
}

impl Metric {
    /// Metrics fed by the source's nested `contributors` object.
    pub const CONTRIBUTORS: &'static [Metric] = &[
        Metric::ContributorDeepSleep,
        Metric::ContributorEfficiency,
        Metric::ContributorLatency,
        Metric::ContributorRemSleep,
        Metric::ContributorRestfulness,
        Metric::ContributorTiming,
        Metric::ContributorTotalSleep,
    ];

    /// Contributor name without the `contributor_` prefix.
    pub fn contributor_name(self) -> Option<&'static str> {
        self.column().strip_prefix("contributor_")
    }
}

/// Identity used to decide whether two records describe the same session.
///
/// Ordering sorts by date first, with the main sleep before a same-day nap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DedupKey {
    pub date: NaiveDate,
    pub is_nap: bool,
}

impl SleepRecord {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            date: self.date,
            is_nap: self.is_nap,
        }
    }

    /// Recomputes `is_nap` from the current durations.
    pub fn reclassify(&mut self) {
        self.is_nap = classify_nap(self.total_sleep_duration, self.time_in_bed);
    }

    /// Checks the non-negative/finite invariant of every present metric.
    pub fn validate(&self) -> Result<(), SleepValidationError> {
        for metric in Metric::ALL {
            if let Some(value) = metric.value(self) {
                if !value.is_finite() || value < 0.0 {
                    return Err(SleepValidationError {
                        metric: *metric,
                        value,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Classifies a session as a nap.
///
/// Uses total sleep duration when known, falls back to time in bed, and
/// treats a session with neither as a main sleep.
pub fn classify_nap(total_sleep_duration: Option<u32>, time_in_bed: Option<u32>) -> bool {
    match total_sleep_duration.or(time_in_bed) {
        Some(seconds) => seconds < NAP_THRESHOLD_SECONDS,
        None => false,
    }
}
