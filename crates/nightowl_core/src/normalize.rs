//! Raw source record normalization.
//!
//! # Responsibility
//! - Convert one loosely typed source record into a `SleepRecord`.
//! - Derive `is_nap` and `phases_count`.
//!
//! # Invariants
//! - Absent or `null` source values stay `None`; zero stays zero.
//! - Normalization is pure and never touches the filesystem.

use crate::model::sleep::{Metric, SleepRecord};
use chrono::NaiveDate;
use log::debug;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One record as delivered by a record source.
pub type RawRecord = Map<String, Value>;

const DATE_KEYS: [&str; 2] = ["day", "date"];
const TIMESTAMP_KEYS: [&str; 2] = ["timestamp", "bedtime_start"];
const CONTRIBUTORS_KEY: &str = "contributors";
const PHASES_KEY: &str = "sleep_phase_5_min";

/// Normalization failure for one raw record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    MissingDate,
    InvalidDate { value: String },
    InvalidField { field: String, message: String },
}

impl Display for NormalizationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingDate => write!(f, "raw record has no date"),
            Self::InvalidDate { value } => {
                write!(f, "raw record date `{value}` is not a YYYY-MM-DD calendar date")
            }
            Self::InvalidField { field, message } => {
                write!(f, "raw record field `{field}` is invalid: {message}")
            }
        }
    }
}

impl Error for NormalizationError {}

/// Converts one raw record into its canonical form.
pub fn normalize(raw: &RawRecord) -> Result<SleepRecord, NormalizationError> {
    let date = extract_date(raw)?;
    let mut record = SleepRecord::new(date);

    for metric in Metric::ALL {
        if let Some(value) = raw.get(metric.column()) {
            metric
                .set_from_json(&mut record, value)
                .map_err(|message| invalid_field(metric.column(), message))?;
        }
    }

    apply_nested_contributors(raw, &mut record)?;

    if record.phases_count.is_none() {
        record.phases_count = count_phases(raw.get(PHASES_KEY))?;
    }

    record.reclassify();
    record
        .validate()
        .map_err(|err| invalid_field(err.metric.column(), err.to_string()))?;
    Ok(record)
}

/// Normalizes a batch, failing on the first bad record.
pub fn normalize_all(raws: &[RawRecord]) -> Result<Vec<SleepRecord>, NormalizationError> {
    raws.iter().map(normalize).collect()
}

/// Reads the calendar day of a raw record without normalizing the rest.
pub fn extract_date(raw: &RawRecord) -> Result<NaiveDate, NormalizationError> {
    let text = DATE_KEYS
        .iter()
        .find_map(|key| non_empty_str(raw.get(*key)))
        .or_else(|| {
            TIMESTAMP_KEYS.iter().find_map(|key| {
                non_empty_str(raw.get(*key)).map(|stamp| stamp.split('T').next().unwrap_or(stamp))
            })
        })
        .ok_or(NormalizationError::MissingDate)?;

    NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|_| NormalizationError::InvalidDate {
        value: text.to_string(),
    })
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

fn apply_nested_contributors(
    raw: &RawRecord,
    record: &mut SleepRecord,
) -> Result<(), NormalizationError> {
    let Some(nested) = raw.get(CONTRIBUTORS_KEY) else {
        return Ok(());
    };
    let nested = match nested {
        Value::Null => return Ok(()),
        Value::Object(map) => map,
        other => {
            return Err(invalid_field(
                CONTRIBUTORS_KEY,
                format!("expected an object, got `{other}`"),
            ))
        }
    };

    for (name, value) in nested {
        let Some(metric) = Metric::CONTRIBUTORS
            .iter()
            .copied()
            .find(|metric| metric.contributor_name() == Some(name.as_str()))
        else {
            debug!("event=normalize module=normalize status=skip reason=unknown_contributor name={name}");
            continue;
        };
        // Flat `contributor_*` keys take precedence over the nested form.
        if raw.contains_key(metric.column()) {
            continue;
        }
        metric
            .set_from_json(record, value)
            .map_err(|message| invalid_field(metric.column(), message))?;
    }
    Ok(())
}

fn count_phases(value: Option<&Value>) -> Result<Option<u32>, NormalizationError> {
    let count = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(phases)) => phases.trim().chars().count(),
        Some(Value::Array(phases)) => phases.len(),
        Some(other) => {
            return Err(invalid_field(
                PHASES_KEY,
                format!("expected a string or array, got `{other}`"),
            ))
        }
    };
    if count == 0 {
        return Ok(None);
    }
    u32::try_from(count)
        .map(Some)
        .map_err(|_| invalid_field(PHASES_KEY, format!("{count} phases overflow")))
}

fn invalid_field(field: &str, message: String) -> NormalizationError {
    NormalizationError::InvalidField {
        field: field.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize, NormalizationError, RawRecord};
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn date_falls_back_to_timestamp_prefix() {
        let record = normalize(&raw(json!({
            "bedtime_start": "2024-03-02T23:10:00+01:00",
            "total_sleep_duration": 25_000
        })))
        .unwrap();
        assert_eq!(record.date.to_string(), "2024-03-02");
    }

    #[test]
    fn calendar_validation_rejects_impossible_days() {
        let err = normalize(&raw(json!({ "day": "2024-02-30" }))).unwrap_err();
        assert_eq!(
            err,
            NormalizationError::InvalidDate {
                value: "2024-02-30".to_string()
            }
        );
    }

    #[test]
    fn empty_date_counts_as_missing() {
        let err = normalize(&raw(json!({ "day": "  ", "score": 80 }))).unwrap_err();
        assert_eq!(err, NormalizationError::MissingDate);
    }

    #[test]
    fn phases_are_counted_from_phase_string() {
        let record = normalize(&raw(json!({
            "day": "2024-01-01",
            "sleep_phase_5_min": "4422113"
        })))
        .unwrap();
        assert_eq!(record.phases_count, Some(7));
    }

    #[test]
    fn explicit_phase_count_wins() {
        let record = normalize(&raw(json!({
            "day": "2024-01-01",
            "phases_count": 3,
            "sleep_phase_5_min": "4422113"
        })))
        .unwrap();
        assert_eq!(record.phases_count, Some(3));
    }

    #[test]
    fn string_metric_is_rejected() {
        let err = normalize(&raw(json!({ "day": "2024-01-01", "score": "85" }))).unwrap_err();
        assert!(matches!(err, NormalizationError::InvalidField { ref field, .. } if field == "score"));
    }
}
