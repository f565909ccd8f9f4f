use chrono::NaiveDate;
use nightowl_core::store::sleep_store::{encode, load, write};
use nightowl_core::{merge, CsvSleepStore, SleepRecord, SleepStore, StoreError};
use std::fs;

fn day(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

fn night(value: &str, score: u32) -> SleepRecord {
    let mut record = SleepRecord::new(day(value));
    record.score = Some(score);
    record.total_sleep_duration = Some(27_000);
    record.time_in_bed = Some(29_400);
    record.average_heart_rate = Some(54.25);
    record.contributor_efficiency = Some(88);
    record
}

fn nap(value: &str) -> SleepRecord {
    let mut record = SleepRecord::new(day(value));
    record.total_sleep_duration = Some(1_800);
    record.is_nap = true;
    record
}

#[test]
fn merging_same_batch_twice_is_idempotent() {
    let existing = vec![night("2024-01-01", 70)];
    let incoming = vec![night("2024-01-02", 75), nap("2024-01-02")];

    let once = merge(&existing, &incoming, false).into_records();
    let twice = merge(&once, &incoming, false);

    assert_eq!(twice.inserted, 0);
    assert_eq!(twice.replaced, 0);
    assert_eq!(twice.into_records(), once);
}

#[test]
fn overwrite_discards_existing_history() {
    let existing = vec![night("2024-01-01", 70), night("2024-01-02", 71)];
    let incoming = vec![night("2024-02-01", 90)];

    let outcome = merge(&existing, &incoming, true);
    assert_eq!(outcome.into_records(), incoming);
}

#[test]
fn merge_replaces_matching_day_and_appends_new_one() {
    let existing = vec![
        night("2024-01-01", 70),
        night("2024-01-02", 71),
        night("2024-01-03", 72),
    ];
    let incoming = vec![night("2024-01-03", 99), night("2024-01-04", 80)];

    let outcome = merge(&existing, &incoming, false);
    assert_eq!(outcome.inserted, 1);
    assert_eq!(outcome.replaced, 1);

    let records = outcome.into_records();
    assert_eq!(records.len(), 4);
    assert_eq!(records[0], existing[0]);
    assert_eq!(records[1], existing[1]);
    assert_eq!(records[2].score, Some(99));
    assert_eq!(records[3].date, day("2024-01-04"));
}

#[test]
fn write_then_load_reproduces_records() {
    let dir = tempfile::tempdir().unwrap();
    let store = CsvSleepStore::new(dir.path().join("sleep_data.csv"));

    let mut sparse = SleepRecord::new(day("2024-01-05"));
    sparse.score = Some(0);
    let records = merge(
        &[],
        &[night("2024-01-02", 75), nap("2024-01-02"), sparse, night("2024-01-01", 64)],
        false,
    )
    .into_records();

    store.write(&records).unwrap();
    let loaded = store.load().unwrap();

    assert_eq!(loaded, records);
    assert_eq!(loaded[3].score, Some(0));
    assert_eq!(loaded[3].total_sleep_duration, None);
}

#[test]
fn stored_file_uses_fixed_header_and_flag_encoding() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sleep_data.csv");
    write(&path, &[nap("2024-01-02")]).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let mut lines = text.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("date,is_nap,score,total_sleep_duration,total_sleep_time"));
    assert!(header.ends_with("contributor_timing,contributor_total_sleep,phases_count"));
    assert_eq!(header.split(',').count(), 23);
    assert!(lines.next().unwrap().starts_with("2024-01-02,1,,1800,"));
}

#[test]
fn missing_store_file_loads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let records = load(&dir.path().join("absent.csv")).unwrap();
    assert!(records.is_empty());
}

#[test]
fn malformed_row_fails_the_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sleep_data.csv");
    write(&path, &[night("2024-01-01", 70)]).unwrap();

    let mut text = fs::read_to_string(&path).unwrap();
    text.push_str("2024-01-02,maybe");
    text.push_str(&",".repeat(21));
    text.push('\n');
    fs::write(&path, text).unwrap();

    let err = load(&path).unwrap_err();
    assert!(matches!(err, StoreError::Malformed { line: 3, .. }), "{err}");
}

#[test]
fn short_row_fails_the_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sleep_data.csv");
    write(&path, &[night("2024-01-01", 70)]).unwrap();

    let mut text = fs::read_to_string(&path).unwrap();
    text.push_str("2024-01-02,0,81\n");
    fs::write(&path, text).unwrap();

    assert!(matches!(load(&path).unwrap_err(), StoreError::Malformed { .. }));
}

#[test]
fn foreign_or_empty_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let foreign = dir.path().join("foreign.csv");
    fs::write(&foreign, "day,score\n2024-01-01,80\n").unwrap();
    assert!(matches!(load(&foreign).unwrap_err(), StoreError::Header { .. }));

    let empty = dir.path().join("empty.csv");
    fs::write(&empty, "").unwrap();
    assert!(matches!(load(&empty).unwrap_err(), StoreError::Header { .. }));
}

#[test]
fn failed_write_keeps_previous_store_intact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sleep_data.csv");
    write(&path, &[night("2024-01-01", 70)]).unwrap();
    let before = fs::read(&path).unwrap();

    // A directory squatting on the target makes the final rename fail.
    let blocked = dir.path().join("blocked.csv");
    fs::create_dir(&blocked).unwrap();
    let err = write(&blocked, &[night("2024-01-02", 80)]).unwrap_err();
    assert!(matches!(err, StoreError::Io { .. }));

    assert_eq!(fs::read(&path).unwrap(), before);
    let leftovers = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
        .count();
    assert_eq!(leftovers, 0);
}

fn csv_lines(records: &[SleepRecord]) -> (String, Vec<String>) {
    let text = String::from_utf8(encode(records).unwrap()).unwrap();
    let mut lines = text.lines().map(str::to_string);
    let header = lines.next().unwrap();
    (header, lines.collect())
}

#[test]
fn hand_edited_rows_load_sorted_by_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sleep_data.csv");
    let (header, rows) = csv_lines(&[
        night("2024-01-01", 70),
        night("2024-01-02", 71),
        nap("2024-01-02"),
    ]);
    fs::write(&path, format!("{header}\n{}\n{}\n{}\n", rows[2], rows[1], rows[0])).unwrap();

    let keys: Vec<_> = load(&path)
        .unwrap()
        .iter()
        .map(|record| (record.date.to_string(), record.is_nap))
        .collect();
    assert_eq!(
        keys,
        [
            ("2024-01-01".to_string(), false),
            ("2024-01-02".to_string(), false),
            ("2024-01-02".to_string(), true)
        ]
    );
}

#[test]
fn repeated_session_key_fails_the_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sleep_data.csv");
    let (header, rows) = csv_lines(&[night("2024-01-01", 70), night("2024-01-02", 71)]);
    let (_, edited) = csv_lines(&[night("2024-01-02", 99)]);
    fs::write(&path, format!("{header}\n{}\n{}\n{}\n", rows[1], edited[0], rows[0])).unwrap();

    let err = load(&path).unwrap_err();
    match err {
        StoreError::Malformed { line, message } => {
            assert_eq!(line, 3);
            assert!(message.contains("duplicate"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}
