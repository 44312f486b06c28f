//! Integration tests for the CSV measurement log
//!
//! These tests verify that:
//! - Records written by one handle are read back by a fresh one
//! - History queries return the last few values oldest first
//! - Corrupt rows surface as errors instead of bad data

use assert_matches::assert_matches;
use chrono::NaiveDate;
use network_service::{
    NetworkError,
    storage::{
        CorruptionKind, DEFAULT_HISTORY_LIMIT, MeasurementRecord, MeasurementStore, StorageError,
        csv_log::CsvLog,
    },
};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use crate::helpers::{csv_state, web_server};

fn at(second: u32) -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(12, 0, second)
        .unwrap()
}

#[tokio::test]
async fn test_log_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("Log.txt");

    let writer = CsvLog::new(&path);
    writer.append(MeasurementRecord::new(1, 50.0, at(0))).await.unwrap();
    writer.append(MeasurementRecord::new(2, 61.25, at(1))).await.unwrap();
    drop(writer);

    let reader = CsvLog::new(&path);
    let records = reader.load_all().await.unwrap();
    assert_eq!(
        records,
        vec![
            MeasurementRecord::new(1, 50.0, at(0)),
            MeasurementRecord::new(2, 61.25, at(1)),
        ]
    );

    reader.append(MeasurementRecord::new(1, 52.0, at(2))).await.unwrap();
    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        content,
        "Id,CurrentValue,Date\n\
         1,50,2024-05-01 12:00:00\n\
         2,61.25,2024-05-01 12:00:01\n\
         1,52,2024-05-01 12:00:02\n"
    );
}

#[tokio::test]
async fn test_history_returns_last_values_oldest_first() {
    let dir = tempdir().unwrap();
    let log = CsvLog::new(dir.path().join("Log.txt"));

    for second in 0..8 {
        log.append(MeasurementRecord::new(1, 40.0 + second as f64, at(second)))
            .await
            .unwrap();
        log.append(MeasurementRecord::new(2, 10.0, at(second))).await.unwrap();
    }

    let history = log.recent_for_entity(1, DEFAULT_HISTORY_LIMIT).await.unwrap();
    let values: Vec<f64> = history.iter().map(|r| r.value).collect();
    assert_eq!(values, vec![43.0, 44.0, 45.0, 46.0, 47.0]);

    assert!(log.recent_for_entity(3, DEFAULT_HISTORY_LIMIT).await.unwrap().is_empty());
    assert_eq!(log.recent_for_entity(2, 100).await.unwrap().len(), 8);
}

#[tokio::test]
async fn test_state_history_through_updates() {
    let dir = tempdir().unwrap();
    let (state, _log) = csv_state(dir.path());
    let web = state.create_entity(web_server("web")).await.unwrap();

    for value in [50.0, 55.0, 60.0] {
        let update = state.apply_update(web.id, value).await.unwrap();
        assert!(update.persisted);
    }

    let history = state.recent_history(web.id, DEFAULT_HISTORY_LIMIT).await.unwrap();
    let values: Vec<f64> = history.iter().map(|r| r.value).collect();
    assert_eq!(values, vec![50.0, 55.0, 60.0]);
    assert!(history.iter().all(|r| r.entity_id == web.id));
}

#[tokio::test]
async fn test_corrupt_log_is_reported() {
    let dir = tempdir().unwrap();
    let (state, log) = csv_state(dir.path());
    state.create_entity(web_server("web")).await.unwrap();
    state.apply_update(1, 50.0).await.unwrap();

    let mut content = std::fs::read_to_string(log.path()).unwrap();
    content.push_str("1,not-a-number,2024-05-01 12:00:00\n");
    std::fs::write(log.path(), content).unwrap();

    assert_matches!(
        state.recent_history(1, DEFAULT_HISTORY_LIMIT).await,
        Err(NetworkError::Storage(StorageError::LogCorruption {
            kind: CorruptionKind::MalformedRow { line: 3, .. },
            ..
        }))
    );

    // a corrupt log does not stop new values from being applied
    let update = state.apply_update(1, 51.0).await.unwrap();
    assert_eq!(update.entity.current_value, 51.0);
}

#[tokio::test]
async fn test_unwritable_log_does_not_fail_update() {
    let dir = tempdir().unwrap();
    // a directory where the log file should be
    std::fs::create_dir_all(dir.path().join("Logs").join("Log.txt")).unwrap();

    let (state, _log) = csv_state(dir.path());
    state.create_entity(web_server("web")).await.unwrap();

    let update = state.apply_update(1, 50.0).await.unwrap();
    assert!(!update.persisted);
    assert_eq!(state.entity(1).await.unwrap().current_value, 50.0);
}
