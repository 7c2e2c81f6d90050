//! Edge cases in file content: empty files, odd headers, line endings

use crate::common::{sample_data, TestFixture};
use snapgate::decision::{FileStatus, Outcome, ReasonCode};
use snapgate::fingerprint::FingerprintComputer;

fn two_file_fixture() -> TestFixture {
    TestFixture::with_core_files(&["left.csv", "right.csv"], 2).unwrap()
}

#[test]
fn test_empty_files_are_valid_snapshots() {
    let fixture = two_file_fixture();
    fixture.stage_file("left.csv", "").unwrap();
    fixture.stage_file("right.csv", "").unwrap();

    let report = fixture.run_pipeline().unwrap();
    assert_eq!(report.decision.outcome, Outcome::Ingest);
    let left = report.decision.details[0].current.as_ref().unwrap();
    assert_eq!(left.total_rows, 0);
    assert_eq!(left.data_rows, 0);

    let again = fixture.run_pipeline().unwrap();
    assert_eq!(again.decision.outcome, Outcome::Skip);
}

#[test]
fn test_header_only_file() {
    let fixture = two_file_fixture();
    fixture.stage_file("left.csv", "id,name\n").unwrap();
    fixture.stage_file("right.csv", "id\n").unwrap();

    let report = fixture.run_pipeline().unwrap();
    let left = report.decision.details[0].current.as_ref().unwrap();
    assert_eq!(left.total_rows, 1);
    assert_eq!(left.data_rows, 0);
    assert_eq!(left.columns, vec!["id", "name"]);
}

#[test]
fn test_line_ending_change_is_a_content_change() {
    let fixture = two_file_fixture();
    fixture.stage_file("left.csv", "id\n1\n2\n").unwrap();
    fixture.stage_file("right.csv", "id\n").unwrap();
    fixture.run_pipeline().unwrap();

    fixture.stage_file("left.csv", "id\r\n1\r\n2\r\n").unwrap();
    let report = fixture.run_pipeline().unwrap();

    assert_eq!(report.decision.outcome, Outcome::Ingest);
    let left = &report.decision.details[0];
    assert_eq!(left.status, FileStatus::Changed);
    assert!(left.hash_changed);
    assert_eq!(left.row_count_delta, 0);
}

#[test]
fn test_missing_trailing_newline_counts_last_row() {
    let fixture = two_file_fixture();
    fixture.stage_file("left.csv", "id\n1\n2").unwrap();
    fixture.stage_file("right.csv", "id\n1").unwrap();

    let report = fixture.run_pipeline().unwrap();
    assert_eq!(report.decision.details[0].current.as_ref().unwrap().data_rows, 2);
    assert_eq!(report.decision.details[1].current.as_ref().unwrap().data_rows, 1);
}

#[test]
fn test_expected_columns_enforced() {
    let fixture = two_file_fixture();
    let mut config = fixture.config().unwrap();
    config.expected_columns.insert(
        "left.csv".to_string(),
        vec!["id".to_string(), "gameDate".to_string()],
    );
    fixture.save_config(&config).unwrap();

    fixture.stage_file("left.csv", "\u{feff}\"id\",\"gameDate\"\r\n1,2024-10-22\r\n").unwrap();
    fixture.stage_file("right.csv", "id\n").unwrap();
    let report = fixture.run_pipeline().unwrap();
    assert_eq!(report.decision.outcome, Outcome::Ingest);

    // Upstream drops a column
    fixture.stage_file("left.csv", "id\n1\n").unwrap();
    let report = fixture.run_pipeline().unwrap();
    assert_eq!(report.decision.reason, ReasonCode::SchemaMismatch);
    assert_eq!(report.decision.schema_issues[0].missing_columns, vec!["gameDate"]);

    // The alert did not replace the baseline
    let log = fixture.ingestion_log().unwrap();
    assert!(log.contains("missing expected columns: left.csv (gameDate)"));
}

#[test]
fn test_non_utf8_content_is_hashed() {
    let fixture = two_file_fixture();
    let staging = fixture.staging_dir();
    std::fs::create_dir_all(&staging).unwrap();
    std::fs::write(staging.join("left.csv"), b"id\n\xff\xfe\x00\n").unwrap();
    fixture.stage_file("right.csv", "id\n").unwrap();

    let report = fixture.run_pipeline().unwrap();
    let left = report.decision.details[0].current.as_ref().unwrap();
    assert_eq!(left.hash.len(), 64);
    assert_eq!(left.data_rows, 1);
}

#[test]
fn test_large_file_row_count() {
    let fixture = two_file_fixture();
    let rows: Vec<String> = (0..20_000).map(|i| format!("{},{}", i, i * 2)).collect();
    let row_refs: Vec<&str> = rows.iter().map(String::as_str).collect();
    fixture
        .stage_file("left.csv", &sample_data::csv("a,b", &row_refs))
        .unwrap();
    fixture.stage_file("right.csv", "id\n").unwrap();

    let report = fixture.run_pipeline().unwrap();
    assert_eq!(report.decision.details[0].current.as_ref().unwrap().data_rows, 20_000);
}

#[test]
fn test_tiny_read_buffer_gives_same_fingerprints() {
    let fixture = two_file_fixture();
    fixture.stage_file("left.csv", "id,name\n1,a\n2,b\n").unwrap();
    fixture.stage_file("right.csv", "id\n").unwrap();
    let report = fixture.run_pipeline().unwrap();

    let config = fixture.config().unwrap();
    let store = fixture.workspace.state_store();
    let decision = snapgate::DecisionEngine::new(&store)
        .with_fingerprinter(FingerprintComputer::new(2))
        .evaluate(report.snapshot.as_ref().unwrap(), &config.core_files)
        .unwrap();

    // Buffer size never changes a hash, so the snapshot matches its own baseline
    assert_eq!(decision.outcome, Outcome::Skip);
    assert_eq!(decision.details[0].current.as_ref().unwrap().columns, vec!["id", "name"]);
}
