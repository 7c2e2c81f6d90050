//! Edge case tests for filesystem-related scenarios

use crate::common::{sample_data, CliTestRunner, TestFixture};
use snapgate::decision::{Outcome, ReasonCode};
use snapgate::lifecycle::{SnapshotState, MARKER_FILE};
use snapgate::{SnapgateError, StateStore};
use std::fs;

#[test]
fn test_corrupt_baseline_record_fails_run_and_logs_alert() {
    let fixture = TestFixture::new().unwrap();
    fixture.stage_dataset(&sample_data::nba_dataset()).unwrap();
    fixture.run_pipeline().unwrap();

    let record = fixture.workspace.fingerprints_dir.join("Games.csv.json");
    fs::write(&record, "{ not json").unwrap();

    let error = fixture.run_pipeline().unwrap_err();
    assert!(matches!(error, SnapgateError::Persistence { .. }), "got: {}", error);

    let log = fixture.ingestion_log().unwrap();
    assert_eq!(log.matches("Change Detection Run").count(), 2);
    assert!(log.contains("corrupt baseline record"));
    // The corrupt record is never replaced by a guess
    assert_eq!(fs::read_to_string(&record).unwrap(), "{ not json");
}

#[test]
fn test_leftover_temp_record_does_not_affect_baseline() {
    let fixture = TestFixture::new().unwrap();
    fixture.stage_dataset(&sample_data::nba_dataset()).unwrap();
    fixture.run_pipeline().unwrap();

    // Residue of a crash mid-save
    fs::write(fixture.workspace.fingerprints_dir.join(".record-x1y2z3"), "{").unwrap();

    let report = fixture.run_pipeline().unwrap();
    assert_eq!(report.decision.outcome, Outcome::Skip);
}

#[test]
fn test_unexpected_dataset_file_alerts() {
    let fixture = TestFixture::new().unwrap();
    fixture.stage_dataset(&sample_data::nba_dataset()).unwrap();
    let first = fixture.run_pipeline().unwrap();

    fs::write(first.snapshot.as_ref().unwrap().path.join("Referees.csv"), "refId\n1\n").unwrap();
    fs::write(first.snapshot.as_ref().unwrap().path.join("README.md"), "docs").unwrap();

    let config = fixture.config().unwrap();
    let store = fixture.workspace.state_store();
    let decision = snapgate::DecisionEngine::new(&store)
        .evaluate(first.snapshot.as_ref().unwrap(), &config.core_files)
        .unwrap();

    assert_eq!(decision.reason, ReasonCode::UnexpectedFiles);
    assert_eq!(decision.unexpected_files, vec!["Referees.csv"]);
}

#[test]
fn test_marker_file_is_not_a_dataset_file() {
    let fixture = TestFixture::new().unwrap();
    fixture.stage_dataset(&sample_data::nba_dataset()).unwrap();
    let report = fixture.run_pipeline().unwrap();

    assert!(report.snapshot.as_ref().unwrap().path.join(MARKER_FILE).exists());
    assert!(report.decision.unexpected_files.is_empty());
}

#[test]
fn test_directory_without_marker_is_incomplete() {
    let fixture = TestFixture::new().unwrap();
    let stray = fixture.workspace.snapshots_dir.join("v3_nbadataset_temp_data");
    fs::create_dir_all(&stray).unwrap();

    let config = fixture.config().unwrap();
    let lifecycle = fixture.workspace.lifecycle(&config);
    let snapshot = lifecycle.open("v3_nbadataset_temp_data").unwrap();
    assert_eq!(snapshot.state, SnapshotState::Incomplete);
    assert!(lifecycle.latest_complete().unwrap().is_none());
}

#[test]
fn test_unrelated_directories_are_ignored() {
    let fixture = TestFixture::new().unwrap();
    fs::create_dir_all(fixture.workspace.snapshots_dir.join("scratch")).unwrap();
    fs::create_dir_all(fixture.workspace.snapshots_dir.join("v_broken")).unwrap();
    fs::write(fixture.workspace.snapshots_dir.join("v9_file_not_dir"), "x").unwrap();
    fixture.stage_dataset(&sample_data::nba_dataset()).unwrap();

    let report = fixture.run_pipeline().unwrap();
    assert_eq!(report.snapshot.as_ref().unwrap().version.number(), 1);
    assert!(fixture.workspace.snapshots_dir.join("scratch").exists());
}

#[test]
fn test_run_recreates_missing_config() {
    let runner = CliTestRunner::new().unwrap();
    fs::remove_file(runner.fixture().workspace.config_path()).unwrap();
    let staging = runner.fixture().staging_dir();
    fs::create_dir_all(&staging).unwrap();

    // find_or_create recreates the default config, so the run proceeds and alerts
    runner.expect_success(&["run", "--from", staging.to_str().unwrap()]);
    assert!(runner.fixture().workspace.config_path().exists());
    let log = runner.fixture().ingestion_log().unwrap();
    assert!(log.contains("**Status:** ⚠️ ALERT"));
}

#[test]
fn test_reset_on_fresh_project_is_harmless() {
    let runner = CliTestRunner::new().unwrap();
    runner.expect_success(&["reset", "--force"]);
    assert!(runner
        .fixture()
        .workspace
        .state_store()
        .read_previous_state()
        .unwrap()
        .is_none());
}

#[cfg(unix)]
#[test]
fn test_failing_download_command_marks_incomplete() {
    let runner = CliTestRunner::new().unwrap();
    let error = runner.expect_failure(&["run", "--command", "sh", "-c", "exit 3"]);
    assert!(matches!(error, SnapgateError::Download { .. }), "got: {}", error);

    let config = runner.fixture().config().unwrap();
    let snapshots = runner
        .fixture()
        .workspace
        .lifecycle(&config)
        .list_snapshots()
        .unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].state, SnapshotState::Incomplete);

    runner.expect_success(&["cleanup", "--stale"]);
    assert!(runner.fixture().snapshot_names().unwrap().is_empty());
}

#[test]
fn test_unreadable_state_dir_is_treated_as_no_baseline() {
    let fixture = TestFixture::new().unwrap();
    fs::remove_dir_all(&fixture.workspace.fingerprints_dir).unwrap();

    assert!(fixture
        .workspace
        .state_store()
        .read_previous_state()
        .unwrap()
        .is_none());

    fixture.stage_dataset(&sample_data::nba_dataset()).unwrap();
    let report = fixture.run_pipeline().unwrap();
    assert_eq!(report.decision.reason, ReasonCode::FirstRun);
    assert!(fixture.workspace.fingerprints_dir.join("Games.csv.json").exists());
}
