//! Integration tests for run, check, list, baseline, cleanup and reset

use crate::common::{sample_data, CliTestRunner};
use snapgate::audit::JsonLinesAuditLog;
use snapgate::config::AuditFormat;
use snapgate::decision::{Outcome, ReasonCode};
use snapgate::{SnapgateError, StateStore};
use std::fs;

fn staged_runner() -> CliTestRunner {
    let runner = CliTestRunner::new().unwrap();
    runner
        .fixture()
        .stage_dataset(&sample_data::nba_dataset())
        .unwrap();
    runner
}

fn run_from_staging(runner: &CliTestRunner) {
    let staging = runner.fixture().staging_dir();
    runner.expect_success(&["run", "--json", "--from", staging.to_str().unwrap()]);
}

#[test]
fn test_run_creates_version_and_baseline() {
    let runner = staged_runner();
    run_from_staging(&runner);

    let fixture = runner.fixture();
    assert_eq!(fixture.snapshot_names().unwrap(), vec!["v1_nbadataset_temp_data"]);

    let baseline = fixture
        .workspace
        .state_store()
        .read_previous_state()
        .unwrap()
        .unwrap();
    assert_eq!(baseline.len(), 7);
    assert!(fixture.workspace.fingerprints_dir.join("Games.csv.json").exists());

    let log = fixture.ingestion_log().unwrap();
    assert!(log.starts_with("# Ingestion Log"));
    assert!(log.contains("**Status:** ✅ INGEST"));
}

#[test]
fn test_second_identical_run_skips() {
    let runner = staged_runner();
    run_from_staging(&runner);
    run_from_staging(&runner);

    let log = runner.fixture().ingestion_log().unwrap();
    assert_eq!(log.matches("Change Detection Run").count(), 2);
    assert!(log.contains("**Status:** ⏭️ SKIP"));
    assert_eq!(runner.fixture().snapshot_names().unwrap().len(), 2);
}

#[test]
fn test_run_with_recorded_source_version_skips_download() {
    let runner = staged_runner();
    let fixture = runner.fixture();
    let mut config = fixture.config().unwrap();
    config.audit_format = AuditFormat::Jsonl;
    fixture.save_config(&config).unwrap();
    let staging = fixture.staging_dir();
    let run = |label: &str| {
        runner.expect_success(&[
            "run",
            "--json",
            "--source-version",
            label,
            "--from",
            staging.to_str().unwrap(),
        ])
    };

    run("12");
    run("12");
    assert_eq!(fixture.snapshot_names().unwrap(), vec!["v1_nbadataset_temp_data"]);

    run("13");
    assert_eq!(fixture.snapshot_names().unwrap().len(), 2);

    let log = JsonLinesAuditLog::new(fixture.workspace.audit_log_path(AuditFormat::Jsonl));
    let decisions = log.read_all().unwrap();
    let reasons: Vec<ReasonCode> = decisions.iter().map(|d| d.reason).collect();
    assert_eq!(
        reasons,
        vec![ReasonCode::FirstRun, ReasonCode::SourceUnchanged, ReasonCode::Unchanged]
    );
    assert_eq!(decisions[1].version, "unallocated");
}

#[test]
fn test_run_with_jsonl_audit_format() {
    let runner = staged_runner();
    let fixture = runner.fixture();
    let mut config = fixture.config().unwrap();
    config.audit_format = AuditFormat::Jsonl;
    fixture.save_config(&config).unwrap();

    run_from_staging(&runner);
    run_from_staging(&runner);

    let log = JsonLinesAuditLog::new(fixture.workspace.audit_log_path(AuditFormat::Jsonl));
    let decisions = log.read_all().unwrap();
    assert_eq!(decisions.len(), 2);
    assert_eq!(decisions[0].reason, ReasonCode::FirstRun);
    assert_eq!(decisions[1].outcome, Outcome::Skip);
    assert!(!fixture.workspace.audit_log_path(AuditFormat::Markdown).exists());
}

#[test]
fn test_run_from_missing_directory_fails_and_logs() {
    let runner = CliTestRunner::new().unwrap();
    let missing = runner.fixture().root().join("no-such-dir");

    let error = runner.expect_failure(&["run", "--from", missing.to_str().unwrap()]);
    assert!(matches!(error, SnapgateError::Download { .. }), "got: {}", error);

    let log = runner.fixture().ingestion_log().unwrap();
    assert!(log.contains("**Status:** ⚠️ ALERT"));
    assert!(log.contains("source directory does not exist"));
}

#[cfg(unix)]
#[test]
fn test_run_with_command_downloader() {
    let runner = staged_runner();
    let staging = runner.fixture().staging_dir();
    let script = format!("cp \"{}\"/*.csv \"$0\"", staging.display());

    runner.expect_success(&["run", "--json", "--command", "sh", "-c", &script]);

    let baseline = runner
        .fixture()
        .workspace
        .state_store()
        .read_previous_state()
        .unwrap();
    assert_eq!(baseline.map(|b| b.len()), Some(7));
}

#[test]
fn test_check_does_not_write_anything() {
    let runner = staged_runner();
    run_from_staging(&runner);

    let fixture = runner.fixture();
    let log_before = fixture.ingestion_log().unwrap();
    let record = fixture.workspace.fingerprints_dir.join("Games.csv.json");
    let record_before = fs::read_to_string(&record).unwrap();

    runner.expect_success(&["check", "1", "--json"]);
    runner.expect_success(&["check", "v1_nbadataset_temp_data"]);

    assert_eq!(fixture.ingestion_log().unwrap(), log_before);
    assert_eq!(fs::read_to_string(&record).unwrap(), record_before);
}

#[test]
fn test_check_unknown_version() {
    let runner = CliTestRunner::new().unwrap();
    let error = runner.expect_failure(&["check", "v42_nbadataset_temp_data"]);
    assert!(matches!(error, SnapgateError::VersionNotFound { .. }));
}

#[test]
fn test_list_and_baseline_commands() {
    let runner = staged_runner();
    runner.expect_success(&["list"]);
    runner.expect_success(&["baseline"]);

    run_from_staging(&runner);
    runner.expect_success(&["list", "--format", "json"]);
    runner.expect_success(&["baseline", "--format", "json"]);

    let error = runner.expect_failure(&["list", "--format", "xml"]);
    assert!(matches!(error, SnapgateError::InvalidInput { .. }));
}

#[test]
fn test_cleanup_stale_removes_abandoned_dirs() {
    let runner = staged_runner();
    run_from_staging(&runner);

    let fixture = runner.fixture();
    let abandoned = fixture.workspace.snapshots_dir.join("v7_nbadataset_temp_data");
    fs::create_dir_all(&abandoned).unwrap();
    fs::write(abandoned.join("Games.csv"), "partial").unwrap();

    runner.expect_success(&["cleanup", "--stale", "--format", "json"]);

    assert!(!abandoned.exists());
    assert_eq!(fixture.snapshot_names().unwrap(), vec!["v1_nbadataset_temp_data"]);
}

#[test]
fn test_cleanup_retain_keeps_latest_plus_n() {
    let runner = staged_runner();
    let fixture = runner.fixture();
    let mut config = fixture.config().unwrap();
    config.retain_count = 5;
    fixture.save_config(&config).unwrap();

    for i in 0..4 {
        fixture
            .stage_file("Players.csv", &format!("personId\n{}\n", i))
            .unwrap();
        run_from_staging(&runner);
    }
    assert_eq!(fixture.snapshot_names().unwrap().len(), 4);

    runner.expect_success(&["cleanup", "--retain", "1"]);
    assert_eq!(
        fixture.snapshot_names().unwrap(),
        vec!["v3_nbadataset_temp_data", "v4_nbadataset_temp_data"]
    );
}

#[test]
fn test_reset_requires_force_then_clears() {
    let runner = staged_runner();
    run_from_staging(&runner);

    let error = runner.expect_failure(&["reset"]);
    assert!(matches!(error, SnapgateError::InvalidInput { .. }));

    runner.expect_success(&["reset", "--force"]);
    let store = runner.fixture().workspace.state_store();
    assert!(store.read_previous_state().unwrap().is_none());

    // The next run starts over as a first run
    run_from_staging(&runner);
    let log = runner.fixture().ingestion_log().unwrap();
    assert_eq!(log.matches("(first_run)").count(), 2);
}
