//! Change detection and the ingest/skip/alert decision
//!
//! The engine compares the fingerprints of a snapshot against the stored
//! baseline, one [`ComparisonDetail`] per core file, and classifies the run.
//! Rules are checked in a fixed order and the first match wins:
//!
//! 1. alert: snapshot incomplete
//! 2. alert: a core file is missing
//! 3. alert: dataset files outside the core set are present
//! 4. alert: a file lacks columns it is configured to have, or its header
//!    differs from the one recorded with the baseline
//! 5. alert: a file's row count moved while its hash did not
//! 6. ingest: no baseline yet
//! 7. ingest: any file changed or new
//! 8. skip: everything unchanged
//!
//! The engine only reads state. Persisting the baseline is the caller's job
//! once it has committed to an ingest.

use crate::config::CoreFileSet;
use crate::error::{Result, SnapgateError};
use crate::fingerprint::{FileFingerprint, FingerprintComputer};
use crate::lifecycle::Snapshot;
use crate::state::{Baseline, StateStore};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Terminal classification of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Ingest,
    Skip,
    Alert,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Outcome::Ingest => "ingest",
            Outcome::Skip => "skip",
            Outcome::Alert => "alert",
        };
        f.write_str(label)
    }
}

/// Machine-readable reason behind an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    FirstRun,
    ContentChanged,
    Unchanged,
    IncompleteSnapshot,
    MissingFiles,
    UnexpectedFiles,
    SchemaMismatch,
    RowCountMismatch,
    DownloadFailed,
    RunFailed,
    SourceUnchanged,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::FirstRun => "first_run",
            ReasonCode::ContentChanged => "content_changed",
            ReasonCode::Unchanged => "unchanged",
            ReasonCode::IncompleteSnapshot => "incomplete_snapshot",
            ReasonCode::MissingFiles => "missing_files",
            ReasonCode::UnexpectedFiles => "unexpected_files",
            ReasonCode::SchemaMismatch => "schema_mismatch",
            ReasonCode::RowCountMismatch => "row_count_mismatch",
            ReasonCode::DownloadFailed => "download_failed",
            ReasonCode::RunFailed => "run_failed",
            ReasonCode::SourceUnchanged => "source_unchanged",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-file comparison status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Unchanged,
    Changed,
    New,
    Missing,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FileStatus::Unchanged => "unchanged",
            FileStatus::Changed => "changed",
            FileStatus::New => "new",
            FileStatus::Missing => "missing",
        };
        f.write_str(label)
    }
}

/// Baseline versus current state of one core file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonDetail {
    pub file_name: String,
    pub previous: Option<FileFingerprint>,
    pub current: Option<FileFingerprint>,
    pub hash_changed: bool,
    /// Current data rows minus previous data rows; 0 unless both sides exist
    pub row_count_delta: i64,
    pub status: FileStatus,
}

impl ComparisonDetail {
    pub fn build(
        file_name: &str,
        previous: Option<FileFingerprint>,
        current: Option<FileFingerprint>,
    ) -> Self {
        let (hash_changed, row_count_delta, status) = match (&previous, &current) {
            (_, None) => (false, 0, FileStatus::Missing),
            (None, Some(_)) => (false, 0, FileStatus::New),
            (Some(prev), Some(curr)) => {
                let hash_changed = prev.hash != curr.hash;
                let delta = curr.data_rows as i64 - prev.data_rows as i64;
                let rows_changed = delta != 0 || prev.total_rows != curr.total_rows;
                let status = if hash_changed || rows_changed {
                    FileStatus::Changed
                } else {
                    FileStatus::Unchanged
                };
                (hash_changed, delta, status)
            }
        };

        Self {
            file_name: file_name.to_string(),
            previous,
            current,
            hash_changed,
            row_count_delta,
            status,
        }
    }

    /// Row counts differ although the content hash is identical
    pub fn is_row_count_mismatch(&self) -> bool {
        self.status == FileStatus::Changed && !self.hash_changed
    }

    fn same_content(&self, other: &Self) -> bool {
        self.file_name == other.file_name
            && self.hash_changed == other.hash_changed
            && self.row_count_delta == other.row_count_delta
            && self.status == other.status
            && same_fingerprint(&self.previous, &other.previous)
            && same_fingerprint(&self.current, &other.current)
    }
}

fn same_fingerprint(a: &Option<FileFingerprint>, b: &Option<FileFingerprint>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            a.file_name == b.file_name
                && a.hash == b.hash
                && a.total_rows == b.total_rows
                && a.data_rows == b.data_rows
                && a.columns == b.columns
        }
        _ => false,
    }
}

/// What a header was checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaIssueKind {
    /// Columns configured in `expected_columns`
    #[default]
    MissingExpected,
    /// The header stored with the baseline
    BaselineDrift,
}

/// A header that lacks columns it should have, or no longer matches the baseline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaIssue {
    pub file_name: String,
    #[serde(default)]
    pub kind: SchemaIssueKind,
    pub missing_columns: Vec<String>,
    /// Columns absent from the baseline header; drift only
    #[serde(default)]
    pub added_columns: Vec<String>,
}

impl SchemaIssue {
    fn describe(&self) -> String {
        match self.kind {
            SchemaIssueKind::MissingExpected => {
                format!("{} ({})", self.file_name, self.missing_columns.join(", "))
            }
            SchemaIssueKind::BaselineDrift => {
                let mut parts = Vec::new();
                if !self.missing_columns.is_empty() {
                    parts.push(format!("removed: {}", self.missing_columns.join(", ")));
                }
                if !self.added_columns.is_empty() {
                    parts.push(format!("added: {}", self.added_columns.join(", ")));
                }
                if parts.is_empty() {
                    parts.push("columns reordered".to_string());
                }
                format!("{} ({})", self.file_name, parts.join("; "))
            }
        }
    }
}

/// Outcome of one run, handed to the audit log and then dropped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub run_id: Uuid,
    pub outcome: Outcome,
    pub reason: ReasonCode,
    pub message: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub baseline_present: bool,
    #[serde(default)]
    pub unexpected_files: Vec<String>,
    #[serde(default)]
    pub schema_issues: Vec<SchemaIssue>,
    pub details: Vec<ComparisonDetail>,
}

impl Decision {
    /// An alert for a run that failed before a comparison could be made
    pub fn failure(version: &str, reason: ReasonCode, message: impl Into<String>) -> Self {
        Self::without_comparison(Outcome::Alert, reason, version, message.into())
    }

    /// A skip decided from the upstream version label alone
    pub fn source_unchanged(version: &str, source_version: &str, baseline_present: bool) -> Self {
        let mut decision = Self::without_comparison(
            Outcome::Skip,
            ReasonCode::SourceUnchanged,
            version,
            format!("source unchanged (version {}); nothing downloaded", source_version),
        );
        decision.baseline_present = baseline_present;
        decision
    }

    fn without_comparison(outcome: Outcome, reason: ReasonCode, version: &str, message: String) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            outcome,
            reason,
            message,
            version: version.to_string(),
            timestamp: Utc::now(),
            baseline_present: false,
            unexpected_files: Vec::new(),
            schema_issues: Vec::new(),
            details: Vec::new(),
        }
    }

    /// Same verdict over the same inputs, ignoring run id and capture times
    pub fn is_equivalent(&self, other: &Self) -> bool {
        self.outcome == other.outcome
            && self.reason == other.reason
            && self.message == other.message
            && self.version == other.version
            && self.baseline_present == other.baseline_present
            && self.unexpected_files == other.unexpected_files
            && self.schema_issues == other.schema_issues
            && self.details.len() == other.details.len()
            && self
                .details
                .iter()
                .zip(&other.details)
                .all(|(a, b)| a.same_content(b))
    }

    /// The fingerprints that become the new baseline if this decision is an ingest
    pub fn current_baseline(&self) -> Baseline {
        self.details
            .iter()
            .filter_map(|d| d.current.clone())
            .map(|fp| (fp.file_name.clone(), fp))
            .collect::<crate::fingerprint::Fingerprints>()
            .into()
    }

    pub fn files_with_status(&self, status: FileStatus) -> Vec<&str> {
        self.details
            .iter()
            .filter(|d| d.status == status)
            .map(|d| d.file_name.as_str())
            .collect()
    }
}

/// Compares snapshots against the stored baseline
pub struct DecisionEngine<'a> {
    store: &'a dyn StateStore,
    fingerprinter: FingerprintComputer,
    expected_columns: IndexMap<String, Vec<String>>,
    progress: Option<&'a (dyn Fn(u64, u64) + Sync)>,
}

impl<'a> DecisionEngine<'a> {
    pub fn new(store: &'a dyn StateStore) -> Self {
        Self {
            store,
            fingerprinter: FingerprintComputer::default(),
            expected_columns: IndexMap::new(),
            progress: None,
        }
    }

    pub fn with_expected_columns(mut self, expected_columns: IndexMap<String, Vec<String>>) -> Self {
        self.expected_columns = expected_columns;
        self
    }

    pub fn with_fingerprinter(mut self, fingerprinter: FingerprintComputer) -> Self {
        self.fingerprinter = fingerprinter;
        self
    }

    pub fn with_progress(mut self, progress: &'a (dyn Fn(u64, u64) + Sync)) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Classify `snapshot` against the baseline
    pub fn evaluate(&self, snapshot: &Snapshot, core_files: &CoreFileSet) -> Result<Decision> {
        if core_files.is_empty() {
            return Err(SnapgateError::configuration(
                "core file set is empty; nothing to compare",
            ));
        }
        if !snapshot.path.is_dir() {
            return Err(SnapgateError::not_found(&snapshot.path));
        }

        let timestamp = Utc::now();
        log::info!("Evaluating snapshot {}", snapshot.version);

        let baseline = self.store.read_previous_state()?;
        let current = self.fingerprinter.compute_snapshot_with_progress(
            &snapshot.path,
            core_files,
            timestamp,
            self.progress,
        )?;
        let unexpected_files = self.fingerprinter.scan_unexpected(&snapshot.path, core_files)?;

        let details: Vec<ComparisonDetail> = core_files
            .iter()
            .map(|name| {
                ComparisonDetail::build(
                    name,
                    baseline.as_ref().and_then(|b| b.get(name)).cloned(),
                    current.get(name).cloned(),
                )
            })
            .collect();
        let schema_issues = self.schema_issues(&details);

        let (outcome, reason, message) = classify(&Classification {
            complete: snapshot.is_complete(),
            baseline_present: baseline.is_some(),
            details: &details,
            unexpected_files: &unexpected_files,
            schema_issues: &schema_issues,
        });

        if outcome == Outcome::Ingest {
            for detail in details.iter().filter(|d| d.row_count_delta < 0) {
                log::warn!(
                    "{}: {} rows removed since baseline",
                    detail.file_name,
                    -detail.row_count_delta
                );
            }
        }
        log::info!("Decision for {}: {} ({})", snapshot.version, outcome, message);

        Ok(Decision {
            run_id: Uuid::new_v4(),
            outcome,
            reason,
            message,
            version: snapshot.version.to_string(),
            timestamp,
            baseline_present: baseline.is_some(),
            unexpected_files,
            schema_issues,
            details,
        })
    }

    /// Configured-column checks first, then header drift against the baseline
    fn schema_issues(&self, details: &[ComparisonDetail]) -> Vec<SchemaIssue> {
        let expected = details.iter().filter_map(|detail| {
            let expected = self.expected_columns.get(&detail.file_name)?;
            let current = detail.current.as_ref()?;
            let missing = columns_not_in(expected, &current.columns);
            (!missing.is_empty()).then(|| SchemaIssue {
                file_name: detail.file_name.clone(),
                kind: SchemaIssueKind::MissingExpected,
                missing_columns: missing,
                added_columns: Vec::new(),
            })
        });

        // An empty header on either side carries no schema to compare
        let drift = details.iter().filter_map(|detail| {
            let previous = detail.previous.as_ref()?;
            let current = detail.current.as_ref()?;
            if previous.columns.is_empty()
                || current.columns.is_empty()
                || previous.columns == current.columns
            {
                return None;
            }
            Some(SchemaIssue {
                file_name: detail.file_name.clone(),
                kind: SchemaIssueKind::BaselineDrift,
                missing_columns: columns_not_in(&previous.columns, &current.columns),
                added_columns: columns_not_in(&current.columns, &previous.columns),
            })
        });

        expected.chain(drift).collect()
    }
}

fn columns_not_in(columns: &[String], header: &[String]) -> Vec<String> {
    columns
        .iter()
        .filter(|col| !header.contains(col))
        .cloned()
        .collect()
}

struct Classification<'a> {
    complete: bool,
    baseline_present: bool,
    details: &'a [ComparisonDetail],
    unexpected_files: &'a [String],
    schema_issues: &'a [SchemaIssue],
}

fn classify(input: &Classification<'_>) -> (Outcome, ReasonCode, String) {
    let names_with = |status: FileStatus| -> Vec<&str> {
        input
            .details
            .iter()
            .filter(|d| d.status == status)
            .map(|d| d.file_name.as_str())
            .collect()
    };

    if !input.complete {
        let present = input.details.iter().filter(|d| d.current.is_some()).count();
        return (
            Outcome::Alert,
            ReasonCode::IncompleteSnapshot,
            format!(
                "snapshot is incomplete: {} of {} core files present",
                present,
                input.details.len()
            ),
        );
    }

    let missing = names_with(FileStatus::Missing);
    if !missing.is_empty() {
        return (
            Outcome::Alert,
            ReasonCode::MissingFiles,
            format!(
                "{}: {}",
                plural(missing.len(), "missing expected file", "missing expected files"),
                missing.join(", ")
            ),
        );
    }

    if !input.unexpected_files.is_empty() {
        return (
            Outcome::Alert,
            ReasonCode::UnexpectedFiles,
            format!(
                "{}: {}",
                plural(input.unexpected_files.len(), "unexpected file", "unexpected files"),
                input.unexpected_files.join(", ")
            ),
        );
    }

    if !input.schema_issues.is_empty() {
        let describe = |kind: SchemaIssueKind| -> Vec<String> {
            input
                .schema_issues
                .iter()
                .filter(|issue| issue.kind == kind)
                .map(SchemaIssue::describe)
                .collect()
        };
        let mut parts = Vec::new();
        let missing = describe(SchemaIssueKind::MissingExpected);
        if !missing.is_empty() {
            parts.push(format!("missing expected columns: {}", missing.join("; ")));
        }
        let drifted = describe(SchemaIssueKind::BaselineDrift);
        if !drifted.is_empty() {
            parts.push(format!("schema changed since baseline: {}", drifted.join("; ")));
        }
        return (Outcome::Alert, ReasonCode::SchemaMismatch, parts.join("; "));
    }

    let mismatched: Vec<&str> = input
        .details
        .iter()
        .filter(|d| d.is_row_count_mismatch())
        .map(|d| d.file_name.as_str())
        .collect();
    if !mismatched.is_empty() {
        return (
            Outcome::Alert,
            ReasonCode::RowCountMismatch,
            format!(
                "row count changed without content change: {}",
                mismatched.join(", ")
            ),
        );
    }

    if !input.baseline_present {
        return (
            Outcome::Ingest,
            ReasonCode::FirstRun,
            format!(
                "first known snapshot: baseline ingestion ({} files)",
                input.details.len()
            ),
        );
    }

    let changed = names_with(FileStatus::Changed);
    let new = names_with(FileStatus::New);
    if !changed.is_empty() || !new.is_empty() {
        let mut parts = Vec::new();
        if !changed.is_empty() {
            parts.push(format!(
                "{} {}: {}",
                changed.len(),
                plural(changed.len(), "file changed", "files changed"),
                changed.join(", ")
            ));
        }
        if !new.is_empty() {
            parts.push(format!(
                "{} {}: {}",
                new.len(),
                plural(new.len(), "new file", "new files"),
                new.join(", ")
            ));
        }
        return (Outcome::Ingest, ReasonCode::ContentChanged, parts.join("; "));
    }

    (
        Outcome::Skip,
        ReasonCode::Unchanged,
        format!(
            "no changes detected: {} files identical to baseline",
            input.details.len()
        ),
    )
}

fn plural(count: usize, one: &'static str, many: &'static str) -> &'static str {
    if count == 1 {
        one
    } else {
        many
    }
}
