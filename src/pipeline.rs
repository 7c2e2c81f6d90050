//! One batch run: allocate, download, evaluate, commit, prune, log
//!
//! Every run ends with exactly one audit record, whichever branch it takes.
//! Runs that stop before a version is named are recorded as `unallocated`.
//! The baseline is written only after an ingest decision and always before
//! any version is pruned.

use crate::audit::AuditLog;
use crate::config::{CoreFileSet, ProjectConfig};
use crate::decision::{Decision, DecisionEngine, Outcome, ReasonCode};
use crate::download::Downloader;
use crate::error::{Result, SnapgateError};
use crate::lifecycle::{CleanupStats, Snapshot, SnapshotLifecycle, SnapshotState, VersionAllocator};
use crate::state::StateStore;
use indexmap::IndexMap;

/// Knobs for a run, usually taken from the project configuration
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub core_files: CoreFileSet,
    pub retain_count: usize,
    pub expected_columns: IndexMap<String, Vec<String>>,
    /// Prune old versions after an ingest
    pub prune: bool,
}

impl RunOptions {
    pub fn from_config(config: &ProjectConfig) -> Self {
        Self {
            core_files: config.core_files.clone(),
            retain_count: config.retain_count,
            expected_columns: config.expected_columns.clone(),
            prune: true,
        }
    }
}

/// Version label on audit records of runs that never allocated a version
pub const UNALLOCATED: &str = "unallocated";

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub decision: Decision,
    /// `None` when the run skipped before allocating a version
    pub snapshot: Option<Snapshot>,
    pub pruned: CleanupStats,
}

pub struct Pipeline<'a> {
    lifecycle: SnapshotLifecycle,
    allocator: Box<dyn VersionAllocator + 'a>,
    store: &'a mut dyn StateStore,
    downloader: &'a mut dyn Downloader,
    audit: &'a mut dyn AuditLog,
    options: RunOptions,
    progress: Option<&'a (dyn Fn(u64, u64) + Sync)>,
}

impl<'a> Pipeline<'a> {
    /// Versions are numbered by scanning `lifecycle`'s root
    pub fn new(
        lifecycle: SnapshotLifecycle,
        store: &'a mut dyn StateStore,
        downloader: &'a mut dyn Downloader,
        audit: &'a mut dyn AuditLog,
        options: RunOptions,
    ) -> Self {
        Self {
            allocator: Box::new(lifecycle.clone()),
            lifecycle,
            store,
            downloader,
            audit,
            options,
            progress: None,
        }
    }

    pub fn with_allocator(mut self, allocator: impl VersionAllocator + 'a) -> Self {
        self.allocator = Box::new(allocator);
        self
    }

    /// Called with `(done, total)` while fingerprinting
    pub fn with_progress(mut self, progress: &'a (dyn Fn(u64, u64) + Sync)) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn run(&mut self) -> Result<RunReport> {
        let source_version = match self.downloader.source_version() {
            Ok(source_version) => source_version,
            Err(e) => return Err(self.record_failure(UNALLOCATED, ReasonCode::DownloadFailed, e)),
        };
        if let Some(report) = self.skip_if_source_unchanged(source_version.as_deref())? {
            return Ok(report);
        }

        let version = match self.allocator.next_version_name() {
            Ok(version) => version,
            Err(e) => return Err(self.record_failure(UNALLOCATED, ReasonCode::RunFailed, e)),
        };
        log::info!("Starting run for {}", version);

        let mut snapshot = match self.lifecycle.allocate(&version) {
            Ok(snapshot) => snapshot,
            Err(e) => return Err(self.record_failure(version.name(), ReasonCode::RunFailed, e)),
        };
        if let Err(e) = self.lifecycle.mark(&mut snapshot, SnapshotState::Downloading) {
            return Err(self.record_failure(version.name(), ReasonCode::RunFailed, e));
        }

        let complete = match self.downloader.download(&snapshot.path) {
            Ok(complete) => complete,
            Err(e) => {
                if let Err(mark_err) = self.lifecycle.mark(&mut snapshot, SnapshotState::Incomplete) {
                    log::error!("Could not mark {} incomplete: {}", version, mark_err);
                }
                return Err(self.record_failure(version.name(), ReasonCode::DownloadFailed, e));
            }
        };

        let next = if complete {
            SnapshotState::Complete
        } else {
            SnapshotState::Incomplete
        };
        if let Err(e) = self.lifecycle.mark(&mut snapshot, next) {
            return Err(self.record_failure(version.name(), ReasonCode::RunFailed, e));
        }

        let evaluated = {
            let mut engine = DecisionEngine::new(&*self.store)
                .with_expected_columns(self.options.expected_columns.clone());
            if let Some(progress) = self.progress {
                engine = engine.with_progress(progress);
            }
            engine.evaluate(&snapshot, &self.options.core_files)
        };
        let decision = match evaluated {
            Ok(decision) => decision,
            Err(e) => return Err(self.record_failure(version.name(), ReasonCode::RunFailed, e)),
        };

        let mut pruned = CleanupStats::default();
        if decision.outcome == Outcome::Ingest {
            if let Err(e) = self.store.save_current_state(&decision.current_baseline()) {
                return Err(self.record_failure(version.name(), ReasonCode::RunFailed, e));
            }
            if let Some(source_version) = &source_version {
                if let Err(e) = self.store.save_source_version(source_version) {
                    return Err(self.record_failure(version.name(), ReasonCode::RunFailed, e));
                }
            }
            if self.options.prune {
                match self
                    .lifecycle
                    .cleanup_on_ingest(&version, self.options.retain_count)
                {
                    Ok(stats) => pruned = stats,
                    // Baseline is already committed; keep the ingest and report the leftovers
                    Err(e) => log::warn!("Pruning after ingest of {} failed: {}", version, e),
                }
            }
        }

        self.audit.append(&decision)?;
        log::info!("Run for {} finished: {}", version, decision.outcome);

        Ok(RunReport {
            decision,
            snapshot: Some(snapshot),
            pruned,
        })
    }

    /// A skip report when upstream still carries the version last ingested
    fn skip_if_source_unchanged(&mut self, source_version: Option<&str>) -> Result<Option<RunReport>> {
        let Some(source_version) = source_version else {
            return Ok(None);
        };
        let recorded = match self.store.read_source_version() {
            Ok(recorded) => recorded,
            Err(e) => return Err(self.record_failure(UNALLOCATED, ReasonCode::RunFailed, e)),
        };
        if recorded.as_deref() != Some(source_version) {
            log::info!(
                "Source version {} (last ingested: {})",
                source_version,
                recorded.as_deref().unwrap_or("none")
            );
            return Ok(None);
        }

        let baseline_present = matches!(self.store.read_previous_state(), Ok(Some(_)));
        let decision = Decision::source_unchanged(UNALLOCATED, source_version, baseline_present);
        self.audit.append(&decision)?;
        log::info!("Source unchanged at version {}; skipping download", source_version);

        Ok(Some(RunReport {
            decision,
            snapshot: None,
            pruned: CleanupStats::default(),
        }))
    }

    /// Log an alert for a run that could not finish and hand back the error
    fn record_failure(&mut self, version: &str, reason: ReasonCode, error: SnapgateError) -> SnapgateError {
        log::error!("Run for {} failed: {}", version, error);
        let mut decision = Decision::failure(version, reason, error.to_string());
        decision.baseline_present = matches!(self.store.read_previous_state(), Ok(Some(_)));

        if let Err(audit_err) = self.audit.append(&decision) {
            log::error!("Could not record failure of {}: {}", version, audit_err);
        }
        error
    }
}
