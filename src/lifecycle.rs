//! Versioned snapshot directories: allocation, state tracking and pruning
//!
//! Snapshots live as `v{N}_{base_name}` directories under a single root. Each
//! carries a hidden `.snapshot.json` marker recording where it is in the
//! `allocated -> downloading -> complete | incomplete` lifecycle. Numbering is
//! monotonic: a high-water mark in `<root>/.sequence` keeps numbers from being
//! reused after the newest directory is deleted.

use crate::error::{Result, SnapgateError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const MARKER_FILE: &str = ".snapshot.json";
pub const SEQUENCE_FILE: &str = ".sequence";

/// Identifier of one snapshot version, e.g. `v4_nbadataset_temp_data`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionId {
    number: u64,
    name: String,
}

impl VersionId {
    pub fn new(number: u64, base_name: &str) -> Self {
        Self {
            number,
            name: format!("v{}_{}", number, base_name),
        }
    }

    /// Parse a directory name of the form `v{digits}_{anything}`
    pub fn parse(dir_name: &str) -> Option<Self> {
        let rest = dir_name.strip_prefix('v')?;
        let (digits, suffix) = rest.split_once('_')?;
        if digits.is_empty() || suffix.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let number = digits.parse().ok()?;
        Some(Self {
            number,
            name: dir_name.to_string(),
        })
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Where a snapshot is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotState {
    Allocated,
    Downloading,
    Complete,
    Incomplete,
}

impl SnapshotState {
    pub fn can_transition_to(self, next: SnapshotState) -> bool {
        use SnapshotState::*;
        matches!(
            (self, next),
            (Allocated, Downloading)
                | (Allocated, Incomplete)
                | (Downloading, Complete)
                | (Downloading, Incomplete)
        )
    }
}

impl fmt::Display for SnapshotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SnapshotState::Allocated => "allocated",
            SnapshotState::Downloading => "downloading",
            SnapshotState::Complete => "complete",
            SnapshotState::Incomplete => "incomplete",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotMarker {
    version: String,
    state: SnapshotState,
    updated_at: DateTime<Utc>,
}

/// One versioned snapshot directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub version: VersionId,
    pub path: PathBuf,
    pub state: SnapshotState,
}

impl Snapshot {
    pub fn new(version: VersionId, path: impl Into<PathBuf>, state: SnapshotState) -> Self {
        Self {
            version,
            path: path.into(),
            state,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == SnapshotState::Complete
    }
}

/// Source of new version identifiers
pub trait VersionAllocator {
    fn next_version_name(&mut self) -> Result<VersionId>;
}

/// Deterministic allocator handing out a fixed list of numbers
#[derive(Debug, Clone)]
pub struct FixedSequence {
    base_name: String,
    numbers: VecDeque<u64>,
}

impl FixedSequence {
    pub fn new(base_name: &str, numbers: impl IntoIterator<Item = u64>) -> Self {
        Self {
            base_name: base_name.to_string(),
            numbers: numbers.into_iter().collect(),
        }
    }
}

impl VersionAllocator for FixedSequence {
    fn next_version_name(&mut self) -> Result<VersionId> {
        self.numbers
            .pop_front()
            .map(|n| VersionId::new(n, &self.base_name))
            .ok_or_else(|| SnapgateError::invalid_input("version sequence exhausted"))
    }
}

/// Result of a pruning pass
#[derive(Debug, Default, Clone)]
pub struct CleanupStats {
    pub removed: Vec<VersionId>,
    pub bytes_freed: u64,
}

/// Manages the snapshot directories under one root
#[derive(Debug, Clone)]
pub struct SnapshotLifecycle {
    root: PathBuf,
    base_name: String,
}

impl SnapshotLifecycle {
    pub fn new(root: impl Into<PathBuf>, base_name: &str) -> Self {
        Self {
            root: root.into(),
            base_name: base_name.to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn version_path(&self, version: &VersionId) -> PathBuf {
        self.root.join(version.name())
    }

    /// Create the directory for `version` in state `allocated`
    pub fn allocate(&self, version: &VersionId) -> Result<Snapshot> {
        fs::create_dir_all(&self.root)?;
        let path = self.version_path(version);
        if path.exists() {
            return Err(SnapgateError::invalid_input(format!(
                "version directory already exists: {}",
                path.display()
            )));
        }
        fs::create_dir(&path)?;

        let snapshot = Snapshot::new(version.clone(), path, SnapshotState::Allocated);
        write_marker(&snapshot)?;

        if version.number() > self.high_water_mark()? {
            fs::write(self.root.join(SEQUENCE_FILE), version.number().to_string())?;
        }

        log::info!("Allocated snapshot {}", version);
        Ok(snapshot)
    }

    /// Move `snapshot` to `next`, persisting the marker
    pub fn mark(&self, snapshot: &mut Snapshot, next: SnapshotState) -> Result<()> {
        if !snapshot.state.can_transition_to(next) {
            return Err(SnapgateError::InvalidTransition {
                version: snapshot.version.to_string(),
                from: snapshot.state.to_string(),
                to: next.to_string(),
            });
        }
        snapshot.state = next;
        write_marker(snapshot)?;
        log::debug!("Snapshot {} is now {}", snapshot.version, next);
        Ok(())
    }

    /// Every version directory under the root, oldest first
    pub fn list_snapshots(&self) -> Result<Vec<Snapshot>> {
        let mut snapshots = Vec::new();
        if !self.root.is_dir() {
            return Ok(snapshots);
        }

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(version) = entry.file_name().to_str().and_then(|name| self.parse_own(name))
            else {
                continue;
            };
            let path = entry.path();
            let state = read_marker_state(&path);
            snapshots.push(Snapshot::new(version, path, state));
        }

        snapshots.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(snapshots)
    }

    /// Look up a snapshot by directory name
    pub fn open(&self, name: &str) -> Result<Snapshot> {
        self.list_snapshots()?
            .into_iter()
            .find(|s| s.version.name() == name)
            .ok_or_else(|| SnapgateError::VersionNotFound {
                name: name.to_string(),
            })
    }

    pub fn latest_complete(&self) -> Result<Option<Snapshot>> {
        Ok(self
            .list_snapshots()?
            .into_iter()
            .rev()
            .find(Snapshot::is_complete))
    }

    /// After an ingest, delete the oldest complete versions other than `current`
    /// until at most `retain_count` of them remain.
    ///
    /// Directories that are not complete are left for [`cleanup_stale`](Self::cleanup_stale).
    pub fn cleanup_on_ingest(&self, current: &VersionId, retain_count: usize) -> Result<CleanupStats> {
        if retain_count == 0 {
            return Err(SnapgateError::configuration("retain_count must be at least 1"));
        }

        let prior: Vec<Snapshot> = self
            .list_snapshots()?
            .into_iter()
            .filter(|s| s.is_complete() && &s.version != current)
            .collect();

        let mut stats = CleanupStats::default();
        let excess = prior.len().saturating_sub(retain_count);
        for snapshot in prior.iter().take(excess) {
            self.remove(snapshot, &mut stats)?;
        }

        if stats.removed.is_empty() {
            log::debug!("{} complete prior versions, nothing to prune", prior.len());
        }
        Ok(stats)
    }

    /// Remove every directory that never reached `complete`, except `exclude`
    pub fn cleanup_stale(&self, exclude: Option<&VersionId>) -> Result<CleanupStats> {
        let mut stats = CleanupStats::default();
        for snapshot in self.list_snapshots()? {
            if snapshot.is_complete() || Some(&snapshot.version) == exclude {
                continue;
            }
            self.remove(&snapshot, &mut stats)?;
        }
        Ok(stats)
    }

    fn remove(&self, snapshot: &Snapshot, stats: &mut CleanupStats) -> Result<()> {
        let size = dir_size(&snapshot.path)?;
        fs::remove_dir_all(&snapshot.path)?;
        log::info!("Removed {} snapshot: {}", snapshot.state, snapshot.version);
        stats.bytes_freed += size;
        stats.removed.push(snapshot.version.clone());
        Ok(())
    }

    /// A version directory that belongs to this base name, spelled canonically
    fn parse_own(&self, dir_name: &str) -> Option<VersionId> {
        VersionId::parse(dir_name).filter(|version| {
            version.name() == VersionId::new(version.number(), &self.base_name).name()
        })
    }

    fn high_water_mark(&self) -> Result<u64> {
        let path = self.root.join(SEQUENCE_FILE);
        if !path.exists() {
            return Ok(0);
        }
        let content = fs::read_to_string(&path)?;
        content.trim().parse().map_err(|_| {
            SnapgateError::persistence(format!("corrupt version sequence file: {}", path.display()))
        })
    }
}

impl VersionAllocator for SnapshotLifecycle {
    fn next_version_name(&mut self) -> Result<VersionId> {
        let highest_on_disk = self
            .list_snapshots()?
            .iter()
            .map(|s| s.version.number())
            .max()
            .unwrap_or(0);
        let next = highest_on_disk
            .max(self.high_water_mark()?)
            .checked_add(1)
            .ok_or_else(|| {
                SnapgateError::configuration(format!(
                    "version numbers exhausted under {}",
                    self.root.display()
                ))
            })?;
        Ok(VersionId::new(next, &self.base_name))
    }
}

fn write_marker(snapshot: &Snapshot) -> Result<()> {
    let marker = SnapshotMarker {
        version: snapshot.version.to_string(),
        state: snapshot.state,
        updated_at: Utc::now(),
    };
    fs::write(
        snapshot.path.join(MARKER_FILE),
        serde_json::to_string_pretty(&marker)?,
    )?;
    Ok(())
}

/// A missing or unreadable marker means the directory was left behind by a failed run
fn read_marker_state(dir: &Path) -> SnapshotState {
    fs::read_to_string(dir.join(MARKER_FILE))
        .ok()
        .and_then(|content| serde_json::from_str::<SnapshotMarker>(&content).ok())
        .map(|marker| marker.state)
        .unwrap_or(SnapshotState::Incomplete)
}

fn dir_size(path: &Path) -> Result<u64> {
    let mut total = 0;
    for entry in WalkDir::new(path) {
        let entry = entry?;
        if entry.file_type().is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}
