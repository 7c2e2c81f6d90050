//! Durable baseline storage
//!
//! The baseline is the fingerprint set of the last ingested snapshot. Each
//! tracked file gets its own JSON record; records are replaced with a
//! write-to-temp-then-rename so a crash mid-save leaves the previous record
//! readable.
//!
//! Next to the records sits the upstream version label that was current at
//! the last ingest, so a run can skip the download when it has not moved.

use crate::error::{Result, SnapgateError};
use crate::fingerprint::{FileFingerprint, Fingerprints};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const RECORD_EXTENSION: &str = "json";
const TEMP_PREFIX: &str = ".record-";
/// Hidden, so baseline reads never mistake it for a file record
const SOURCE_VERSION_FILE: &str = ".source_version.json";

/// Fingerprints of the last successfully ingested snapshot
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Baseline {
    files: BTreeMap<String, FileFingerprint>,
}

impl Baseline {
    pub fn new(files: Fingerprints) -> Self {
        Self { files }
    }

    pub fn get(&self, name: &str) -> Option<&FileFingerprint> {
        self.files.get(name)
    }

    pub fn files(&self) -> &Fingerprints {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileFingerprint> {
        self.files.values()
    }
}

impl From<Fingerprints> for Baseline {
    fn from(files: Fingerprints) -> Self {
        Self::new(files)
    }
}

/// Storage for the single live baseline
pub trait StateStore {
    /// The stored baseline, or `None` before the first ingest
    fn read_previous_state(&self) -> Result<Option<Baseline>>;

    /// Persist one record per file, replacing earlier records of the same name
    fn save_current_state(&mut self, baseline: &Baseline) -> Result<()>;

    /// Forget the baseline entirely, source version included
    fn clear(&mut self) -> Result<()>;

    /// Upstream version label recorded at the last ingest
    fn read_source_version(&self) -> Result<Option<String>>;

    fn save_source_version(&mut self, version: &str) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct SourceVersionRecord {
    version: String,
    recorded_at: DateTime<Utc>,
}

/// Baseline kept as one JSON file per tracked file
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record for `file_name`
    pub fn record_path(&self, file_name: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", sanitize_filename(file_name), RECORD_EXTENSION))
    }

    fn source_version_path(&self) -> PathBuf {
        self.dir.join(SOURCE_VERSION_FILE)
    }

    fn write_record(&self, fingerprint: &FileFingerprint) -> Result<()> {
        let content = serde_json::to_vec_pretty(fingerprint)?;
        self.write_atomic(
            &self.record_path(&fingerprint.file_name),
            &content,
            &fingerprint.file_name,
        )
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            SnapgateError::persistence(format!(
                "failed to create state directory {}: {}",
                self.dir.display(),
                e
            ))
        })
    }

    fn write_atomic(&self, target: &Path, content: &[u8], label: &str) -> Result<()> {
        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.dir)
            .map_err(|e| {
                SnapgateError::persistence(format!(
                    "failed to create temp record in {}: {}",
                    self.dir.display(),
                    e
                ))
            })?;
        write_and_sync(&mut temp, content).map_err(|e| {
            SnapgateError::persistence(format!("failed to write record for {}: {}", label, e))
        })?;
        temp.persist(target).map_err(|e| {
            SnapgateError::persistence(format!(
                "failed to move record into place at {}: {}",
                target.display(),
                e.error
            ))
        })?;
        Ok(())
    }

    fn read_record(path: &Path) -> Result<FileFingerprint> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            SnapgateError::persistence(format!(
                "corrupt baseline record {}: {}",
                path.display(),
                e
            ))
        })
    }
}

fn write_and_sync(temp: &mut NamedTempFile, content: &[u8]) -> std::io::Result<()> {
    temp.write_all(content)?;
    temp.as_file_mut().sync_all()
}

impl StateStore for FileStateStore {
    fn read_previous_state(&self) -> Result<Option<Baseline>> {
        if !self.dir.is_dir() {
            return Ok(None);
        }

        let mut files = BTreeMap::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_record = path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(RECORD_EXTENSION)
                && !path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with('.'))
                    .unwrap_or(true);
            if !is_record {
                continue;
            }
            let record = Self::read_record(&path)?;
            files.insert(record.file_name.clone(), record);
        }

        if files.is_empty() {
            return Ok(None);
        }
        log::debug!("Loaded baseline with {} records from {}", files.len(), self.dir.display());
        Ok(Some(Baseline::new(files)))
    }

    fn save_current_state(&mut self, baseline: &Baseline) -> Result<()> {
        self.ensure_dir()?;

        for fingerprint in baseline.iter() {
            self.write_record(fingerprint)?;
        }

        log::info!(
            "Saved baseline: {} records to {}",
            baseline.len(),
            self.dir.display()
        );
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        if !self.dir.is_dir() {
            return Ok(());
        }
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        log::info!("Cleared baseline ({} records)", removed);
        Ok(())
    }

    fn read_source_version(&self) -> Result<Option<String>> {
        let path = self.source_version_path();
        if !path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let record: SourceVersionRecord = serde_json::from_str(&content).map_err(|e| {
            SnapgateError::persistence(format!(
                "corrupt source version record {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Some(record.version))
    }

    fn save_source_version(&mut self, version: &str) -> Result<()> {
        self.ensure_dir()?;
        let record = SourceVersionRecord {
            version: version.to_string(),
            recorded_at: Utc::now(),
        };
        let content = serde_json::to_vec_pretty(&record)?;
        self.write_atomic(&self.source_version_path(), &content, "source version")?;
        log::debug!("Recorded source version {}", version);
        Ok(())
    }
}

/// In-memory store for tests and dry runs
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    baseline: Option<Baseline>,
    source_version: Option<String>,
    saves: usize,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_baseline(baseline: Baseline) -> Self {
        Self {
            baseline: Some(baseline),
            ..Self::default()
        }
    }

    /// Number of successful `save_current_state` calls
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl StateStore for MemoryStateStore {
    fn read_previous_state(&self) -> Result<Option<Baseline>> {
        Ok(self.baseline.clone().filter(|b| !b.is_empty()))
    }

    fn save_current_state(&mut self, baseline: &Baseline) -> Result<()> {
        let mut merged = self.baseline.take().unwrap_or_default();
        for fingerprint in baseline.iter() {
            merged
                .files
                .insert(fingerprint.file_name.clone(), fingerprint.clone());
        }
        self.baseline = Some(merged);
        self.saves += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.baseline = None;
        self.source_version = None;
        Ok(())
    }

    fn read_source_version(&self) -> Result<Option<String>> {
        Ok(self.source_version.clone())
    }

    fn save_source_version(&mut self, version: &str) -> Result<()> {
        self.source_version = Some(version.to_string());
        Ok(())
    }
}

/// Replace characters outside `[A-Za-z0-9_.-]` and cap the length at 100
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .take(100)
        .collect()
}
