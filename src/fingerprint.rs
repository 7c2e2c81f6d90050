//! Content fingerprints for snapshot files

use crate::config::CoreFileSet;
use crate::error::{Result, SnapgateError};
use blake3::Hasher;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use walkdir::WalkDir;

/// A hash value represented as a hex string
pub type HashValue = String;

/// Fingerprints keyed by file name
pub type Fingerprints = BTreeMap<String, FileFingerprint>;

/// Default read buffer for streaming hashes
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Longest header line we keep for column extraction
const MAX_HEADER_BYTES: usize = 64 * 1024;

/// State of one tracked file at capture time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFingerprint {
    pub file_name: String,
    pub hash: HashValue,
    /// Every line, header included
    pub total_rows: u64,
    /// Lines after the header
    pub data_rows: u64,
    #[serde(default)]
    pub columns: Vec<String>,
    pub captured_at: DateTime<Utc>,
}

/// Computes fingerprints for the files of a snapshot directory
pub struct FingerprintComputer {
    buffer_size: usize,
}

impl Default for FingerprintComputer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

impl FingerprintComputer {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
        }
    }

    /// Fingerprint every core file present in `dir`.
    ///
    /// Absent files get no entry. Any I/O failure on a present file aborts the
    /// whole computation.
    pub fn compute_snapshot(
        &self,
        dir: &Path,
        core_files: &CoreFileSet,
        captured_at: DateTime<Utc>,
    ) -> Result<Fingerprints> {
        self.compute_snapshot_with_progress(dir, core_files, captured_at, None)
    }

    /// Same as [`compute_snapshot`](Self::compute_snapshot), reporting `(done, total)` after each file
    pub fn compute_snapshot_with_progress(
        &self,
        dir: &Path,
        core_files: &CoreFileSet,
        captured_at: DateTime<Utc>,
        progress_callback: Option<&(dyn Fn(u64, u64) + Sync)>,
    ) -> Result<Fingerprints> {
        if !dir.is_dir() {
            return Err(SnapgateError::not_found(dir));
        }

        let present: Vec<&str> = core_files
            .iter()
            .filter(|name| dir.join(name).is_file())
            .collect();
        let total = present.len() as u64;
        let done = std::sync::atomic::AtomicU64::new(0);

        let results: Vec<Result<FileFingerprint>> = present
            .par_iter()
            .map(|name| {
                let fingerprint = self.fingerprint_file(&dir.join(name), name, captured_at);
                let finished = done.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                if let Some(callback) = progress_callback {
                    callback(finished, total);
                }
                fingerprint
            })
            .collect();

        let mut fingerprints = Fingerprints::new();
        for result in results {
            let fingerprint = result?;
            fingerprints.insert(fingerprint.file_name.clone(), fingerprint);
        }

        log::debug!(
            "Fingerprinted {}/{} core files in {}",
            fingerprints.len(),
            core_files.len(),
            dir.display()
        );
        Ok(fingerprints)
    }

    /// Hash, count lines and read the header of one file in a single pass
    pub fn fingerprint_file(
        &self,
        path: &Path,
        file_name: &str,
        captured_at: DateTime<Utc>,
    ) -> Result<FileFingerprint> {
        let file = File::open(path)?;
        let mut reader = BufReader::with_capacity(self.buffer_size, file);
        let mut buffer = vec![0u8; self.buffer_size];

        let mut hasher = Hasher::new();
        let mut newlines = 0u64;
        let mut last_byte = None;
        let mut header = Vec::new();
        let mut header_done = false;

        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            let chunk = &buffer[..bytes_read];
            hasher.update(chunk);
            newlines += chunk.iter().filter(|&&b| b == b'\n').count() as u64;
            last_byte = chunk.last().copied();

            if !header_done {
                match chunk.iter().position(|&b| b == b'\n') {
                    Some(end) => {
                        header.extend_from_slice(&chunk[..end]);
                        header_done = true;
                    }
                    None => header.extend_from_slice(chunk),
                }
                if header.len() > MAX_HEADER_BYTES {
                    header.truncate(MAX_HEADER_BYTES);
                    header_done = true;
                }
            }
        }

        // A trailing line without a newline still counts
        let total_rows = match last_byte {
            Some(b'\n') | None => newlines,
            Some(_) => newlines + 1,
        };

        Ok(FileFingerprint {
            file_name: file_name.to_string(),
            hash: hasher.finalize().to_hex().to_string(),
            total_rows,
            data_rows: total_rows.saturating_sub(1),
            columns: parse_header(&header),
            captured_at,
        })
    }

    /// Dataset-looking files in `dir` that are not part of the core set.
    ///
    /// Only files sharing an extension with a core file count; hidden files and
    /// unrelated files (readmes, licenses) are ignored.
    pub fn scan_unexpected(&self, dir: &Path, core_files: &CoreFileSet) -> Result<Vec<String>> {
        let extensions = core_files.extensions();
        let mut unexpected = Vec::new();

        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            if name.starts_with('.') || core_files.contains(name) {
                continue;
            }
            let matches_extension = Path::new(name)
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| extensions.contains(&ext.to_lowercase()))
                .unwrap_or(false);
            if matches_extension {
                unexpected.push(name.to_string());
            }
        }

        unexpected.sort();
        Ok(unexpected)
    }
}

/// Split a CSV header line into trimmed, unquoted column names
fn parse_header(line: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim_start_matches('\u{feff}').trim_end_matches('\r');
    text.split(',')
        .map(|col| col.trim().trim_matches('"').trim().to_string())
        .filter(|col| !col.is_empty())
        .collect()
}
