//! Project configuration and the core file set

use crate::error::{Result, SnapgateError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;

/// Files tracked by default: the public NBA box score dataset this tool was built around.
pub const DEFAULT_CORE_FILES: &[&str] = &[
    "Games.csv",
    "LeagueSchedule24_25.csv",
    "LeagueSchedule25_26.csv",
    "PlayerStatistics.csv",
    "Players.csv",
    "TeamHistories.csv",
    "TeamStatistics.csv",
];

pub const DEFAULT_BASE_NAME: &str = "nbadataset_temp_data";
pub const DEFAULT_SOURCE: &str = "Kaggle – eoinamoore/historical-nba-data-and-player-box-scores";
pub const DEFAULT_RETAIN_COUNT: usize = 2;

/// The fixed, known-in-advance list of files every snapshot must contain.
///
/// Names are kept in configuration order, which is also the order of the
/// per-file details in a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct CoreFileSet {
    files: Vec<String>,
}

impl CoreFileSet {
    /// Build a file set, rejecting duplicates and names that are not plain file names.
    ///
    /// An empty set is representable; callers that need at least one file
    /// (config validation, the decision engine) check for it themselves.
    pub fn new<I, S>(files: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut names = Vec::new();

        for file in files {
            let name = file.into();
            let trimmed = name.trim();
            if trimmed.is_empty() {
                return Err(SnapgateError::configuration("core file name must not be empty"));
            }
            if trimmed.contains('/') || trimmed.contains('\\') || trimmed == "." || trimmed == ".." {
                return Err(SnapgateError::configuration(format!(
                    "core file '{}' must be a plain file name, not a path",
                    trimmed
                )));
            }
            if trimmed.starts_with('.') {
                return Err(SnapgateError::configuration(format!(
                    "core file '{}' must not be a hidden file",
                    trimmed
                )));
            }
            if !seen.insert(trimmed.to_string()) {
                return Err(SnapgateError::configuration(format!(
                    "core file '{}' listed more than once",
                    trimmed
                )));
            }
            names.push(trimmed.to_string());
        }

        Ok(Self { files: names })
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.iter().any(|f| f == name)
    }

    /// Lower-cased extensions used by the set (e.g. `csv`)
    pub fn extensions(&self) -> BTreeSet<String> {
        self.files
            .iter()
            .filter_map(|f| Path::new(f).extension())
            .filter_map(|ext| ext.to_str())
            .map(str::to_lowercase)
            .collect()
    }
}

impl Default for CoreFileSet {
    fn default() -> Self {
        Self {
            files: DEFAULT_CORE_FILES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl TryFrom<Vec<String>> for CoreFileSet {
    type Error = SnapgateError;

    fn try_from(files: Vec<String>) -> Result<Self> {
        Self::new(files)
    }
}

impl From<CoreFileSet> for Vec<String> {
    fn from(set: CoreFileSet) -> Self {
        set.files
    }
}

/// Which audit log implementation a project writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuditFormat {
    #[default]
    Markdown,
    Jsonl,
}

/// Project configuration stored at `metadata/config.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default = "default_format_version")]
    pub format_version: String,
    /// Human-readable description of where snapshots come from
    #[serde(default = "default_source")]
    pub source: String,
    /// Suffix of version directory names (`v{N}_{base_name}`)
    #[serde(default = "default_base_name")]
    pub base_name: String,
    #[serde(default)]
    pub core_files: CoreFileSet,
    /// Complete versions kept on disk besides the one just ingested
    #[serde(default = "default_retain_count")]
    pub retain_count: usize,
    /// Columns that must appear in a file's header, keyed by file name
    #[serde(default)]
    pub expected_columns: IndexMap<String, Vec<String>>,
    #[serde(default)]
    pub audit_format: AuditFormat,
}

fn default_format_version() -> String {
    crate::FORMAT_VERSION.to_string()
}

fn default_source() -> String {
    DEFAULT_SOURCE.to_string()
}

fn default_base_name() -> String {
    DEFAULT_BASE_NAME.to_string()
}

fn default_retain_count() -> usize {
    DEFAULT_RETAIN_COUNT
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            format_version: default_format_version(),
            source: default_source(),
            base_name: default_base_name(),
            core_files: CoreFileSet::default(),
            retain_count: DEFAULT_RETAIN_COUNT,
            expected_columns: IndexMap::new(),
            audit_format: AuditFormat::default(),
        }
    }
}

impl ProjectConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SnapgateError::not_found(path));
        }
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.core_files.is_empty() {
            return Err(SnapgateError::configuration("core file set is empty"));
        }
        if self.retain_count == 0 {
            return Err(SnapgateError::configuration(
                "retain_count must be at least 1",
            ));
        }
        let base = self.base_name.trim();
        if base.is_empty() || base.contains('/') || base.contains('\\') {
            return Err(SnapgateError::configuration(format!(
                "invalid base_name '{}'",
                self.base_name
            )));
        }
        for file in self.expected_columns.keys() {
            if !self.core_files.contains(file) {
                return Err(SnapgateError::configuration(format!(
                    "expected_columns names '{}', which is not a core file",
                    file
                )));
            }
        }
        Ok(())
    }
}
