//! Project layout on disk
//!
//! ```text
//! <root>/
//!   data/temp/                 versioned snapshot directories
//!   metadata/config.json       project configuration
//!   metadata/fingerprints/     baseline records
//!   metadata/ingestion_log.md  audit log (or ingestion_log.jsonl)
//! ```

use crate::audit::{AuditLog, JsonLinesAuditLog, MarkdownAuditLog};
use crate::config::{AuditFormat, ProjectConfig};
use crate::error::Result;
use crate::lifecycle::SnapshotLifecycle;
use crate::state::FileStateStore;
use std::fs;
use std::path::{Path, PathBuf};

const GITIGNORE_ENTRY: &str = "data/temp/";

/// A snapgate project rooted at one directory
#[derive(Debug, Clone)]
pub struct ProjectWorkspace {
    /// Project root directory (where metadata/ lives)
    pub root: PathBuf,
    /// data/temp/ directory path
    pub snapshots_dir: PathBuf,
    /// metadata/ directory path
    pub metadata_dir: PathBuf,
    /// metadata/fingerprints/ directory path
    pub fingerprints_dir: PathBuf,
}

impl ProjectWorkspace {
    /// Find existing workspace or create a new one
    pub fn find_or_create(start_dir: Option<&Path>) -> Result<Self> {
        let current_dir = std::env::current_dir()?;
        let start = start_dir.unwrap_or(&current_dir);

        if let Some(workspace) = Self::find_existing(start)? {
            return Ok(workspace);
        }

        Self::create_new(start.to_path_buf())
    }

    /// Walk up from `start_dir` looking for `metadata/config.json`.
    ///
    /// The search stops at a git repository root.
    pub fn find_existing(start_dir: &Path) -> Result<Option<Self>> {
        let mut current = start_dir;

        loop {
            if current.join("metadata").join("config.json").is_file() {
                return Ok(Some(Self::from_root(current.to_path_buf())));
            }
            if current.join(".git").exists() {
                break;
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }

        Ok(None)
    }

    /// Create a new workspace in the specified root directory
    pub fn create_new(root: PathBuf) -> Result<Self> {
        let workspace = Self::from_root(root);

        fs::create_dir_all(&workspace.snapshots_dir)?;
        fs::create_dir_all(&workspace.fingerprints_dir)?;
        workspace.create_config_with_force(false)?;
        workspace.ensure_gitignore()?;

        log::info!("Created snapgate workspace at: {}", workspace.root.display());
        Ok(workspace)
    }

    pub fn from_root(root: PathBuf) -> Self {
        let metadata_dir = root.join("metadata");
        Self {
            snapshots_dir: root.join("data").join("temp"),
            fingerprints_dir: metadata_dir.join("fingerprints"),
            metadata_dir,
            root,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.metadata_dir.join("config.json")
    }

    /// Write the default configuration unless one exists and `force` is unset
    pub fn create_config_with_force(&self, force: bool) -> Result<()> {
        let config_path = self.config_path();
        if config_path.exists() && !force {
            return Ok(());
        }
        fs::create_dir_all(&self.metadata_dir)?;
        ProjectConfig::default().save(&config_path)
    }

    pub fn load_config(&self) -> Result<ProjectConfig> {
        ProjectConfig::load(&self.config_path())
    }

    pub fn state_store(&self) -> FileStateStore {
        FileStateStore::new(&self.fingerprints_dir)
    }

    pub fn lifecycle(&self, config: &ProjectConfig) -> SnapshotLifecycle {
        SnapshotLifecycle::new(&self.snapshots_dir, &config.base_name)
    }

    pub fn audit_log_path(&self, format: AuditFormat) -> PathBuf {
        match format {
            AuditFormat::Markdown => self.metadata_dir.join("ingestion_log.md"),
            AuditFormat::Jsonl => self.metadata_dir.join("ingestion_log.jsonl"),
        }
    }

    /// The audit log selected by the configuration
    pub fn audit_log(&self, config: &ProjectConfig) -> Box<dyn AuditLog> {
        let path = self.audit_log_path(config.audit_format);
        match config.audit_format {
            AuditFormat::Markdown => Box::new(MarkdownAuditLog::new(path, &config.source)),
            AuditFormat::Jsonl => Box::new(JsonLinesAuditLog::new(path)),
        }
    }

    /// Ensure .gitignore keeps raw snapshots out of version control
    pub fn ensure_gitignore(&self) -> Result<()> {
        let gitignore_path = self.root.join(".gitignore");
        let ignore_block = format!("# Raw dataset snapshots\n{}\n", GITIGNORE_ENTRY);

        if gitignore_path.exists() {
            let content = fs::read_to_string(&gitignore_path)?;
            if !content.lines().any(|line| line.trim() == GITIGNORE_ENTRY) {
                let new_content = if content.ends_with('\n') {
                    format!("{}\n{}", content, ignore_block)
                } else {
                    format!("{}\n\n{}", content, ignore_block)
                };
                fs::write(gitignore_path, new_content)?;
                log::info!("Updated .gitignore with snapshot directory");
            }
        } else {
            fs::write(gitignore_path, ignore_block)?;
            log::info!("Created .gitignore with snapshot directory");
        }

        Ok(())
    }
}
