//! Populating a freshly allocated snapshot directory
//!
//! The remote side (API clients, credentials) is out of scope; these adapters
//! either copy from a staging directory or delegate to an external program.

use crate::config::CoreFileSet;
use crate::error::{Result, SnapgateError};
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Fills a version directory with dataset files
pub trait Downloader {
    /// Populate `version_path`; returns whether every core file arrived
    fn download(&mut self, version_path: &Path) -> Result<bool>;

    /// Upstream version label, asked before anything is downloaded
    ///
    /// `None` means the source cannot tell, and every run downloads.
    fn source_version(&mut self) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Copies the core files from a local directory
#[derive(Debug, Clone)]
pub struct DirectoryDownloader {
    source: PathBuf,
    core_files: CoreFileSet,
    version_file: Option<String>,
}

impl DirectoryDownloader {
    pub fn new(source: impl Into<PathBuf>, core_files: CoreFileSet) -> Self {
        Self {
            source: source.into(),
            core_files,
            version_file: None,
        }
    }

    /// Read the source version from a file inside the source directory
    pub fn with_version_file(mut self, name: impl Into<String>) -> Self {
        self.version_file = Some(name.into());
        self
    }
}

impl Downloader for DirectoryDownloader {
    fn download(&mut self, version_path: &Path) -> Result<bool> {
        if !self.source.is_dir() {
            return Err(SnapgateError::download(format!(
                "source directory does not exist: {}",
                self.source.display()
            )));
        }

        let mut copied = 0;
        for name in self.core_files.iter() {
            let from = self.source.join(name);
            if !from.is_file() {
                log::warn!("{} not found in {}", name, self.source.display());
                continue;
            }
            fs::copy(&from, version_path.join(name))
                .with_context(|| format!("failed to copy {}", from.display()))?;
            copied += 1;
        }

        log::info!(
            "Copied {}/{} core files from {}",
            copied,
            self.core_files.len(),
            self.source.display()
        );
        Ok(copied == self.core_files.len())
    }

    fn source_version(&mut self) -> Result<Option<String>> {
        let Some(name) = &self.version_file else {
            return Ok(None);
        };
        let path = self.source.join(name);
        if !path.is_file() {
            log::warn!("Version file {} not found; downloading anyway", path.display());
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let version = content.trim();
        Ok((!version.is_empty()).then(|| version.to_string()))
    }
}

/// Runs an external program with the version directory as its last argument
#[derive(Debug, Clone)]
pub struct CommandDownloader {
    program: String,
    args: Vec<String>,
    core_files: CoreFileSet,
}

impl CommandDownloader {
    pub fn new(program: impl Into<String>, args: Vec<String>, core_files: CoreFileSet) -> Self {
        Self {
            program: program.into(),
            args,
            core_files,
        }
    }
}

impl Downloader for CommandDownloader {
    fn download(&mut self, version_path: &Path) -> Result<bool> {
        log::info!("Running {} {:?} {}", self.program, self.args, version_path.display());
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(version_path)
            .status()
            .with_context(|| format!("failed to start {}", self.program))?;

        if !status.success() {
            return Err(SnapgateError::download(format!(
                "{} exited with {}",
                self.program, status
            )));
        }

        let present = self
            .core_files
            .iter()
            .filter(|name| version_path.join(name).is_file())
            .count();
        log::debug!("{}/{} core files present after download", present, self.core_files.len());
        Ok(present == self.core_files.len())
    }
}
