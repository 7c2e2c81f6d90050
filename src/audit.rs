//! Append-only record of every run decision

use crate::decision::Decision;
use crate::error::{Result, SnapgateError};
use crate::output::MarkdownRenderer;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Destination for run decisions. Records are only ever appended.
pub trait AuditLog {
    fn append(&mut self, decision: &Decision) -> Result<()>;
}

/// Human-readable log: one markdown section per run
#[derive(Debug, Clone)]
pub struct MarkdownAuditLog {
    path: PathBuf,
    source: String,
}

impl MarkdownAuditLog {
    pub fn new(path: impl Into<PathBuf>, source: &str) -> Self {
        Self {
            path: path.into(),
            source: source.to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditLog for MarkdownAuditLog {
    fn append(&mut self, decision: &Decision) -> Result<()> {
        let section = MarkdownRenderer::render_decision(decision, &self.source);
        let header = if self.path.exists() {
            None
        } else {
            Some(MarkdownRenderer::HEADER)
        };
        append_to(&self.path, header, &section)?;
        log::info!("Logged {} decision to {}", decision.outcome, self.path.display());
        Ok(())
    }
}

/// Machine-readable log: one JSON object per line
#[derive(Debug, Clone)]
pub struct JsonLinesAuditLog {
    path: PathBuf,
}

impl JsonLinesAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every decision logged so far, oldest first
    pub fn read_all(&self) -> Result<Vec<Decision>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(SnapgateError::from))
            .collect()
    }
}

impl AuditLog for JsonLinesAuditLog {
    fn append(&mut self, decision: &Decision) -> Result<()> {
        let mut line = serde_json::to_string(decision)?;
        line.push('\n');
        append_to(&self.path, None, &line)?;
        log::info!("Logged {} decision to {}", decision.outcome, self.path.display());
        Ok(())
    }
}

/// Keeps decisions in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditLog {
    entries: Vec<Decision>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Decision] {
        &self.entries
    }
}

impl AuditLog for MemoryAuditLog {
    fn append(&mut self, decision: &Decision) -> Result<()> {
        self.entries.push(decision.clone());
        Ok(())
    }
}

fn append_to(path: &Path, header: Option<&str>, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if let Some(header) = header {
        file.write_all(header.as_bytes())?;
    }
    file.write_all(content.as_bytes())?;
    file.flush()?;
    Ok(())
}
