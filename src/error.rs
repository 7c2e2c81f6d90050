//! Error types for snapgate operations

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SnapgateError>;

#[derive(Error, Debug)]
pub enum SnapgateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Snapshot version not found: {name}")]
    VersionNotFound { name: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Persistence error: {message}")]
    Persistence { message: String },

    #[error("Download error: {message}")]
    Download { message: String },

    #[error("Invalid snapshot state transition for {version}: {from} -> {to}")]
    InvalidTransition {
        version: String,
        from: String,
        to: String,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Walkdir error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl SnapgateError {
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence {
            message: msg.into(),
        }
    }

    pub fn download(msg: impl Into<String>) -> Self {
        Self::Download {
            message: msg.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }
}
