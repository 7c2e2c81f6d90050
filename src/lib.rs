//! # snapgate
//!
//! Change detection for recurring dataset downloads. Each run lands in a new
//! versioned snapshot directory, is fingerprinted against the baseline of the
//! last ingested snapshot, and ends in exactly one decision (ingest, skip or
//! alert) that is appended to an audit log.

pub mod audit;
pub mod cli;
pub mod commands;
pub mod config;
pub mod decision;
pub mod download;
pub mod error;
pub mod fingerprint;
pub mod lifecycle;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod state;
pub mod workspace;

pub use config::{CoreFileSet, ProjectConfig};
pub use decision::{Decision, DecisionEngine, Outcome, ReasonCode};
pub use error::{Result, SnapgateError};
pub use lifecycle::{Snapshot, SnapshotLifecycle, SnapshotState, VersionId};
pub use pipeline::{Pipeline, RunOptions, RunReport};
pub use state::{Baseline, FileStateStore, StateStore};
pub use workspace::ProjectWorkspace;

/// Current format version for snapgate metadata files
pub const FORMAT_VERSION: &str = "1.0.0";
