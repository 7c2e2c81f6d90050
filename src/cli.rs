//! Command-line interface for snapgate

use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "snapgate")]
#[command(about = "Decide whether a freshly downloaded dataset snapshot should be ingested, skipped, or flagged")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project root (defaults to the nearest directory containing metadata/config.json)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a snapgate project
    Init {
        /// Overwrite an existing configuration with the defaults
        #[arg(long)]
        force: bool,
    },

    /// Download a new snapshot, decide, and record the outcome
    #[command(group(ArgGroup::new("source").required(true).args(["from", "command"])))]
    Run {
        /// Copy the core files from this directory
        #[arg(long)]
        from: Option<PathBuf>,

        /// Run this program (and arguments) with the snapshot directory appended; must come last
        #[arg(long, num_args = 1.., value_name = "PROG", allow_hyphen_values = true)]
        command: Vec<String>,

        /// Upstream version label; a run skips without downloading when it
        /// matches the label recorded at the last ingest
        #[arg(long, value_name = "LABEL")]
        source_version: Option<String>,

        /// Keep every old version after an ingest
        #[arg(long)]
        no_prune: bool,

        /// Output the decision as JSON
        #[arg(long)]
        json: bool,
    },

    /// Evaluate an existing snapshot without recording anything
    Check {
        /// Version directory name, or just its number
        version: String,

        /// Output the decision as JSON
        #[arg(long)]
        json: bool,
    },

    /// List snapshot versions
    List {
        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },

    /// Show the stored baseline
    Baseline {
        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },

    /// Remove old or abandoned snapshot directories
    #[command(group(ArgGroup::new("mode").required(true).args(["stale", "retain"])))]
    Cleanup {
        /// Remove every snapshot that never completed
        #[arg(long)]
        stale: bool,

        /// Keep this many complete versions besides the latest one
        #[arg(long, value_parser = validate_retain_count)]
        retain: Option<usize>,

        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },

    /// Forget the stored baseline; the next run is treated as a first run
    Reset {
        /// Required, as this cannot be undone
        #[arg(long)]
        force: bool,
    },
}

/// Parse output format string
#[derive(Debug, Clone)]
pub enum OutputFormat {
    Pretty,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {}. Use 'pretty' or 'json'", s)),
        }
    }
}

/// Validate that the retention count is greater than 0
fn validate_retain_count(s: &str) -> Result<usize, String> {
    let count: usize = s
        .parse()
        .map_err(|_| format!("Invalid retain count: '{}'. Must be a positive integer.", s))?;

    if count == 0 {
        return Err("Retain count must be greater than 0".to_string());
    }

    Ok(count)
}
