//! Command implementations for snapgate CLI

use crate::cli::{Commands, OutputFormat};
use crate::decision::DecisionEngine;
use crate::download::{CommandDownloader, DirectoryDownloader, Downloader};
use crate::error::{Result, SnapgateError};
use crate::lifecycle::{Snapshot, SnapshotLifecycle};
use crate::output::{JsonFormatter, PrettyPrinter};
use crate::pipeline::{Pipeline, RunOptions};
use crate::progress::ProgressReporter;
use crate::state::StateStore;
use crate::workspace::ProjectWorkspace;
use std::path::{Path, PathBuf};

/// Execute a command
pub fn execute_command(command: Commands, workspace_path: Option<&Path>) -> Result<()> {
    match command {
        Commands::Init { force } => init_command(workspace_path, force),
        Commands::Run {
            from,
            command,
            source_version,
            no_prune,
            json,
        } => run_command(workspace_path, from, command, source_version, no_prune, json),
        Commands::Check { version, json } => check_command(workspace_path, &version, json),
        Commands::List { format } => list_command(workspace_path, &format),
        Commands::Baseline { format } => baseline_command(workspace_path, &format),
        Commands::Cleanup {
            stale,
            retain,
            format,
        } => cleanup_command(workspace_path, stale, retain, &format),
        Commands::Reset { force } => reset_command(workspace_path, force),
    }
}

/// Initialize a snapgate project
fn init_command(workspace_path: Option<&Path>, force: bool) -> Result<()> {
    let current_dir = std::env::current_dir()?;
    let root = workspace_path.unwrap_or(&current_dir);

    // Always initialize in the given directory, never in a parent
    let workspace = ProjectWorkspace::create_new(root.to_path_buf())?;
    if force {
        workspace.create_config_with_force(true)?;
    }

    println!("✅ Initialized snapgate project at: {}", workspace.root.display());
    println!("📁 Snapshots directory: {}", workspace.snapshots_dir.display());
    println!("⚙️  Configuration: {}", workspace.config_path().display());

    Ok(())
}

/// Run the full download → decide → commit → prune → log pipeline
fn run_command(
    workspace_path: Option<&Path>,
    from: Option<PathBuf>,
    command: Vec<String>,
    source_version: Option<String>,
    no_prune: bool,
    json: bool,
) -> Result<()> {
    let workspace = ProjectWorkspace::find_or_create(workspace_path)?;
    let config = workspace.load_config()?;

    let mut downloader: Box<dyn Downloader> = match (from, command.split_first()) {
        (Some(dir), _) => Box::new(DirectoryDownloader::new(dir, config.core_files.clone())),
        (None, Some((program, args))) => Box::new(CommandDownloader::new(
            program.clone(),
            args.to_vec(),
            config.core_files.clone(),
        )),
        (None, None) => {
            return Err(SnapgateError::invalid_input(
                "run needs either --from <DIR> or --command <PROG>",
            ))
        }
    };

    let mut options = RunOptions::from_config(&config);
    options.prune = !no_prune;

    let reporter = if json {
        ProgressReporter::new_minimal()
    } else {
        ProgressReporter::new_for_run()
    };
    let on_fingerprint = |done: u64, total: u64| reporter.update_fingerprints(done, total);

    let mut store = workspace.state_store();
    let mut audit = workspace.audit_log(&config);
    let mut reporting = ReportingDownloader {
        inner: downloader.as_mut(),
        reporter: &reporter,
        source_version,
    };

    let report = Pipeline::new(
        workspace.lifecycle(&config),
        &mut store,
        &mut reporting,
        audit.as_mut(),
        options,
    )
    .with_progress(&on_fingerprint)
    .run()?;
    reporter.finish_all("Done");

    if json {
        println!("{}", JsonFormatter::format(&report.decision)?);
    } else {
        PrettyPrinter::print_decision(&report.decision);
        if !report.pruned.removed.is_empty() {
            println!();
            PrettyPrinter::print_cleanup(&report.pruned);
        }
    }

    Ok(())
}

/// Evaluate an existing snapshot against the baseline; nothing is written
fn check_command(workspace_path: Option<&Path>, version: &str, json: bool) -> Result<()> {
    let workspace = ProjectWorkspace::find_or_create(workspace_path)?;
    let config = workspace.load_config()?;
    let snapshot = resolve_snapshot(&workspace.lifecycle(&config), version)?;

    let store = workspace.state_store();
    let decision = DecisionEngine::new(&store)
        .with_expected_columns(config.expected_columns.clone())
        .evaluate(&snapshot, &config.core_files)?;

    if json {
        println!("{}", JsonFormatter::format(&decision)?);
    } else {
        PrettyPrinter::print_decision(&decision);
    }

    Ok(())
}

/// List snapshot versions
fn list_command(workspace_path: Option<&Path>, format: &str) -> Result<()> {
    let output_format = OutputFormat::parse(format).map_err(SnapgateError::invalid_input)?;
    let workspace = ProjectWorkspace::find_or_create(workspace_path)?;
    let config = workspace.load_config()?;
    let snapshots = workspace.lifecycle(&config).list_snapshots()?;

    match output_format {
        OutputFormat::Pretty => PrettyPrinter::print_snapshot_list(&snapshots),
        OutputFormat::Json => println!("{}", JsonFormatter::format_snapshot_list(&snapshots)?),
    }

    Ok(())
}

/// Show the stored baseline
fn baseline_command(workspace_path: Option<&Path>, format: &str) -> Result<()> {
    let output_format = OutputFormat::parse(format).map_err(SnapgateError::invalid_input)?;
    let workspace = ProjectWorkspace::find_or_create(workspace_path)?;
    let baseline = workspace.state_store().read_previous_state()?;

    match output_format {
        OutputFormat::Pretty => PrettyPrinter::print_baseline(baseline.as_ref()),
        OutputFormat::Json => println!("{}", JsonFormatter::format(&baseline)?),
    }

    Ok(())
}

/// Remove stale directories, or prune complete versions down to `retain`
fn cleanup_command(
    workspace_path: Option<&Path>,
    stale: bool,
    retain: Option<usize>,
    format: &str,
) -> Result<()> {
    let output_format = OutputFormat::parse(format).map_err(SnapgateError::invalid_input)?;
    let workspace = ProjectWorkspace::find_or_create(workspace_path)?;
    let config = workspace.load_config()?;
    let lifecycle = workspace.lifecycle(&config);

    let stats = if stale {
        lifecycle.cleanup_stale(None)?
    } else {
        let retain = retain.unwrap_or(config.retain_count);
        match lifecycle.latest_complete()? {
            Some(latest) => lifecycle.cleanup_on_ingest(&latest.version, retain)?,
            None => Default::default(),
        }
    };

    match output_format {
        OutputFormat::Pretty => PrettyPrinter::print_cleanup(&stats),
        OutputFormat::Json => println!("{}", JsonFormatter::format_cleanup(&stats)?),
    }
    Ok(())
}

/// Forget the stored baseline
fn reset_command(workspace_path: Option<&Path>, force: bool) -> Result<()> {
    if !force {
        return Err(SnapgateError::invalid_input(
            "reset clears the baseline permanently; pass --force to confirm",
        ));
    }

    let workspace = ProjectWorkspace::find_or_create(workspace_path)?;
    workspace.state_store().clear()?;
    println!("🗑️  Baseline cleared. The next run will be treated as a first run.");

    Ok(())
}

/// Accept either a full directory name or a bare version number
fn resolve_snapshot(lifecycle: &SnapshotLifecycle, version: &str) -> Result<Snapshot> {
    match version.parse::<u64>() {
        Ok(number) => lifecycle
            .list_snapshots()?
            .into_iter()
            .find(|s| s.version.number() == number)
            .ok_or_else(|| SnapgateError::VersionNotFound {
                name: version.to_string(),
            }),
        Err(_) => lifecycle.open(version),
    }
}

/// Shows a spinner while the wrapped downloader works
struct ReportingDownloader<'a> {
    inner: &'a mut dyn Downloader,
    reporter: &'a ProgressReporter,
    /// Given on the command line; wins over the inner downloader's answer
    source_version: Option<String>,
}

impl Downloader for ReportingDownloader<'_> {
    fn download(&mut self, version_path: &Path) -> Result<bool> {
        let name = version_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.reporter.start_download(&format!("Downloading {}...", name));

        let result = self.inner.download(version_path);
        let message = match &result {
            Ok(true) => format!("Downloaded {}", name),
            Ok(false) => format!("Downloaded {} (incomplete)", name),
            Err(_) => format!("Download of {} failed", name),
        };
        self.reporter.finish_download(&message);
        result
    }

    fn source_version(&mut self) -> Result<Option<String>> {
        match &self.source_version {
            Some(version) => Ok(Some(version.clone())),
            None => self.inner.source_version(),
        }
    }
}
