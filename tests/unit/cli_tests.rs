//! Unit tests for CLI argument parsing and validation

use clap::Parser;
use snapgate::cli::{Cli, Commands, OutputFormat};
use std::path::PathBuf;

#[test]
fn test_cli_init_command() {
    let cli = Cli::try_parse_from(&["snapgate", "init"]).unwrap();
    match cli.command {
        Commands::Init { force } => {
            assert!(!force);
        }
        _ => panic!("Expected Init command"),
    }
}

#[test]
fn test_cli_init_command_with_force() {
    let cli = Cli::try_parse_from(&["snapgate", "init", "--force"]).unwrap();
    match cli.command {
        Commands::Init { force } => {
            assert!(force);
        }
        _ => panic!("Expected Init command"),
    }
}

#[test]
fn test_cli_run_from_directory() {
    let cli = Cli::try_parse_from(&["snapgate", "run", "--from", "downloads"]).unwrap();
    match cli.command {
        Commands::Run {
            from,
            command,
            source_version,
            no_prune,
            json,
        } => {
            assert_eq!(from, Some(PathBuf::from("downloads")));
            assert!(command.is_empty());
            assert!(source_version.is_none());
            assert!(!no_prune);
            assert!(!json);
        }
        _ => panic!("Expected Run command"),
    }
}

#[test]
fn test_cli_run_with_command() {
    let cli = Cli::try_parse_from(&[
        "snapgate", "run", "--no-prune", "--command", "kaggle-fetch", "--unzip",
    ])
    .unwrap();
    match cli.command {
        Commands::Run {
            from,
            command,
            no_prune,
            ..
        } => {
            assert!(from.is_none());
            assert_eq!(command, vec!["kaggle-fetch", "--unzip"]);
            assert!(no_prune);
        }
        _ => panic!("Expected Run command"),
    }
}

#[test]
fn test_cli_run_requires_exactly_one_source() {
    assert!(Cli::try_parse_from(&["snapgate", "run"]).is_err());
    assert!(Cli::try_parse_from(&["snapgate", "run", "--from", "a", "--command", "b"]).is_err());
}

#[test]
fn test_cli_check_command() {
    let cli = Cli::try_parse_from(&["snapgate", "check", "v3_nbadataset_temp_data", "--json"]).unwrap();
    match cli.command {
        Commands::Check { version, json } => {
            assert_eq!(version, "v3_nbadataset_temp_data");
            assert!(json);
        }
        _ => panic!("Expected Check command"),
    }

    // Version is required
    assert!(Cli::try_parse_from(&["snapgate", "check"]).is_err());
}

#[test]
fn test_cli_list_and_baseline_formats() {
    let cli = Cli::try_parse_from(&["snapgate", "list"]).unwrap();
    match cli.command {
        Commands::List { format } => assert_eq!(format, "pretty"),
        _ => panic!("Expected List command"),
    }

    let cli = Cli::try_parse_from(&["snapgate", "baseline", "--format", "json"]).unwrap();
    match cli.command {
        Commands::Baseline { format } => assert_eq!(format, "json"),
        _ => panic!("Expected Baseline command"),
    }
}

#[test]
fn test_cli_cleanup_modes() {
    let cli = Cli::try_parse_from(&["snapgate", "cleanup", "--retain", "3"]).unwrap();
    match cli.command {
        Commands::Cleanup { stale, retain, .. } => {
            assert!(!stale);
            assert_eq!(retain, Some(3));
        }
        _ => panic!("Expected Cleanup command"),
    }

    assert!(Cli::try_parse_from(&["snapgate", "cleanup"]).is_err());
    assert!(Cli::try_parse_from(&["snapgate", "cleanup", "--stale", "--retain", "2"]).is_err());
    assert!(Cli::try_parse_from(&["snapgate", "cleanup", "--retain", "0"]).is_err());
}

#[test]
fn test_cli_global_flags() {
    let cli = Cli::try_parse_from(&["snapgate", "list", "--root", "/data/project", "-v"]).unwrap();
    assert_eq!(cli.root, Some(PathBuf::from("/data/project")));
    assert!(cli.verbose);
}

#[test]
fn test_output_format_parse() {
    assert!(matches!(OutputFormat::parse("pretty"), Ok(OutputFormat::Pretty)));
    assert!(matches!(OutputFormat::parse("json"), Ok(OutputFormat::Json)));
    assert!(OutputFormat::parse("csv").is_err());
}

#[test]
fn test_cli_invalid_command() {
    assert!(Cli::try_parse_from(&["snapgate", "snapshot"]).is_err());
}
