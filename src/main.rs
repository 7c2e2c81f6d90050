//! snapgate command-line entry point

use clap::Parser;
use env_logger::Env;
use snapgate::cli::Cli;
use snapgate::commands::execute_command;

fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();

    if let Err(e) = execute_command(cli.command, cli.root.as_deref()) {
        log::debug!("Command failed: {:?}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
