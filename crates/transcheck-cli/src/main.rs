//! transcheck CLI: settle-aware E2E checks for a reactive translator
//!
//! ## Usage
//!
//! ```bash
//! transcheck run                          # Run every built-in suite
//! transcheck run --suite ui --headed      # One suite, visible browser
//! transcheck run --filter Neg_Fun_001     # Cases whose id matches
//! transcheck list --format json           # Show cases
//! transcheck inspect                      # Discover selectors
//! ```

use clap::Parser;
use std::process::ExitCode;
use transcheck_cli::{logging, runner, Cli, CliError, CliResult, Commands};

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(2)
        }
    }
}

fn run() -> CliResult<bool> {
    let cli = Cli::parse();
    let config = cli.cli_config();
    logging::init(config.verbosity, config.color.should_color());
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Run(ref args) => block_on(runner::run_suites(&config, config_path, args)),
        Commands::List(ref args) => runner::run_list(args).map(|()| true),
        Commands::Inspect(ref args) => {
            block_on(runner::run_inspect(&config, config_path, args)).map(|()| true)
        }
        Commands::Config(ref args) => runner::run_config(config_path, args).map(|()| true),
    }
}

fn block_on<T>(future: impl std::future::Future<Output = CliResult<T>>) -> CliResult<T> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::from)?
        .block_on(future)
}
