//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::{CliConfig, ColorChoice, Verbosity};

/// transcheck: settle-aware E2E checks for the Singlish → Sinhala translator
#[derive(Parser, Debug)]
#[command(name = "transcheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (failures and summary only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Harness configuration file (YAML)
    #[arg(short, long, global = true, env = "TRANSCHECK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Presentation settings from the global flags
    #[must_use]
    pub const fn cli_config(&self) -> CliConfig {
        CliConfig {
            verbosity: Verbosity::from_flags(self.quiet, self.verbose),
            color: self.color.into_choice(),
        }
    }
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run scenario suites against the translator
    Run(RunArgs),

    /// List suites and their cases
    List(ListArgs),

    /// Discover input and output selectors on the live page
    Inspect(InspectArgs),

    /// Print the effective harness configuration
    Config(ConfigArgs),
}

/// Which suites to load
#[derive(Parser, Debug, Default)]
pub struct SuiteArgs {
    /// Built-in suite to include (repeatable; default: all built-in suites)
    #[arg(short, long = "suite")]
    pub suites: Vec<String>,

    /// Suite YAML file to include (repeatable)
    #[arg(long = "suite-file")]
    pub suite_files: Vec<PathBuf>,

    /// Only cases whose id contains this text
    #[arg(short, long)]
    pub filter: Option<String>,
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Suite selection
    #[command(flatten)]
    pub selection: SuiteArgs,

    /// Page under test
    #[arg(long)]
    pub base_url: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Retries per failing scenario (default: 2 under CI, else 0)
    #[arg(long)]
    pub retries: Option<u32>,

    /// Settle budget in milliseconds
    #[arg(long)]
    pub settle_budget: Option<u64>,

    /// Output directory for the report and screenshots
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Skip failure screenshots
    #[arg(long)]
    pub no_screenshots: bool,

    /// Print the JSON report to stdout
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Suite selection
    #[command(flatten)]
    pub selection: SuiteArgs,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: ListFormat,
}

/// Arguments for the inspect command
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Page to inspect
    #[arg(long)]
    pub base_url: Option<String>,

    /// Singlish sentence to type
    #[arg(long, default_value = transcheck::DEFAULT_PROBE_TEXT)]
    pub probe_text: String,

    /// Wait after typing, in milliseconds
    #[arg(long, default_value_t = transcheck::DEFAULT_INSPECT_WAIT_MS)]
    pub wait_ms: u64,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Print the findings as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Output format
    #[arg(long, default_value = "yaml")]
    pub format: ConfigFormat,
}

/// List output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ListFormat {
    /// One line per case
    #[default]
    Text,
    /// JSON array of suites
    Json,
}

/// Config output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML, loadable with --config
    #[default]
    Yaml,
    /// JSON
    Json,
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorArg {
    /// Use colors when stderr is a terminal
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl ColorArg {
    const fn into_choice(self) -> ColorChoice {
        match self {
            Self::Auto => ColorChoice::Auto,
            Self::Always => ColorChoice::Always,
            Self::Never => ColorChoice::Never,
        }
    }
}

impl From<ColorArg> for ColorChoice {
    fn from(arg: ColorArg) -> Self {
        arg.into_choice()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_parse() {
        let cli = Cli::try_parse_from([
            "transcheck",
            "-v",
            "run",
            "--suite",
            "ui",
            "--suite",
            "negative-functional",
            "--filter",
            "Neg_Fun_001",
            "--retries",
            "1",
            "--headed",
        ])
        .unwrap();
        assert_eq!(cli.cli_config().verbosity, Verbosity::Verbose);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.selection.suites, vec!["ui", "negative-functional"]);
        assert_eq!(args.selection.filter.as_deref(), Some("Neg_Fun_001"));
        assert_eq!(args.retries, Some(1));
        assert!(args.headed);
    }

    #[test]
    fn test_inspect_defaults() {
        let cli = Cli::try_parse_from(["transcheck", "inspect"]).unwrap();
        let Commands::Inspect(args) = cli.command else {
            panic!("expected inspect");
        };
        assert_eq!(args.probe_text, transcheck::DEFAULT_PROBE_TEXT);
        assert_eq!(args.wait_ms, 3000);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["transcheck", "list", "-q", "--color", "never"]).unwrap();
        let config = cli.cli_config();
        assert!(config.verbosity.is_quiet());
        assert_eq!(config.color, ColorChoice::Never);
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["transcheck"]).is_err());
    }
}
