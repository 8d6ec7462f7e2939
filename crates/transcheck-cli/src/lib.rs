//! transcheck CLI library
//!
//! Command-line front end for the transcheck harness: run suites, list
//! cases, inspect the live page, print the effective configuration.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::format_push_string)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
pub mod logging;
mod output;
pub mod runner;

pub use commands::{
    Cli, ColorArg, Commands, ConfigArgs, ConfigFormat, InspectArgs, ListArgs, ListFormat,
    RunArgs, SuiteArgs,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{describe_failure, describe_outcome, ProgressReporter};
