//! CLI subcommand definitions.

pub mod benchmark;
pub mod config;
pub mod validate;

use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print version information
    Version,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Measure parse and filter throughput over a log file
    Benchmark(BenchmarkArgs),

    /// Validate the configuration and optional log files
    Validate(ValidateArgs),
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Open the configuration file in $EDITOR
    Edit,
}

#[derive(Args, Debug)]
pub struct BenchmarkArgs {
    /// Log file to benchmark against
    pub file: PathBuf,

    /// Filter query to apply during the run
    #[arg(long, default_value = "level:ERROR")]
    pub query: String,

    /// Number of trials (first one is warmup)
    #[arg(long, default_value_t = 3)]
    pub trials: usize,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Log files to check for accessibility
    pub files: Vec<PathBuf>,
}
