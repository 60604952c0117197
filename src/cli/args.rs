//! Command-line arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// flop: structured L0 pruning with dual-ascent sparsity control
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "flop")]
#[command(version)]
#[command(about = "Hard-concrete structured pruning: config checks, schedules, factorization")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Validate a pruning configuration
    Validate(ValidateArgs),

    /// Print the target sparsity and learning-rate schedule
    Schedule(ScheduleArgs),

    /// Derive pruned widths from a checkpoint
    Factorize(FactorizeArgs),

    /// List the tensors and controller state of a checkpoint
    Inspect(InspectArgs),
}

/// Arguments for the validate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// Path to YAML or JSON configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Show the resolved configuration
    #[arg(short, long)]
    pub detailed: bool,
}

/// Arguments for the schedule command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ScheduleArgs {
    /// Path to YAML or JSON configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Last step to print (defaults to the end of the longest warmup)
    #[arg(long)]
    pub steps: Option<usize>,

    /// Print every N steps
    #[arg(long, default_value_t = 1000)]
    pub every: usize,
}

/// Arguments for the factorize command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct FactorizeArgs {
    /// Configuration the checkpoint was trained with
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Trained `.safetensors` checkpoint
    #[arg(value_name = "CHECKPOINT")]
    pub checkpoint: PathBuf,

    /// Units survive when their deterministic coefficient exceeds this
    #[arg(long, default_value_t = 0.0)]
    pub threshold: f32,

    /// Write the width map here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also write the compressed, gate-free checkpoint here
    #[arg(long)]
    pub compressed: Option<PathBuf>,
}

/// Arguments for the inspect command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct InspectArgs {
    /// `.safetensors` checkpoint
    #[arg(value_name = "CHECKPOINT")]
    pub checkpoint: PathBuf,
}

/// Parse arguments from an iterator, for tests and embedding.
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}
