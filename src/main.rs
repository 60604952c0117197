//! flop CLI
//!
//! # Usage
//!
//! ```bash
//! # Validate a config
//! flop validate flop.yaml --detailed
//!
//! # Print the sparsity and learning-rate ramps
//! flop schedule flop.yaml --steps 40000 --every 5000
//!
//! # Derive pruned widths and a gate-free checkpoint
//! flop factorize flop.yaml model.safetensors -o widths.json --compressed pruned.safetensors
//!
//! # Show what a checkpoint holds
//! flop inspect model.safetensors -v
//! ```

use clap::Parser;
use flop::cli::{init_tracing, run_command, Cli, LogLevel};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(LogLevel::from_flags(cli.quiet, cli.verbose));

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
