//! CLI module for flop
//!
//! Command handlers return `Result<(), String>`; the binary prints the error
//! and exits non-zero.

mod args;
mod commands;
mod logging;

pub use args::{
    parse_args, Cli, Command, FactorizeArgs, InspectArgs, ScheduleArgs, ValidateArgs,
};
pub use commands::{run_command, schedule_rows, ScheduleRow};
pub use logging::{init_tracing, log, LogLevel};
