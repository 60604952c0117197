//! Inspect command implementation

use crate::checkpoint::{Checkpoint, TensorKind};
use crate::cli::{log, InspectArgs, LogLevel};

pub fn run_inspect(args: InspectArgs, level: LogLevel) -> Result<(), String> {
    let checkpoint =
        Checkpoint::load(&args.checkpoint).map_err(|e| format!("Failed to load checkpoint: {e}"))?;

    let weights: usize = checkpoint
        .tensors()
        .filter(|(_, t)| t.kind == TensorKind::Weight)
        .map(|(_, t)| t.value.len())
        .sum();
    let gates: Vec<_> = checkpoint.gate_parameters().collect();
    let gate_units: usize = gates.iter().map(|(_, t)| t.value.len()).sum();
    let multipliers = checkpoint.multipliers();

    log(level, LogLevel::Normal, "Checkpoint Information:");
    log(level, LogLevel::Normal, &format!("  Global step: {}", checkpoint.global_step()));
    log(
        level,
        LogLevel::Normal,
        &format!("  Multipliers: lambda {}, alpha {}", multipliers.lambda, multipliers.alpha),
    );
    log(level, LogLevel::Normal, &format!("  Weight parameters: {weights}"));
    log(
        level,
        LogLevel::Normal,
        &format!("  Gates: {} tensors, {gate_units} units", gates.len()),
    );

    for (name, tensor) in checkpoint.tensors() {
        log(
            level,
            LogLevel::Verbose,
            &format!("    {name:<48} {:<10} {:?}", tensor.kind.as_str(), tensor.value.shape()),
        );
    }
    Ok(())
}
