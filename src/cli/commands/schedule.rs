//! Schedule command implementation

use crate::cli::{log, LogLevel, ScheduleArgs};
use crate::config::FlopConfig;
use crate::optim::LinearWarmupLR;
use crate::sparsity::ControllerPhase;
use serde::Serialize;

/// One printed row of the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScheduleRow {
    pub step: usize,
    pub phase: ControllerPhase,
    pub target: f32,
    pub lambda_lr: f32,
    pub alpha_lr: f32,
    pub learning_rate: f32,
}

/// Schedule values every `every` steps from 0 through `steps`.
pub fn schedule_rows(
    config: &FlopConfig,
    steps: usize,
    every: usize,
) -> Result<Vec<ScheduleRow>, String> {
    if every == 0 {
        return Err("--every must be > 0".into());
    }
    let schedule = config.schedule().map_err(|e| e.to_string())?;
    let warmup = config.learning_rate_warmup();
    let lambda_lr = LinearWarmupLR::new(config.lambda_learning_rate(), warmup);
    let alpha_lr = LinearWarmupLR::new(config.alpha_learning_rate(), warmup);
    let model_lr = LinearWarmupLR::new(config.learning_rate(), warmup);

    Ok((0..=steps)
        .step_by(every)
        .map(|step| ScheduleRow {
            step,
            phase: schedule.phase_at(step),
            target: schedule.target_at(step),
            lambda_lr: lambda_lr.lr_at(step),
            alpha_lr: alpha_lr.lr_at(step),
            learning_rate: model_lr.lr_at(step),
        })
        .collect())
}

fn phase_name(phase: ControllerPhase) -> &'static str {
    match phase {
        ControllerPhase::Warmup => "warmup",
        ControllerPhase::Steady => "steady",
    }
}

pub fn run_schedule(args: ScheduleArgs, level: LogLevel) -> Result<(), String> {
    let config = FlopConfig::from_file(&args.config).map_err(|e| format!("Config error: {e}"))?;
    let steps = args
        .steps
        .unwrap_or_else(|| config.target_sparsity_warmup().max(config.learning_rate_warmup()));

    let rows = schedule_rows(&config, steps, args.every)?;
    log(
        level,
        LogLevel::Normal,
        &format!(
            "{:>10}  {:<7}  {:>8}  {:>10}  {:>10}  {:>10}",
            "step", "phase", "target", "lambda_lr", "alpha_lr", "lr"
        ),
    );
    for row in rows {
        log(
            level,
            LogLevel::Normal,
            &format!(
                "{:>10}  {:<7}  {:>8.4}  {:>10.3e}  {:>10.3e}  {:>10.3e}",
                row.step,
                phase_name(row.phase),
                row.target,
                row.lambda_lr,
                row.alpha_lr,
                row.learning_rate
            ),
        );
    }
    Ok(())
}
