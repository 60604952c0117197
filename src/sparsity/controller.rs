//! Dual-ascent control of the sparsity constraint.

use super::{ControllerPhase, SparsityTargetSchedule};
use crate::error::{FlopError, Result};
use crate::optim::LinearWarmupLR;
use serde::{Deserialize, Serialize};

/// Lagrange multipliers of the sparsity constraint. Both start at 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LagrangeMultipliers {
    /// Linear multiplier.
    pub lambda: f32,
    /// Quadratic multiplier.
    pub alpha: f32,
}

/// Penalty evaluated at one step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LagrangianTerm {
    /// Expected sparsity the term was computed from.
    pub sparsity: f32,
    /// Target at this step.
    pub target: f32,
    /// `sparsity - target`.
    pub error: f32,
    /// `lambda * error + alpha * error²`.
    pub penalty: f32,
    /// `∂penalty/∂sparsity = lambda + 2 alpha error`.
    pub sparsity_grad: f32,
}

/// Result of [`DualAscentController::step`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControllerStep {
    /// Step the term was computed at.
    pub step: usize,
    /// Phase at that step.
    pub phase: ControllerPhase,
    /// Penalty under the multipliers in effect before the update.
    pub term: LagrangianTerm,
    /// Multipliers after the ascent.
    pub multipliers: LagrangeMultipliers,
    /// Effective `lambda` ascent rate used.
    pub lambda_lr: f32,
    /// Effective `alpha` ascent rate used.
    pub alpha_lr: f32,
}

/// Augmented-Lagrangian controller driving expected sparsity to the target.
///
/// Owns the global step: it starts at 0, advances by exactly one per
/// [`step`](Self::step) and never moves backward except through
/// [`restore`](Self::restore).
///
/// When every gate is saturated the error stops responding to `log_alpha`
/// while the multipliers keep growing; this is a known limitation of the
/// formulation and is left alone.
///
/// # Example
///
/// ```
/// use flop::sparsity::{DualAscentController, SparsityTargetSchedule};
///
/// let schedule = SparsityTargetSchedule::new(0.5, 0).unwrap();
/// let mut controller = DualAscentController::new(schedule, 1.0, 0.0, 0).unwrap();
/// let out = controller.step(0.3);
/// assert!((out.multipliers.lambda + 0.2).abs() < 1e-6);
/// assert_eq!(controller.global_step(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DualAscentController {
    schedule: SparsityTargetSchedule,
    lambda_lr: LinearWarmupLR,
    alpha_lr: LinearWarmupLR,
    multipliers: LagrangeMultipliers,
    global_step: usize,
}

fn check_rate(name: &'static str, value: f32) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(FlopError::InvalidRate { name, value });
    }
    Ok(())
}

impl DualAscentController {
    /// Create a controller at step 0 with zero multipliers.
    ///
    /// Both ascent rates warm up linearly over `learning_rate_warmup` steps.
    pub fn new(
        schedule: SparsityTargetSchedule,
        lambda_learning_rate: f32,
        alpha_learning_rate: f32,
        learning_rate_warmup: usize,
    ) -> Result<Self> {
        check_rate("lambda_learning_rate", lambda_learning_rate)?;
        check_rate("alpha_learning_rate", alpha_learning_rate)?;
        Ok(Self {
            schedule,
            lambda_lr: LinearWarmupLR::new(lambda_learning_rate, learning_rate_warmup),
            alpha_lr: LinearWarmupLR::new(alpha_learning_rate, learning_rate_warmup),
            multipliers: LagrangeMultipliers::default(),
            global_step: 0,
        })
    }

    /// Target schedule.
    pub fn schedule(&self) -> &SparsityTargetSchedule {
        &self.schedule
    }

    /// Current multipliers.
    pub fn multipliers(&self) -> LagrangeMultipliers {
        self.multipliers
    }

    /// Current global step.
    pub fn global_step(&self) -> usize {
        self.global_step
    }

    /// Target at the current step.
    pub fn target(&self) -> f32 {
        self.schedule.target_at(self.global_step)
    }

    /// Phase at the current step.
    pub fn phase(&self) -> ControllerPhase {
        self.schedule.phase_at(self.global_step)
    }

    /// Effective `(lambda, alpha)` ascent rates at the current step.
    pub fn ascent_rates(&self) -> (f32, f32) {
        (self.lambda_lr.lr_at(self.global_step), self.alpha_lr.lr_at(self.global_step))
    }

    /// Evaluate the penalty at the current step without updating anything.
    pub fn lagrangian(&self, sparsity: f32) -> LagrangianTerm {
        let target = self.target();
        let error = sparsity - target;
        let LagrangeMultipliers { lambda, alpha } = self.multipliers;
        LagrangianTerm {
            sparsity,
            target,
            error,
            penalty: lambda * error + alpha * error * error,
            sparsity_grad: lambda + 2.0 * alpha * error,
        }
    }

    /// Compute the term, ascend the multipliers once, and advance the step.
    pub fn step(&mut self, sparsity: f32) -> ControllerStep {
        let step = self.global_step;
        let phase = self.phase();
        let term = self.lagrangian(sparsity);
        let (lambda_lr, alpha_lr) = self.ascent_rates();

        self.multipliers.lambda += lambda_lr * term.error;
        self.multipliers.alpha += alpha_lr * term.error * term.error;
        self.global_step += 1;
        self.lambda_lr.set_step(self.global_step);
        self.alpha_lr.set_step(self.global_step);

        ControllerStep { step, phase, term, multipliers: self.multipliers, lambda_lr, alpha_lr }
    }

    /// Advance the step without touching the multipliers, for runs in which
    /// no gate is left to constrain.
    pub fn advance(&mut self) -> usize {
        let step = self.global_step;
        self.global_step += 1;
        self.lambda_lr.set_step(self.global_step);
        self.alpha_lr.set_step(self.global_step);
        step
    }

    /// Resume from a checkpoint.
    pub fn restore(&mut self, global_step: usize, multipliers: LagrangeMultipliers) {
        self.global_step = global_step;
        self.multipliers = multipliers;
        self.lambda_lr.set_step(global_step);
        self.alpha_lr.set_step(global_step);
    }
}
