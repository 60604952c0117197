//! Target sparsity as a function of the global step.

use crate::error::{FlopError, Result};
use serde::{Deserialize, Serialize};

/// Controller phase, derived from the step alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerPhase {
    /// Target still ramping up.
    Warmup,
    /// Target at its final value.
    Steady,
}

/// Linear ramp from 0 to `target_sparsity` over `warmup_steps`.
///
/// Formula: target_t = target * min(1, t / warmup_steps)
///
/// # Example
///
/// ```
/// use flop::sparsity::SparsityTargetSchedule;
///
/// let schedule = SparsityTargetSchedule::new(0.5, 100).unwrap();
/// assert_eq!(schedule.target_at(50), 0.25);
/// assert_eq!(schedule.target_at(200), 0.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SparsityTargetSchedule {
    target_sparsity: f32,
    warmup_steps: usize,
}

impl SparsityTargetSchedule {
    /// Create a schedule; the final target must be in `[0, 1]`.
    pub fn new(target_sparsity: f32, warmup_steps: usize) -> Result<Self> {
        if !(0.0..=1.0).contains(&target_sparsity) {
            return Err(FlopError::InvalidTargetSparsity(target_sparsity));
        }
        Ok(Self { target_sparsity, warmup_steps })
    }

    /// Final target.
    pub fn target_sparsity(&self) -> f32 {
        self.target_sparsity
    }

    /// Warmup length in steps.
    pub fn warmup_steps(&self) -> usize {
        self.warmup_steps
    }

    /// Target at `step`. A zero warmup yields the final target at every step.
    pub fn target_at(&self, step: usize) -> f32 {
        if self.warmup_steps == 0 {
            return self.target_sparsity;
        }
        let progress = (step as f32 / self.warmup_steps as f32).min(1.0);
        self.target_sparsity * progress
    }

    /// Phase at `step`.
    pub fn phase_at(&self, step: usize) -> ControllerPhase {
        if step < self.warmup_steps {
            ControllerPhase::Warmup
        } else {
            ControllerPhase::Steady
        }
    }
}
