//! Per-step observations surfaced to external logging.

use crate::projection::ProjectionId;
use crate::sparsity::ControllerPhase;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything one [`FlopTrainer::apply_step`](super::FlopTrainer::apply_step)
/// observed, in a shape ready for JSON lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepMetrics {
    /// Step the update was computed at.
    pub step: usize,
    /// Controller phase at that step.
    pub phase: ControllerPhase,
    /// Loss reported by the caller.
    pub task_loss: f32,
    /// `regularization_scale * (1 - sparsity)`.
    pub l0_penalty: f32,
    /// `lambda * error + alpha * error²`.
    pub lagrangian_penalty: f32,
    /// Sum of the three losses above.
    pub total_loss: f32,
    /// Expected gate sparsity before the update. Fixed-width projections
    /// carry no gate and are not counted, so a factorized run reports 0.
    pub sparsity: f32,
    /// Target sparsity at this step.
    pub target: f32,
    /// Linear multiplier after the ascent.
    pub lambda: f32,
    /// Quadratic multiplier after the ascent.
    pub alpha: f32,
    /// Model learning rate used.
    pub learning_rate: f32,
    /// Expected open units per gated projection.
    pub expected_l0: BTreeMap<ProjectionId, f32>,
}

impl StepMetrics {
    /// Serialize as one compact JSON line.
    pub fn to_json_line(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
