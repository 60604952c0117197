//! Linear warmup learning rate scheduler

use super::LRScheduler;
use crate::optim::Optimizer;
use serde::{Deserialize, Serialize};

/// Linear Warmup Learning Rate Scheduler
///
/// Linearly increases learning rate from 0 to target over warmup_steps.
/// After warmup, maintains target learning rate.
///
/// Formula: lr_t = lr_target * min(1, t / warmup_steps)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearWarmupLR {
    lr_target: f32,
    warmup_steps: usize,
    current_step: usize,
}

impl LinearWarmupLR {
    /// Create a new linear warmup scheduler
    ///
    /// # Arguments
    /// * `lr_target` - Target learning rate after warmup
    /// * `warmup_steps` - Number of steps for warmup; 0 means no warmup
    pub fn new(lr_target: f32, warmup_steps: usize) -> Self {
        Self { lr_target, warmup_steps, current_step: 0 }
    }

    /// Learning rate at an arbitrary step, independent of the internal counter
    pub fn lr_at(&self, step: usize) -> f32 {
        if self.warmup_steps == 0 {
            return self.lr_target;
        }

        let progress = (step as f32 / self.warmup_steps as f32).min(1.0);
        self.lr_target * progress
    }

    /// Target learning rate after warmup
    pub fn lr_target(&self) -> f32 {
        self.lr_target
    }

    /// Warmup length
    pub fn warmup_steps(&self) -> usize {
        self.warmup_steps
    }

    /// Current step counter
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Move the counter to `step` (checkpoint resume)
    pub fn set_step(&mut self, step: usize) {
        self.current_step = step;
    }

    /// Apply the current learning rate to an optimizer
    pub fn apply<O: Optimizer + ?Sized>(&self, optimizer: &mut O) {
        optimizer.set_lr(self.get_lr());
    }
}

impl LRScheduler for LinearWarmupLR {
    fn get_lr(&self) -> f32 {
        self.lr_at(self.current_step)
    }

    fn step(&mut self) {
        self.current_step += 1;
    }
}
