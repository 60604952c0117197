//! Learning rate schedulers
//!
//! - `LinearWarmupLR` - Linear warmup from 0 to target, then constant. Drives
//!   both the model learning rate and the multiplier ascent rates.

mod linear_warmup;


pub use linear_warmup::LinearWarmupLR;

/// Learning rate scheduler trait
pub trait LRScheduler {
    /// Get the current learning rate
    fn get_lr(&self) -> f32;

    /// Step the scheduler (typically called after each batch)
    fn step(&mut self);
}
