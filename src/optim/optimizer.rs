//! Optimizer trait

use ndarray::{ArrayViewD, ArrayViewMutD};

/// One parameter tensor paired with its gradient for a single update.
#[derive(Debug)]
pub struct ParamUpdate<'a> {
    /// Parameter values, updated in place.
    pub data: ArrayViewMutD<'a, f32>,
    /// Gradient, same shape as `data`.
    pub grad: ArrayViewD<'a, f32>,
    /// Whether decoupled weight decay applies (off for biases and gates).
    pub decay: bool,
}

impl<'a> ParamUpdate<'a> {
    /// Pair a parameter with its gradient.
    pub fn new(data: ArrayViewMutD<'a, f32>, grad: ArrayViewD<'a, f32>, decay: bool) -> Self {
        debug_assert_eq!(data.shape(), grad.shape());
        Self { data, grad, decay }
    }
}

/// Trait for optimization algorithms
///
/// Parameters must be passed in the same order on every call; stateful
/// optimizers key their buffers by position.
pub trait Optimizer {
    /// Perform a single optimization step
    fn step(&mut self, params: &mut [ParamUpdate<'_>]);

    /// Get learning rate
    fn lr(&self) -> f32;

    /// Set learning rate
    fn set_lr(&mut self, lr: f32);
}
