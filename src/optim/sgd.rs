//! Stochastic Gradient Descent optimizer

use super::{Optimizer, ParamUpdate};
use ndarray::ArrayD;

/// SGD optimizer with optional momentum
pub struct SGD {
    lr: f32,
    momentum: f32,
    velocities: Vec<Option<ArrayD<f32>>>,
}

impl SGD {
    /// Create a new SGD optimizer
    pub fn new(lr: f32, momentum: f32) -> Self {
        Self { lr, momentum, velocities: Vec::new() }
    }
}

impl Optimizer for SGD {
    fn step(&mut self, params: &mut [ParamUpdate<'_>]) {
        if self.velocities.len() < params.len() {
            self.velocities.resize(params.len(), None);
        }

        for (i, param) in params.iter_mut().enumerate() {
            if self.momentum > 0.0 {
                // v = momentum * v - lr * grad
                let velocity = match &self.velocities[i] {
                    Some(v) if v.shape() == param.grad.shape() => {
                        v * self.momentum - &param.grad * self.lr
                    }
                    _ => &param.grad * (-self.lr),
                };
                param.data += &velocity;
                self.velocities[i] = Some(velocity);
            } else {
                // param -= lr * grad
                let lr = self.lr;
                param.data.zip_mut_with(&param.grad, |d, &g| *d -= lr * g);
            }
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}
