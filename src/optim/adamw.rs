//! AdamW optimizer (Adam with decoupled Weight decay)

use super::{Optimizer, ParamUpdate};
use ndarray::ArrayD;

/// AdamW optimizer
///
/// AdamW decouples weight decay from the gradient-based update. Decay is only
/// applied to parameters flagged with [`ParamUpdate::decay`], so gate
/// parameters and biases are never shrunk toward zero.
///
/// AdamW: θ_t = (1 - lr * λ) * θ_{t-1} - lr_t * m_t / (√v_t + ε)
pub struct AdamW {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    weight_decay: f32,
    t: u64,
    m: Vec<Option<ArrayD<f32>>>, // First moment
    v: Vec<Option<ArrayD<f32>>>, // Second moment
}

impl AdamW {
    /// Create a new AdamW optimizer
    pub fn new(lr: f32, beta1: f32, beta2: f32, epsilon: f32, weight_decay: f32) -> Self {
        Self { lr, beta1, beta2, epsilon, weight_decay, t: 0, m: Vec::new(), v: Vec::new() }
    }

    /// Create AdamW with default parameters (weight_decay = 0.01)
    pub fn default_params(lr: f32) -> Self {
        Self::new(lr, 0.9, 0.999, 1e-8, 0.01)
    }

    /// Get optimizer step counter.
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.t
    }

    /// Get weight decay hyperparameter.
    #[must_use]
    pub fn weight_decay(&self) -> f32 {
        self.weight_decay
    }
}

impl Optimizer for AdamW {
    fn step(&mut self, params: &mut [ParamUpdate<'_>]) {
        if self.m.len() < params.len() {
            self.m.resize(params.len(), None);
            self.v.resize(params.len(), None);
        }
        self.t += 1;

        // Bias correction factors
        let lr_t = self.lr
            * ((1.0 - self.beta2.powi(self.t as i32)).sqrt()
                / (1.0 - self.beta1.powi(self.t as i32)));

        for (i, param) in params.iter_mut().enumerate() {
            let grad = &param.grad;

            // m_t = β1 * m_{t-1} + (1 - β1) * g
            let m_t = match &self.m[i] {
                Some(m) if m.shape() == grad.shape() => m * self.beta1 + grad * (1.0 - self.beta1),
                _ => grad * (1.0 - self.beta1),
            };

            // v_t = β2 * v_{t-1} + (1 - β2) * g²
            let grad_sq = grad.mapv(|g| g * g);
            let v_t = match &self.v[i] {
                Some(v) if v.shape() == grad.shape() => v * self.beta2 + &grad_sq * (1.0 - self.beta2),
                _ => &grad_sq * (1.0 - self.beta2),
            };

            let adaptive_update = &m_t / &(v_t.mapv(f32::sqrt) + self.epsilon) * lr_t;

            if param.decay {
                let weight_decay_factor = 1.0 - self.lr * self.weight_decay;
                param.data.mapv_inplace(|d| d * weight_decay_factor);
            }
            param.data -= &adaptive_update;

            self.m[i] = Some(m_t);
            self.v[i] = Some(v_t);
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, Array1};

    fn update<'a>(data: &'a mut Array1<f32>, grad: &'a Array1<f32>, decay: bool) -> ParamUpdate<'a> {
        ParamUpdate::new(data.view_mut().into_dyn(), grad.view().into_dyn(), decay)
    }

    #[test]
    fn test_adamw_quadratic_convergence() {
        // Test convergence on f(x) = x²
        let mut x = arr1(&[5.0, -3.0, 2.0]);
        let mut optimizer = AdamW::default_params(0.1);

        for _ in 0..100 {
            let grad = x.mapv(|v| 2.0 * v);
            optimizer.step(&mut [update(&mut x, &grad, true)]);
        }

        for &val in &x {
            assert!(val.abs() < 0.5, "Value {val} did not converge");
        }
    }

    #[test]
    fn test_adamw_weight_decay() {
        let mut x = arr1(&[1.0]);
        let grad = arr1(&[0.0]);
        let mut optimizer = AdamW::new(0.1, 0.9, 0.999, 1e-8, 0.1);

        optimizer.step(&mut [update(&mut x, &grad, true)]);

        // θ_t = (1 - lr * λ) * θ_{t-1} = (1 - 0.1 * 0.1) * 1.0 = 0.99
        assert_abs_diff_eq!(x[0], 0.99, epsilon = 1e-6);
    }

    #[test]
    fn test_adamw_skips_decay_when_flag_off() {
        let mut x = arr1(&[1.0]);
        let grad = arr1(&[0.0]);
        let mut optimizer = AdamW::new(0.1, 0.9, 0.999, 1e-8, 0.1);

        optimizer.step(&mut [update(&mut x, &grad, false)]);

        assert_abs_diff_eq!(x[0], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_adamw_first_step_magnitude_is_lr() {
        // With bias correction the first step moves each coordinate by ~lr.
        let mut x = arr1(&[0.0, 0.0]);
        let grad = arr1(&[3.0, -0.001]);
        let mut optimizer = AdamW::new(0.05, 0.9, 0.999, 1e-8, 0.0);

        optimizer.step(&mut [update(&mut x, &grad, false)]);

        assert_abs_diff_eq!(x[0], -0.05, epsilon = 1e-4);
        assert_abs_diff_eq!(x[1], 0.05, epsilon = 1e-3);
        assert_eq!(optimizer.step_count(), 1);
    }

    #[test]
    fn test_adamw_resets_moments_when_slot_shape_changes() {
        let mut a = arr1(&[1.0, 2.0]);
        let ga = arr1(&[0.5, 0.5]);
        let mut optimizer = AdamW::new(0.1, 0.9, 0.999, 1e-8, 0.0);
        optimizer.step(&mut [update(&mut a, &ga, false)]);

        // a narrower tensor in the same slot starts from fresh moments
        let mut b = arr1(&[0.0]);
        let gb = arr1(&[-1.0]);
        optimizer.step(&mut [update(&mut b, &gb, false)]);
        assert!(b[0] > 0.0);
        assert!(b.iter().all(|v| v.is_finite()));
        assert_eq!(optimizer.step_count(), 2);
    }
}
