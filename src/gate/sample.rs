//! Per-forward-pass gate output.

use ndarray::Array1;

/// One open-coefficient per unit, plus `∂z/∂log_alpha` for the backward pass.
///
/// Never stored across steps; every forward pass draws a fresh one.
#[derive(Debug, Clone, PartialEq)]
pub struct GateSample {
    values: Array1<f32>,
    log_alpha_grad: Array1<f32>,
    stochastic: bool,
}

impl GateSample {
    pub(crate) fn new(values: Array1<f32>, log_alpha_grad: Array1<f32>, stochastic: bool) -> Self {
        debug_assert_eq!(values.len(), log_alpha_grad.len());
        Self { values, log_alpha_grad, stochastic }
    }

    /// Open-coefficients in `[0, 1]`.
    pub fn values(&self) -> &Array1<f32> {
        &self.values
    }

    /// Per-unit derivative of the coefficient with respect to `log_alpha`.
    /// Zero wherever the clamp is active.
    pub fn log_alpha_grad(&self) -> &Array1<f32> {
        &self.log_alpha_grad
    }

    /// Whether this sample was drawn with noise (training mode).
    pub fn is_stochastic(&self) -> bool {
        self.stochastic
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the gate has no units.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Count units whose coefficient exceeds `threshold`.
    pub fn open_count(&self, threshold: f32) -> usize {
        self.values.iter().filter(|&&z| z > threshold).count()
    }

    /// Chain rule: gradient with respect to the coefficients to gradient with
    /// respect to `log_alpha`.
    pub fn backward(&self, grad_values: &Array1<f32>) -> Array1<f32> {
        grad_values * &self.log_alpha_grad
    }

    /// Consume the sample and keep only the coefficients.
    pub fn into_values(self) -> Array1<f32> {
        self.values
    }
}
