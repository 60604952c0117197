//! Stretch limits, temperature, and numerical floor of the hard-concrete
//! distribution.

use crate::error::{FlopError, Result};
use serde::{Deserialize, Serialize};

/// Fixed, non-trained constants shared by every gate of a model.
///
/// `limit_l < 0 < 1 < limit_r` stretches the concrete distribution past the
/// unit interval so that the clamp puts real probability mass on exactly 0
/// and exactly 1.
///
/// # Example
///
/// ```
/// use flop::gate::HardConcreteSupport;
///
/// let support = HardConcreteSupport::new(-0.1, 1.1, 0.5).unwrap();
/// assert!((support.stretch(0.5) - 0.5).abs() < 1e-6);
/// assert!(HardConcreteSupport::new(0.1, 1.1, 0.5).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardConcreteSupport {
    /// Left stretch limit (< 0).
    limit_l: f32,
    /// Right stretch limit (> 1).
    limit_r: f32,
    /// Temperature (> 0).
    beta: f32,
    /// Floor keeping uniform draws away from 0 and 1.
    eps: f32,
}

impl Default for HardConcreteSupport {
    fn default() -> Self {
        Self { limit_l: -0.1, limit_r: 1.1, beta: 2.0 / 3.0, eps: 1e-6 }
    }
}

impl HardConcreteSupport {
    /// Create a validated support with the default `eps`.
    pub fn new(limit_l: f32, limit_r: f32, beta: f32) -> Result<Self> {
        let support = Self { limit_l, limit_r, beta, ..Self::default() };
        support.validate()?;
        Ok(support)
    }

    /// Replace the numerical floor.
    pub fn with_eps(mut self, eps: f32) -> Result<Self> {
        self.eps = eps;
        self.validate()?;
        Ok(self)
    }

    /// Reject supports that degenerate the relaxation.
    pub fn validate(&self) -> Result<()> {
        if !self.limit_l.is_finite() || self.limit_l >= 0.0 {
            return Err(FlopError::InvalidLimitL(self.limit_l));
        }
        if !self.limit_r.is_finite() || self.limit_r <= 1.0 {
            return Err(FlopError::InvalidLimitR(self.limit_r));
        }
        if !self.beta.is_finite() || self.beta <= 0.0 {
            return Err(FlopError::InvalidTemperature(self.beta));
        }
        if !(self.eps > 0.0 && self.eps < 0.5) {
            return Err(FlopError::InvalidEps(self.eps));
        }
        Ok(())
    }

    /// Left stretch limit.
    pub fn limit_l(&self) -> f32 {
        self.limit_l
    }

    /// Right stretch limit.
    pub fn limit_r(&self) -> f32 {
        self.limit_r
    }

    /// Temperature.
    pub fn beta(&self) -> f32 {
        self.beta
    }

    /// Numerical floor for uniform draws.
    pub fn eps(&self) -> f32 {
        self.eps
    }

    /// Width of the stretched interval, `limit_r - limit_l`.
    pub fn span(&self) -> f32 {
        self.limit_r - self.limit_l
    }

    /// Map `s ∈ (0, 1)` onto `(limit_l, limit_r)`.
    #[inline]
    pub fn stretch(&self, s: f32) -> f32 {
        s * self.span() + self.limit_l
    }

    /// `beta * ln(-limit_l / limit_r)`, the shift between `log_alpha` and the
    /// logit of the open probability.
    pub fn open_logit_shift(&self) -> f32 {
        self.beta * (-self.limit_l / self.limit_r).ln()
    }
}
