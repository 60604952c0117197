//! The hard-concrete gate attached to one projection.

use super::{GateInit, GateSample, HardConcreteSupport};
use crate::error::{FlopError, Result};
use crate::math::{sigmoid, standard_normal};
use ndarray::{Array1, ArrayViewMut1};
use rand::Rng;

/// Per-unit stochastic gate parameterized by `log_alpha`.
///
/// The length of `log_alpha` is fixed at construction; structural width
/// changes only happen in a separately built, factorized model.
///
/// # Example
///
/// ```
/// use flop::gate::{HardConcreteGate, HardConcreteSupport};
/// use ndarray::arr1;
///
/// let support = HardConcreteSupport::new(-0.1, 1.1, 0.5).unwrap();
/// let gate = HardConcreteGate::new(arr1(&[-10.0, 10.0]), support).unwrap();
/// let mask = gate.deterministic();
/// assert_eq!(mask.values()[0], 0.0);
/// assert_eq!(mask.values()[1], 1.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct HardConcreteGate {
    log_alpha: Array1<f32>,
    support: HardConcreteSupport,
}

impl HardConcreteGate {
    /// Create a gate from explicit parameters.
    pub fn new(log_alpha: Array1<f32>, support: HardConcreteSupport) -> Result<Self> {
        support.validate()?;
        if log_alpha.iter().any(|v| !v.is_finite()) {
            return Err(FlopError::InvalidGateInit("log_alpha contains non-finite values".into()));
        }
        Ok(Self { log_alpha, support })
    }

    /// Create a gate with `units` parameters drawn from `init`.
    pub fn init<R: Rng + ?Sized>(
        units: usize,
        support: HardConcreteSupport,
        init: &GateInit,
        rng: &mut R,
    ) -> Result<Self> {
        init.validate()?;
        let mean = init.mean();
        let log_alpha = Array1::from_shape_fn(units, |_| mean + init.std * standard_normal(rng));
        Self::new(log_alpha, support)
    }

    /// Number of gated units.
    pub fn units(&self) -> usize {
        self.log_alpha.len()
    }

    /// Gate parameters.
    pub fn log_alpha(&self) -> &Array1<f32> {
        &self.log_alpha
    }

    /// Mutable view of the gate parameters; the length cannot change.
    pub fn log_alpha_mut(&mut self) -> ArrayViewMut1<'_, f32> {
        self.log_alpha.view_mut()
    }

    /// Overwrite the gate parameters (checkpoint restore).
    pub fn set_log_alpha(&mut self, values: &[f32]) -> Result<()> {
        if values.len() != self.units() {
            return Err(FlopError::ShapeMismatch {
                context: "log_alpha".into(),
                expected: vec![self.units()],
                actual: vec![values.len()],
            });
        }
        self.log_alpha.iter_mut().zip(values).for_each(|(dst, &src)| *dst = src);
        Ok(())
    }

    /// Shared support constants.
    pub fn support(&self) -> &HardConcreteSupport {
        &self.support
    }

    /// Draw the open-mask.
    ///
    /// With `training` the draw is stochastic and consumes one uniform value
    /// per unit from `rng`; otherwise it is [`Self::deterministic`] and `rng`
    /// is untouched.
    pub fn sample<R: Rng + ?Sized>(&self, training: bool, rng: &mut R) -> GateSample {
        if !training {
            return self.deterministic();
        }

        let eps = self.support.eps();
        let beta = self.support.beta();
        let n = self.units();
        let mut values = Array1::zeros(n);
        let mut grad = Array1::zeros(n);

        for (i, &la) in self.log_alpha.iter().enumerate() {
            let u: f32 = eps + (1.0 - 2.0 * eps) * rng.random::<f32>();
            let noise = u.ln() - (1.0 - u).ln();
            let s = sigmoid((noise + la) / beta);
            let (z, dz) = self.stretch_and_clamp(s);
            values[i] = z;
            grad[i] = dz;
        }

        GateSample::new(values, grad, true)
    }

    /// Inference-mode mask: a pure function of `log_alpha`.
    pub fn deterministic(&self) -> GateSample {
        let beta = self.support.beta();
        let n = self.units();
        let mut values = Array1::zeros(n);
        let mut grad = Array1::zeros(n);

        for (i, &la) in self.log_alpha.iter().enumerate() {
            let (z, dz) = self.stretch_and_clamp(sigmoid(la / beta));
            values[i] = z;
            grad[i] = dz;
        }

        GateSample::new(values, grad, false)
    }

    /// Stretch `s` to the support, clamp to `[0, 1]`, and return the
    /// coefficient with its derivative with respect to `log_alpha`.
    #[inline]
    fn stretch_and_clamp(&self, s: f32) -> (f32, f32) {
        let stretched = self.support.stretch(s);
        if stretched <= 0.0 {
            (0.0, 0.0)
        } else if stretched >= 1.0 {
            (1.0, 0.0)
        } else {
            (stretched, self.support.span() * s * (1.0 - s) / self.support.beta())
        }
    }

    /// Probability that each unit is open, `P(z > 0)`, in closed form.
    pub fn expected_open_probability(&self) -> Array1<f32> {
        let shift = self.support.open_logit_shift();
        self.log_alpha.mapv(|la| sigmoid(la - shift))
    }

    /// Derivative of [`Self::expected_open_probability`] with respect to
    /// `log_alpha`, `p (1 - p)`.
    pub fn expected_open_probability_grad(&self) -> Array1<f32> {
        self.expected_open_probability().mapv(|p| p * (1.0 - p))
    }

    /// Expected number of open units.
    pub fn expected_l0(&self) -> f32 {
        self.expected_open_probability().sum()
    }

    /// Indices of units whose deterministic coefficient exceeds `threshold`.
    pub fn open_units(&self, threshold: f32) -> Vec<usize> {
        self.deterministic()
            .values()
            .iter()
            .enumerate()
            .filter(|(_, &z)| z > threshold)
            .map(|(i, _)| i)
            .collect()
    }
}
