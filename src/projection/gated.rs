//! `down → gate → up` projection.

use super::{Linear, LinearGrads, ProjectionDims, ProjectionId, Realization};
use crate::error::{FlopError, Result};
use crate::gate::{GateInit, GateSample, HardConcreteGate, HardConcreteSupport};
use ndarray::{Array1, Array2, Axis};
use rand::Rng;

/// A prunable linear map realized in three stages.
///
/// The bottleneck width only exists between `down` and `up`; the output width
/// is always `out_features`, gated or not.
///
/// # Example
///
/// ```
/// use flop::gate::{GateInit, HardConcreteSupport};
/// use flop::projection::{GatedProjection, ProjectionDims, ProjectionId, ProjectionKind};
/// use ndarray::Array2;
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let mut rng = StdRng::seed_from_u64(0);
/// let id = ProjectionId::new(0, ProjectionKind::Query);
/// let dims = ProjectionDims::new(4, 8, 4);
/// let proj = GatedProjection::gated(
///     id, dims, HardConcreteSupport::default(), &GateInit::default(), 0.02, &mut rng,
/// ).unwrap();
///
/// let out = proj.forward(&Array2::ones((2, 4)), true, &mut rng).unwrap();
/// assert_eq!(out.output.dim(), (2, 4));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GatedProjection {
    id: ProjectionId,
    /// Bias-free projection into the bottleneck, `[width, in]`.
    down: Linear,
    realization: Realization,
    /// Projection back to the output width, `[out, width]`, with bias.
    up: Linear,
}

/// Values saved by the forward pass for [`GatedProjection::backward`].
#[derive(Debug, Clone)]
pub struct ProjectionCache {
    /// Forward input `[batch, in]`.
    pub input: Array2<f32>,
    /// `down(input)` before gating, `[batch, width]`.
    pub hidden: Array2<f32>,
    /// Gate sample used by this pass (gated projections only).
    pub mask: Option<GateSample>,
}

/// Output of [`GatedProjection::forward`].
#[derive(Debug, Clone)]
pub struct ProjectionForward {
    /// `[batch, out]`.
    pub output: Array2<f32>,
    /// Saved activations.
    pub cache: ProjectionCache,
}

/// Parameter and input gradients of one projection.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionGrads {
    /// `∂L/∂down`, `[width, in]`.
    pub down_weight: Array2<f32>,
    /// `∂L/∂up`, `[out, width]`.
    pub up_weight: Array2<f32>,
    /// `∂L/∂up_bias`, `[out]`.
    pub up_bias: Array1<f32>,
    /// `∂L/∂log_alpha`, `[width]` (gated projections only).
    pub log_alpha: Option<Array1<f32>>,
    /// `∂L/∂input`, `[batch, in]`.
    pub input: Array2<f32>,
}

impl ProjectionGrads {
    /// Zero parameter gradients shaped like `projection` (empty input grad).
    pub fn zeros_like(projection: &GatedProjection) -> Self {
        Self {
            down_weight: Array2::zeros(projection.down.weight().raw_dim()),
            up_weight: Array2::zeros(projection.up.weight().raw_dim()),
            up_bias: Array1::zeros(projection.out_features()),
            log_alpha: projection.gate().map(|g| Array1::zeros(g.units())),
            input: Array2::zeros((0, projection.in_features())),
        }
    }

    /// Accumulate parameter gradients from another pass over the same
    /// projection. Input gradients are per-pass and are not summed.
    pub fn accumulate(&mut self, other: &ProjectionGrads) {
        self.down_weight += &other.down_weight;
        self.up_weight += &other.up_weight;
        self.up_bias += &other.up_bias;
        if let (Some(mine), Some(theirs)) = (self.log_alpha.as_mut(), other.log_alpha.as_ref()) {
            *mine += theirs;
        }
    }
}

impl GatedProjection {
    /// Assemble a projection, checking that the stages agree on the
    /// bottleneck width.
    pub fn new(id: ProjectionId, down: Linear, realization: Realization, up: Linear) -> Result<Self> {
        let width = realization.width();
        if down.bias().is_some() {
            return Err(FlopError::ShapeMismatch {
                context: format!("{id} down projection must be bias-free"),
                expected: vec![0],
                actual: vec![down.out_features()],
            });
        }
        if down.out_features() != width {
            return Err(FlopError::ShapeMismatch {
                context: format!("{id} down projection"),
                expected: vec![width, down.in_features()],
                actual: vec![down.out_features(), down.in_features()],
            });
        }
        if up.in_features() != width {
            return Err(FlopError::ShapeMismatch {
                context: format!("{id} up projection"),
                expected: vec![up.out_features(), width],
                actual: vec![up.out_features(), up.in_features()],
            });
        }
        Ok(Self { id, down, realization, up })
    }

    /// Full-width projection with a freshly initialized gate.
    pub fn gated<R: Rng + ?Sized>(
        id: ProjectionId,
        dims: ProjectionDims,
        support: HardConcreteSupport,
        init: &GateInit,
        initializer_range: f32,
        rng: &mut R,
    ) -> Result<Self> {
        let down = Linear::init(dims.in_features, dims.units, false, initializer_range, rng);
        let gate = HardConcreteGate::init(dims.units, support, init, rng)?;
        let up = Linear::init(dims.units, dims.out_features, true, initializer_range, rng);
        Self::new(id, down, Realization::Gated(gate), up)
    }

    /// Gate-free projection at a pre-decided width.
    pub fn fixed_width<R: Rng + ?Sized>(
        id: ProjectionId,
        dims: ProjectionDims,
        width: usize,
        initializer_range: f32,
        rng: &mut R,
    ) -> Result<Self> {
        if width > dims.units {
            return Err(FlopError::WidthExceedsUnits {
                projection: id.to_string(),
                width,
                units: dims.units,
            });
        }
        let down = Linear::init(dims.in_features, width, false, initializer_range, rng);
        let up = Linear::init(width, dims.out_features, true, initializer_range, rng);
        Self::new(id, down, Realization::FixedWidth(width), up)
    }

    /// Identifier.
    pub fn id(&self) -> ProjectionId {
        self.id
    }

    /// Input width.
    pub fn in_features(&self) -> usize {
        self.down.in_features()
    }

    /// Bottleneck width (gate units, or the fixed pruned width).
    pub fn width(&self) -> usize {
        self.realization.width()
    }

    /// Output width.
    pub fn out_features(&self) -> usize {
        self.up.out_features()
    }

    /// Parameters carried by one bottleneck unit.
    pub fn unit_cost(&self) -> usize {
        self.in_features() + self.out_features()
    }

    /// Total scalar parameters, gate excluded.
    pub fn parameter_count(&self) -> usize {
        self.down.parameter_count() + self.up.parameter_count()
    }

    /// Bottleneck realization.
    pub fn realization(&self) -> &Realization {
        &self.realization
    }

    /// Check if a gate is active.
    pub fn is_gated(&self) -> bool {
        self.realization.is_gated()
    }

    /// The gate, if active.
    pub fn gate(&self) -> Option<&HardConcreteGate> {
        self.realization.gate()
    }

    /// Mutable gate, if active.
    pub fn gate_mut(&mut self) -> Option<&mut HardConcreteGate> {
        self.realization.gate_mut()
    }

    /// `down` stage.
    pub fn down(&self) -> &Linear {
        &self.down
    }

    /// Mutable `down` stage.
    pub fn down_mut(&mut self) -> &mut Linear {
        &mut self.down
    }

    /// `up` stage.
    pub fn up(&self) -> &Linear {
        &self.up
    }

    /// Mutable `up` stage.
    pub fn up_mut(&mut self) -> &mut Linear {
        &mut self.up
    }

    /// Split borrow of `(down, up, gate)` for in-place parameter updates.
    pub fn parts_mut(&mut self) -> (&mut Linear, &mut Linear, Option<&mut HardConcreteGate>) {
        (&mut self.down, &mut self.up, self.realization.gate_mut())
    }

    /// `output = up(z ⊙ down(input))`, or `up(down(input))` at a fixed width.
    ///
    /// `rng` is only consumed by a gated projection in training mode.
    pub fn forward<R: Rng + ?Sized>(
        &self,
        input: &Array2<f32>,
        training: bool,
        rng: &mut R,
    ) -> Result<ProjectionForward> {
        if input.ncols() != self.in_features() {
            return Err(FlopError::ShapeMismatch {
                context: format!("{} input", self.id),
                expected: vec![input.nrows(), self.in_features()],
                actual: vec![input.nrows(), input.ncols()],
            });
        }

        let hidden = self.down.forward(input);
        let mask = self.realization.gate().map(|gate| gate.sample(training, rng));
        let output = match &mask {
            Some(mask) => self.up.forward(&(&hidden * mask.values())),
            None => self.up.forward(&hidden),
        };

        Ok(ProjectionForward {
            output,
            cache: ProjectionCache { input: input.clone(), hidden, mask },
        })
    }

    /// Backward pass through `up`, the gate, and `down`.
    pub fn backward(
        &self,
        cache: &ProjectionCache,
        grad_output: &Array2<f32>,
    ) -> Result<ProjectionGrads> {
        let expected = (cache.input.nrows(), self.out_features());
        if grad_output.dim() != expected {
            return Err(FlopError::ShapeMismatch {
                context: format!("{} grad_output", self.id),
                expected: vec![expected.0, expected.1],
                actual: grad_output.shape().to_vec(),
            });
        }

        let gated = match &cache.mask {
            Some(mask) => &cache.hidden * mask.values(),
            None => cache.hidden.clone(),
        };
        let LinearGrads { weight: up_weight, bias: up_bias, input: grad_gated } =
            self.up.backward(&gated, grad_output);

        let (grad_hidden, log_alpha) = match &cache.mask {
            Some(mask) => {
                let grad_mask = (&grad_gated * &cache.hidden).sum_axis(Axis(0));
                (&grad_gated * mask.values(), Some(mask.backward(&grad_mask)))
            }
            None => (grad_gated, None),
        };

        let down = self.down.backward(&cache.input, &grad_hidden);

        Ok(ProjectionGrads {
            down_weight: down.weight,
            up_weight,
            up_bias: up_bias.unwrap_or_else(|| Array1::zeros(self.out_features())),
            log_alpha,
            input: down.input,
        })
    }
}
