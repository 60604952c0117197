//! Dense layer with a closed-form backward pass.

use crate::error::{FlopError, Result};
use crate::math::standard_normal;
use ndarray::{Array1, Array2, ArrayViewMut1, ArrayViewMut2, Axis};
use rand::Rng;

/// `y = x Wᵀ + b` with `W ∈ ℝ^(out × in)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Linear {
    /// Weight matrix `[out, in]`.
    weight: Array2<f32>,
    /// Optional bias `[out]`.
    bias: Option<Array1<f32>>,
}

/// Gradients of a [`Linear`] layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearGrads {
    /// `∂L/∂W`, `[out, in]`.
    pub weight: Array2<f32>,
    /// `∂L/∂b`, `[out]`, present iff the layer has a bias.
    pub bias: Option<Array1<f32>>,
    /// `∂L/∂x`, `[batch, in]`.
    pub input: Array2<f32>,
}

impl Linear {
    /// Create a layer from explicit parameters.
    pub fn new(weight: Array2<f32>, bias: Option<Array1<f32>>) -> Result<Self> {
        if let Some(b) = &bias {
            if b.len() != weight.nrows() {
                return Err(FlopError::ShapeMismatch {
                    context: "linear bias".into(),
                    expected: vec![weight.nrows()],
                    actual: vec![b.len()],
                });
            }
        }
        Ok(Self { weight, bias })
    }

    /// Weights from `Normal(0, std)`, bias zeros.
    pub fn init<R: Rng + ?Sized>(
        in_features: usize,
        out_features: usize,
        with_bias: bool,
        std: f32,
        rng: &mut R,
    ) -> Self {
        let weight =
            Array2::from_shape_fn((out_features, in_features), |_| std * standard_normal(rng));
        let bias = with_bias.then(|| Array1::zeros(out_features));
        Self { weight, bias }
    }

    /// Input width.
    pub fn in_features(&self) -> usize {
        self.weight.ncols()
    }

    /// Output width.
    pub fn out_features(&self) -> usize {
        self.weight.nrows()
    }

    /// Weight matrix `[out, in]`.
    pub fn weight(&self) -> &Array2<f32> {
        &self.weight
    }

    /// Mutable weight view; the shape cannot change.
    pub fn weight_mut(&mut self) -> ArrayViewMut2<'_, f32> {
        self.weight.view_mut()
    }

    /// Bias, if any.
    pub fn bias(&self) -> Option<&Array1<f32>> {
        self.bias.as_ref()
    }

    /// Mutable bias view.
    pub fn bias_mut(&mut self) -> Option<ArrayViewMut1<'_, f32>> {
        self.bias.as_mut().map(|b| b.view_mut())
    }

    /// Split borrow of weight and bias.
    pub fn parts_mut(&mut self) -> (ArrayViewMut2<'_, f32>, Option<ArrayViewMut1<'_, f32>>) {
        (self.weight.view_mut(), self.bias.as_mut().map(|b| b.view_mut()))
    }

    /// Number of scalar parameters.
    pub fn parameter_count(&self) -> usize {
        self.weight.len() + self.bias.as_ref().map_or(0, |b| b.len())
    }

    /// `[batch, in] → [batch, out]`.
    pub fn forward(&self, input: &Array2<f32>) -> Array2<f32> {
        let out = input.dot(&self.weight.t());
        match &self.bias {
            Some(b) => out + b,
            None => out,
        }
    }

    /// Backward pass given the forward input and `∂L/∂y`.
    pub fn backward(&self, input: &Array2<f32>, grad_output: &Array2<f32>) -> LinearGrads {
        LinearGrads {
            weight: grad_output.t().dot(input),
            bias: self.bias.as_ref().map(|_| grad_output.sum_axis(Axis(0))),
            input: grad_output.dot(&self.weight),
        }
    }

    /// Keep only the given output rows.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            weight: self.weight.select(Axis(0), rows),
            bias: self.bias.as_ref().map(|b| b.select(Axis(0), rows)),
        }
    }

    /// Keep only the given input columns, scaling column `j` by `scale[j]`.
    pub fn select_columns(&self, columns: &[usize], scale: &[f32]) -> Self {
        debug_assert_eq!(columns.len(), scale.len());
        let mut weight = self.weight.select(Axis(1), columns);
        for (mut column, &s) in weight.axis_iter_mut(Axis(1)).zip(scale) {
            column *= s;
        }
        Self { weight, bias: self.bias.clone() }
    }
}
