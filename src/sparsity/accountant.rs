//! Expected sparsity over all gated projections.

use crate::projection::{GatedProjection, ProjectionId};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `∂sparsity/∂log_alpha` for every gated projection.
pub type SparsityGradients = BTreeMap<ProjectionId, Array1<f32>>;

/// Parameter-cost-weighted expected sparsity.
///
/// A unit of projection `g` carries `cost_g = in + out` parameters, so
///
/// ```text
/// sparsity = 1 - Σ_g cost_g Σ_u p(g,u) / Σ_g cost_g n_g
/// ```
///
/// where `p` is the closed-form probability that a unit is open. Fixed-width
/// projections are not prunable and are ignored. Sums run in `f64`, so the
/// result does not depend on traversal order beyond rounding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SparsityAccountant;

/// Per-projection expected L0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionSparsity {
    /// Projection name.
    pub projection: ProjectionId,
    /// Gate units.
    pub units: usize,
    /// Expected number of open units.
    pub expected_l0: f32,
    /// Units open under the deterministic mask.
    pub open_units: usize,
}

/// Snapshot of the sparsity metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparsityReport {
    /// Expected sparsity in `[0, 1]`.
    pub sparsity: f32,
    /// Expected surviving parameters across gated projections.
    pub expected_kept_parameters: f64,
    /// Parameters carried by all gated units.
    pub prunable_parameters: usize,
    /// Per-projection breakdown in iteration order.
    pub projections: Vec<ProjectionSparsity>,
}

impl SparsityAccountant {
    /// Create an accountant.
    pub fn new() -> Self {
        Self
    }

    /// Returns `(expected kept, total)` parameter mass over gated units.
    fn mass<'a, I>(&self, projections: I) -> (f64, f64)
    where
        I: IntoIterator<Item = &'a GatedProjection>,
    {
        let mut kept = 0.0f64;
        let mut total = 0.0f64;
        for projection in projections {
            if let Some(gate) = projection.gate() {
                let cost = projection.unit_cost() as f64;
                let open: f64 = gate.expected_open_probability().iter().map(|&p| f64::from(p)).sum();
                kept += cost * open;
                total += cost * gate.units() as f64;
            }
        }
        (kept, total)
    }

    /// Expected sparsity; 0 when nothing is gated.
    pub fn current_sparsity<'a, I>(&self, projections: I) -> f32
    where
        I: IntoIterator<Item = &'a GatedProjection>,
    {
        let (kept, total) = self.mass(projections);
        if total <= 0.0 {
            return 0.0;
        }
        (1.0 - kept / total).clamp(0.0, 1.0) as f32
    }

    /// `∂sparsity/∂log_alpha = -cost_g p (1 - p) / total` per gated projection.
    pub fn sparsity_gradients<'a, I>(&self, projections: I) -> SparsityGradients
    where
        I: IntoIterator<Item = &'a GatedProjection> + Clone,
    {
        let (_, total) = self.mass(projections.clone());
        let mut grads = SparsityGradients::new();
        for projection in projections {
            if let Some(gate) = projection.gate() {
                let grad = if total > 0.0 {
                    let scale = (-(projection.unit_cost() as f64) / total) as f32;
                    gate.expected_open_probability_grad() * scale
                } else {
                    Array1::zeros(gate.units())
                };
                grads.insert(projection.id(), grad);
            }
        }
        grads
    }

    /// Full metrics snapshot.
    pub fn report<'a, I>(&self, projections: I) -> SparsityReport
    where
        I: IntoIterator<Item = &'a GatedProjection> + Clone,
    {
        let (kept, total) = self.mass(projections.clone());
        let per_projection = projections
            .into_iter()
            .filter_map(|projection| {
                projection.gate().map(|gate| ProjectionSparsity {
                    projection: projection.id(),
                    units: gate.units(),
                    expected_l0: gate.expected_l0(),
                    open_units: gate.open_units(0.0).len(),
                })
            })
            .collect();

        SparsityReport {
            sparsity: if total <= 0.0 { 0.0 } else { (1.0 - kept / total).clamp(0.0, 1.0) as f32 },
            expected_kept_parameters: kept,
            prunable_parameters: total as usize,
            projections: per_projection,
        }
    }
}
