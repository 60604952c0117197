//! Architectural widths of one projection.

use serde::{Deserialize, Serialize};

/// `in_features → units → out_features` at full (unpruned) width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionDims {
    /// Input width.
    pub in_features: usize,
    /// Prunable bottleneck width (gate units).
    pub units: usize,
    /// Output width seen by the surrounding encoder math.
    pub out_features: usize,
}

impl ProjectionDims {
    /// Create dims.
    pub fn new(in_features: usize, units: usize, out_features: usize) -> Self {
        Self { in_features, units, out_features }
    }

    /// Parameters carried by one bottleneck unit: one `down` row plus one `up`
    /// column.
    pub fn unit_cost(&self) -> usize {
        self.in_features + self.out_features
    }
}
