//! How a projection's bottleneck is realized.

use crate::gate::HardConcreteGate;

/// Exactly one of {active gate, fixed pruned width} per projection.
#[derive(Debug, Clone, PartialEq)]
pub enum Realization {
    /// Full unit count, masked by a hard-concrete gate.
    Gated(HardConcreteGate),
    /// Pre-decided pruned width, no gate.
    FixedWidth(usize),
}

impl Realization {
    /// Width of the bottleneck between `down` and `up`.
    pub fn width(&self) -> usize {
        match self {
            Realization::Gated(gate) => gate.units(),
            Realization::FixedWidth(width) => *width,
        }
    }

    /// Check if a gate is active.
    pub fn is_gated(&self) -> bool {
        matches!(self, Realization::Gated(_))
    }

    /// The gate, if active.
    pub fn gate(&self) -> Option<&HardConcreteGate> {
        match self {
            Realization::Gated(gate) => Some(gate),
            Realization::FixedWidth(_) => None,
        }
    }

    /// Mutable gate, if active.
    pub fn gate_mut(&mut self) -> Option<&mut HardConcreteGate> {
        match self {
            Realization::Gated(gate) => Some(gate),
            Realization::FixedWidth(_) => None,
        }
    }
}
