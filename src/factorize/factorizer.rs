//! Width derivation and weight slicing.

use super::PrunedLayersDim;
use crate::encoder::PrunableEncoder;
use crate::error::{FlopError, Result};
use crate::projection::{GatedProjection, Realization};

/// Turns converged gates into fixed widths and compressed projections.
///
/// A unit survives when its deterministic coefficient is strictly greater
/// than `threshold`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PruningFactorizer {
    threshold: f32,
}

impl PruningFactorizer {
    /// Factorizer with threshold 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the survival threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Survival threshold.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Width each projection keeps.
    ///
    /// Fixed-width projections keep their width unchanged. A zero width is
    /// reported with a warning and listed by
    /// [`PrunedLayersDim::zero_width_projections`].
    pub fn derive_widths<'a, I>(&self, projections: I) -> PrunedLayersDim
    where
        I: IntoIterator<Item = &'a GatedProjection>,
    {
        let widths: PrunedLayersDim = projections
            .into_iter()
            .map(|p| {
                let width = match p.gate() {
                    Some(gate) => gate.open_units(self.threshold).len(),
                    None => p.width(),
                };
                (p.id(), width)
            })
            .collect();

        for id in widths.zero_width_projections() {
            tracing::warn!(projection = %id, "all units pruned, projection reduces to its bias");
        }
        widths
    }

    /// Gate-free copy of `projection` holding only the surviving units.
    ///
    /// Surviving `down` rows and `up` columns are kept; each kept `up` column
    /// is scaled by its unit's deterministic coefficient, so the compressed
    /// forward matches the deterministic gated forward up to the units
    /// dropped by a non-zero threshold. Fixed-width projections are returned
    /// unchanged.
    pub fn compress(&self, projection: &GatedProjection) -> Result<GatedProjection> {
        let Some(gate) = projection.gate() else {
            return Ok(projection.clone());
        };

        let mask = gate.deterministic();
        let kept = gate.open_units(self.threshold);
        let scale: Vec<f32> = kept.iter().map(|&i| mask.values()[i]).collect();

        let down = projection.down().select_rows(&kept);
        let up = projection.up().select_columns(&kept, &scale);
        GatedProjection::new(projection.id(), down, Realization::FixedWidth(kept.len()), up)
    }

    /// Compress every projection of `encoder`.
    ///
    /// Returns the compressed encoder together with the widths it was built
    /// at, ready to be written as `pruned_layers_dim`.
    pub fn compress_encoder(
        &self,
        encoder: &PrunableEncoder,
    ) -> Result<(PrunableEncoder, PrunedLayersDim)> {
        let widths = self.derive_widths(encoder.projections());
        let compressed = encoder
            .projections()
            .map(|p| self.compress(p))
            .collect::<Result<Vec<_>>>()?;
        let compressed = PrunableEncoder::from_projections(encoder.config().clone(), compressed)?;

        for p in compressed.projections() {
            if widths.get(&p.id()) != Some(p.width()) {
                return Err(FlopError::ShapeMismatch {
                    context: format!("{} compressed width", p.id()),
                    expected: widths.get(&p.id()).into_iter().collect(),
                    actual: vec![p.width()],
                });
            }
        }

        tracing::info!(
            threshold = self.threshold,
            kept_units = widths.total_width(),
            parameters_before = encoder.parameter_count(),
            parameters_after = compressed.parameter_count(),
            "factorized encoder"
        );
        Ok((compressed, widths))
    }
}
