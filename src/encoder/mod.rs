//! Registry of the encoder's prunable projections
//!
//! The attention and feed-forward arithmetic around the projections lives
//! outside this crate; what it consumes is a fixed, named set of
//! [`GatedProjection`]s per layer:
//!
//! | kind | in | units | out |
//! |------|----|-------|-----|
//! | query / key / value | hidden | hidden | hidden |
//! | attention output | hidden | hidden | hidden |
//! | intermediate | hidden | hidden | intermediate |
//! | output | intermediate | intermediate | hidden |
//!
//! Parameter names follow `{projection}/{down|up}/kernel`, `{projection}/up/bias`
//! and `{projection}/gate/log_alpha`.


use crate::checkpoint::TensorKind;
use crate::config::{EncoderConfig, FlopConfig};
use crate::error::{FlopError, Result};
use crate::optim::ParamUpdate;
use crate::projection::{
    GatedProjection, ProjectionCache, ProjectionForward, ProjectionGrads, ProjectionId,
};
use ndarray::{Array2, ArrayD, ArrayViewD};
use rand::Rng;
use std::collections::{BTreeMap, HashMap};

/// One named parameter tensor.
#[derive(Debug, Clone)]
pub struct NamedParameter<'a> {
    /// Scope-qualified tensor name.
    pub name: String,
    /// Weight or gate.
    pub kind: TensorKind,
    /// Current values.
    pub value: ArrayViewD<'a, f32>,
}

/// All prunable projections of an encoder, in layout order.
#[derive(Debug, Clone, PartialEq)]
pub struct PrunableEncoder {
    config: EncoderConfig,
    projections: BTreeMap<ProjectionId, GatedProjection>,
}

impl PrunableEncoder {
    /// Build every projection described by `config`.
    ///
    /// Gated at full width when `factorize` is off, otherwise gate-free at the
    /// widths in `pruned_layers_dim`. Weights are drawn from
    /// `Normal(0, initializer_range)`, biases are zero.
    pub fn build<R: Rng + ?Sized>(config: &FlopConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let encoder = config.encoder();
        let range = encoder.initializer_range;

        let mut projections = BTreeMap::new();
        for id in encoder.projection_ids() {
            let dims = encoder.projection_dims(id.kind());
            let projection = if config.factorize() {
                let width = config
                    .pruned_layers_dim()
                    .get(&id)
                    .ok_or_else(|| FlopError::MissingPrunedWidth { projection: id.to_string() })?;
                GatedProjection::fixed_width(id, dims, width, range, rng)?
            } else {
                GatedProjection::gated(id, dims, config.support(), config.gate_init(), range, rng)?
            };
            projections.insert(id, projection);
        }

        let built = Self { config: encoder.clone(), projections };
        tracing::info!(
            layers = encoder.num_hidden_layers,
            projections = built.len(),
            parameters = built.parameter_count(),
            factorized = config.factorize(),
            "built prunable encoder"
        );
        Ok(built)
    }

    /// Assemble an encoder from already-built projections.
    ///
    /// Every layout projection must appear exactly once with the layout's
    /// input and output widths and a width no larger than its unit count.
    pub fn from_projections<I>(config: EncoderConfig, projections: I) -> Result<Self>
    where
        I: IntoIterator<Item = GatedProjection>,
    {
        config.validate()?;
        let mut map = BTreeMap::new();
        for projection in projections {
            let id = projection.id();
            if !config.contains(&id) {
                return Err(FlopError::UnknownProjection(id.to_string()));
            }
            let dims = config.projection_dims(id.kind());
            if projection.in_features() != dims.in_features
                || projection.out_features() != dims.out_features
            {
                return Err(FlopError::ShapeMismatch {
                    context: id.to_string(),
                    expected: vec![dims.in_features, dims.out_features],
                    actual: vec![projection.in_features(), projection.out_features()],
                });
            }
            if projection.width() > dims.units {
                return Err(FlopError::WidthExceedsUnits {
                    projection: id.to_string(),
                    width: projection.width(),
                    units: dims.units,
                });
            }
            if map.insert(id, projection).is_some() {
                return Err(FlopError::InvalidEncoder(format!("{id} appears more than once")));
            }
        }
        if let Some(missing) = config.projection_ids().find(|id| !map.contains_key(id)) {
            return Err(FlopError::MissingPrunedWidth { projection: missing.to_string() });
        }
        Ok(Self { config, projections: map })
    }

    /// Encoder shape.
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Number of projections.
    pub fn len(&self) -> usize {
        self.projections.len()
    }

    /// Check if the encoder has no projections.
    pub fn is_empty(&self) -> bool {
        self.projections.is_empty()
    }

    /// Check if any projection still carries a gate.
    pub fn is_gated(&self) -> bool {
        self.projections.values().any(GatedProjection::is_gated)
    }

    /// Look up a projection.
    pub fn projection(&self, id: &ProjectionId) -> Result<&GatedProjection> {
        self.projections.get(id).ok_or_else(|| FlopError::UnknownProjection(id.to_string()))
    }

    /// Look up a projection mutably.
    pub fn projection_mut(&mut self, id: &ProjectionId) -> Result<&mut GatedProjection> {
        self.projections.get_mut(id).ok_or_else(|| FlopError::UnknownProjection(id.to_string()))
    }

    /// Projections in layout order.
    pub fn projections(&self) -> std::collections::btree_map::Values<'_, ProjectionId, GatedProjection> {
        self.projections.values()
    }

    /// Mutable projections in layout order.
    pub fn projections_mut(
        &mut self,
    ) -> std::collections::btree_map::ValuesMut<'_, ProjectionId, GatedProjection> {
        self.projections.values_mut()
    }

    /// Run one projection.
    pub fn forward<R: Rng + ?Sized>(
        &self,
        id: &ProjectionId,
        input: &Array2<f32>,
        training: bool,
        rng: &mut R,
    ) -> Result<ProjectionForward> {
        self.projection(id)?.forward(input, training, rng)
    }

    /// Backward through one projection.
    pub fn backward(
        &self,
        id: &ProjectionId,
        cache: &ProjectionCache,
        grad_output: &Array2<f32>,
    ) -> Result<ProjectionGrads> {
        self.projection(id)?.backward(cache, grad_output)
    }

    /// Model parameters, gates excluded.
    pub fn parameter_count(&self) -> usize {
        self.projections.values().map(GatedProjection::parameter_count).sum()
    }

    /// Gate parameters across all gated projections.
    pub fn gate_parameter_count(&self) -> usize {
        self.projections.values().filter_map(|p| p.gate()).map(|g| g.units()).sum()
    }

    /// Every parameter tensor with its checkpoint name, in layout order.
    pub fn named_parameters(&self) -> Vec<NamedParameter<'_>> {
        let mut params = Vec::new();
        for (id, projection) in &self.projections {
            params.push(NamedParameter {
                name: format!("{id}/down/kernel"),
                kind: TensorKind::Weight,
                value: projection.down().weight().view().into_dyn(),
            });
            params.push(NamedParameter {
                name: format!("{id}/up/kernel"),
                kind: TensorKind::Weight,
                value: projection.up().weight().view().into_dyn(),
            });
            if let Some(bias) = projection.up().bias() {
                params.push(NamedParameter {
                    name: format!("{id}/up/bias"),
                    kind: TensorKind::Weight,
                    value: bias.view().into_dyn(),
                });
            }
            if let Some(gate) = projection.gate() {
                params.push(NamedParameter {
                    name: format!("{id}/gate/log_alpha"),
                    kind: TensorKind::Gate,
                    value: gate.log_alpha().view().into_dyn(),
                });
            }
        }
        params
    }

    /// Overwrite every parameter from a name-keyed map.
    ///
    /// Every tensor named by [`Self::named_parameters`] must be present with
    /// the same shape; extra entries are ignored. All tensors are checked
    /// before any is written, so on error the encoder is left untouched.
    pub fn load_parameters(&mut self, params: &HashMap<String, ArrayD<f32>>) -> Result<()> {
        struct Staged<'p> {
            down: &'p ArrayD<f32>,
            up: &'p ArrayD<f32>,
            bias: Option<&'p ArrayD<f32>>,
            log_alpha: Option<&'p ArrayD<f32>>,
        }

        fn fetch<'p>(
            params: &'p HashMap<String, ArrayD<f32>>,
            name: String,
            shape: &[usize],
        ) -> Result<&'p ArrayD<f32>> {
            let tensor = params.get(&name).ok_or_else(|| FlopError::MissingTensor(name.clone()))?;
            if tensor.shape() != shape {
                return Err(FlopError::ShapeMismatch {
                    context: name,
                    expected: shape.to_vec(),
                    actual: tensor.shape().to_vec(),
                });
            }
            Ok(tensor)
        }

        let mut staged = Vec::with_capacity(self.projections.len());
        for (id, projection) in &self.projections {
            staged.push(Staged {
                down: fetch(params, format!("{id}/down/kernel"), projection.down().weight().shape())?,
                up: fetch(params, format!("{id}/up/kernel"), projection.up().weight().shape())?,
                bias: match projection.up().bias() {
                    Some(b) => Some(fetch(params, format!("{id}/up/bias"), b.shape())?),
                    None => None,
                },
                log_alpha: match projection.gate() {
                    Some(g) => Some(fetch(params, format!("{id}/gate/log_alpha"), &[g.units()])?),
                    None => None,
                },
            });
        }

        for (projection, src) in self.projections.values_mut().zip(staged) {
            let (down_layer, up_layer, gate) = projection.parts_mut();
            down_layer.weight_mut().into_dyn().assign(src.down);
            let (up_weight, up_bias) = up_layer.parts_mut();
            up_weight.into_dyn().assign(src.up);
            if let (Some(dst), Some(bias)) = (up_bias, src.bias) {
                dst.into_dyn().assign(bias);
            }
            if let (Some(gate), Some(log_alpha)) = (gate, src.log_alpha) {
                gate.log_alpha_mut().into_dyn().assign(log_alpha);
            }
        }
        Ok(())
    }

    /// Pair every parameter with its gradient for an optimizer step.
    ///
    /// `grads` must hold an entry for every projection; the order of the
    /// returned updates is stable across calls. Weight decay is flagged on
    /// kernels only.
    pub fn parameter_updates<'a>(
        &'a mut self,
        grads: &'a BTreeMap<ProjectionId, ProjectionGrads>,
    ) -> Result<Vec<ParamUpdate<'a>>> {
        let mut updates = Vec::new();
        for (id, projection) in &mut self.projections {
            let grad = grads.get(id).ok_or_else(|| FlopError::MissingTensor(format!("{id} gradients")))?;
            check_shape(id, "down", projection.down().weight().shape(), grad.down_weight.shape())?;
            check_shape(id, "up", projection.up().weight().shape(), grad.up_weight.shape())?;

            let gate_grad = match (projection.gate(), grad.log_alpha.as_ref()) {
                (Some(gate), Some(g)) => {
                    check_shape(id, "log_alpha", &[gate.units()], g.shape())?;
                    Some(g)
                }
                (Some(_), None) => {
                    return Err(FlopError::MissingTensor(format!("{id}/gate/log_alpha gradient")))
                }
                (None, _) => None,
            };

            let (down, up, gate) = projection.parts_mut();
            updates.push(ParamUpdate::new(
                down.weight_mut().into_dyn(),
                grad.down_weight.view().into_dyn(),
                true,
            ));
            let (up_weight, up_bias) = up.parts_mut();
            updates.push(ParamUpdate::new(up_weight.into_dyn(), grad.up_weight.view().into_dyn(), true));
            if let Some(bias) = up_bias {
                check_shape(id, "up bias", bias.shape(), grad.up_bias.shape())?;
                updates.push(ParamUpdate::new(bias.into_dyn(), grad.up_bias.view().into_dyn(), false));
            }
            if let (Some(gate), Some(g)) = (gate, gate_grad) {
                updates.push(ParamUpdate::new(gate.log_alpha_mut().into_dyn(), g.view().into_dyn(), false));
            }
        }
        Ok(updates)
    }
}

fn check_shape(id: &ProjectionId, what: &str, expected: &[usize], actual: &[usize]) -> Result<()> {
    if expected != actual {
        return Err(FlopError::ShapeMismatch {
            context: format!("{id} {what} gradient"),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        });
    }
    Ok(())
}
