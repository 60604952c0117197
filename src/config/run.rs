//! Top-level run configuration.

use super::EncoderConfig;
use crate::error::{FlopError, Result};
use crate::factorize::PrunedLayersDim;
use crate::gate::{GateInit, HardConcreteSupport};
use crate::sparsity::{DualAscentController, SparsityTargetSchedule};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Configuration for a pruning run.
///
/// Exactly one of two modes holds: `factorize = false` builds every projection
/// gated at full width (and `pruned_layers_dim` must be empty);
/// `factorize = true` builds every projection gate-free at the width recorded
/// in `pruned_layers_dim`.
///
/// # Example
///
/// ```
/// use flop::config::{EncoderConfig, FlopConfig};
///
/// let config = FlopConfig::default()
///     .with_encoder(EncoderConfig::tiny())
///     .with_target_sparsity(0.5)
///     .with_target_sparsity_warmup(100);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlopConfig {
    /// Encoder shape.
    encoder: EncoderConfig,

    /// Hard-concrete support shared by every gate.
    support: HardConcreteSupport,

    /// Initial `log_alpha` distribution.
    gate_init: GateInit,

    /// Weight of the expected-density penalty.
    regularization_scale: f32,

    /// Final target sparsity (0.0 to 1.0).
    target_sparsity: f32,

    /// Steps over which the target ramps up from 0.
    target_sparsity_warmup: usize,

    /// Steps over which every learning rate ramps up from 0.
    learning_rate_warmup: usize,

    /// Ascent rate of the linear multiplier.
    lambda_learning_rate: f32,

    /// Ascent rate of the quadratic multiplier.
    alpha_learning_rate: f32,

    /// Model optimizer learning rate.
    learning_rate: f32,

    /// Decoupled weight decay for projection weights.
    weight_decay: f32,

    /// Build gate-free projections at the widths in `pruned_layers_dim`.
    factorize: bool,

    /// Pruned width per projection (factorize mode only).
    pruned_layers_dim: PrunedLayersDim,

    /// Seed for weight init and gate noise.
    seed: u64,
}

impl Default for FlopConfig {
    fn default() -> Self {
        Self {
            encoder: EncoderConfig::default(),
            support: HardConcreteSupport::default(),
            gate_init: GateInit::default(),
            regularization_scale: 0.001,
            target_sparsity: 0.8,
            target_sparsity_warmup: 30_000,
            learning_rate_warmup: 100,
            lambda_learning_rate: 1.0,
            alpha_learning_rate: 0.01,
            learning_rate: 5e-5,
            weight_decay: 0.01,
            factorize: false,
            pruned_layers_dim: PrunedLayersDim::new(),
            seed: 42,
        }
    }
}

impl FlopConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the encoder shape.
    pub fn with_encoder(mut self, encoder: EncoderConfig) -> Self {
        self.encoder = encoder;
        self
    }

    /// Set the hard-concrete support.
    pub fn with_support(mut self, support: HardConcreteSupport) -> Self {
        self.support = support;
        self
    }

    /// Set the gate initialization.
    pub fn with_gate_init(mut self, gate_init: GateInit) -> Self {
        self.gate_init = gate_init;
        self
    }

    /// Set the expected-density penalty weight.
    pub fn with_regularization_scale(mut self, scale: f32) -> Self {
        self.regularization_scale = scale;
        self
    }

    /// Set the final target sparsity.
    pub fn with_target_sparsity(mut self, sparsity: f32) -> Self {
        self.target_sparsity = sparsity;
        self
    }

    /// Set the target warmup length.
    pub fn with_target_sparsity_warmup(mut self, steps: usize) -> Self {
        self.target_sparsity_warmup = steps;
        self
    }

    /// Set the learning-rate warmup length.
    pub fn with_learning_rate_warmup(mut self, steps: usize) -> Self {
        self.learning_rate_warmup = steps;
        self
    }

    /// Set the `lambda` ascent rate.
    pub fn with_lambda_learning_rate(mut self, lr: f32) -> Self {
        self.lambda_learning_rate = lr;
        self
    }

    /// Set the `alpha` ascent rate.
    pub fn with_alpha_learning_rate(mut self, lr: f32) -> Self {
        self.alpha_learning_rate = lr;
        self
    }

    /// Set the model learning rate.
    pub fn with_learning_rate(mut self, lr: f32) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Set the weight decay.
    pub fn with_weight_decay(mut self, weight_decay: f32) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    /// Switch to factorize mode with the given widths.
    pub fn with_pruned_layers_dim(mut self, dims: PrunedLayersDim) -> Self {
        self.factorize = true;
        self.pruned_layers_dim = dims;
        self
    }

    /// Set the factorize flag alone.
    pub fn with_factorize(mut self, factorize: bool) -> Self {
        self.factorize = factorize;
        self
    }

    /// Set the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Get the encoder shape.
    pub fn encoder(&self) -> &EncoderConfig {
        &self.encoder
    }

    /// Get the hard-concrete support.
    pub fn support(&self) -> HardConcreteSupport {
        self.support
    }

    /// Get the gate initialization.
    pub fn gate_init(&self) -> &GateInit {
        &self.gate_init
    }

    /// Get the expected-density penalty weight.
    pub fn regularization_scale(&self) -> f32 {
        self.regularization_scale
    }

    /// Get the final target sparsity.
    pub fn target_sparsity(&self) -> f32 {
        self.target_sparsity
    }

    /// Get the target warmup length.
    pub fn target_sparsity_warmup(&self) -> usize {
        self.target_sparsity_warmup
    }

    /// Get the learning-rate warmup length.
    pub fn learning_rate_warmup(&self) -> usize {
        self.learning_rate_warmup
    }

    /// Get the `lambda` ascent rate.
    pub fn lambda_learning_rate(&self) -> f32 {
        self.lambda_learning_rate
    }

    /// Get the `alpha` ascent rate.
    pub fn alpha_learning_rate(&self) -> f32 {
        self.alpha_learning_rate
    }

    /// Get the model learning rate.
    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    /// Get the weight decay.
    pub fn weight_decay(&self) -> f32 {
        self.weight_decay
    }

    /// Check if the model is built at fixed pruned widths.
    pub fn factorize(&self) -> bool {
        self.factorize
    }

    /// Get the pruned widths.
    pub fn pruned_layers_dim(&self) -> &PrunedLayersDim {
        &self.pruned_layers_dim
    }

    /// Get the seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Target schedule described by this config.
    pub fn schedule(&self) -> Result<SparsityTargetSchedule> {
        SparsityTargetSchedule::new(self.target_sparsity, self.target_sparsity_warmup)
    }

    /// Fresh controller described by this config.
    pub fn controller(&self) -> Result<DualAscentController> {
        DualAscentController::new(
            self.schedule()?,
            self.lambda_learning_rate,
            self.alpha_learning_rate,
            self.learning_rate_warmup,
        )
    }

    /// Validate the whole configuration, naming the offending field or
    /// projection.
    pub fn validate(&self) -> Result<()> {
        self.encoder.validate()?;
        self.support.validate()?;
        self.gate_init.validate()?;

        if !(0.0..=1.0).contains(&self.target_sparsity) {
            return Err(FlopError::InvalidTargetSparsity(self.target_sparsity));
        }
        for (name, value) in [
            ("regularization_scale", self.regularization_scale),
            ("lambda_learning_rate", self.lambda_learning_rate),
            ("alpha_learning_rate", self.alpha_learning_rate),
            ("learning_rate", self.learning_rate),
            ("weight_decay", self.weight_decay),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(FlopError::InvalidRate { name, value });
            }
        }

        self.validate_pruned_layers_dim()
    }

    fn validate_pruned_layers_dim(&self) -> Result<()> {
        let dims = &self.pruned_layers_dim;
        if !self.factorize {
            if !dims.is_empty() {
                return Err(FlopError::PrunedDimsWithoutFactorize { count: dims.len() });
            }
            return Ok(());
        }

        for (id, _) in dims {
            if !self.encoder.contains(id) {
                return Err(FlopError::UnknownProjection(id.to_string()));
            }
        }
        for id in self.encoder.projection_ids() {
            let width = dims
                .get(&id)
                .ok_or_else(|| FlopError::MissingPrunedWidth { projection: id.to_string() })?;
            let units = self.encoder.projection_dims(id.kind()).units;
            if width > units {
                return Err(FlopError::WidthExceedsUnits {
                    projection: id.to_string(),
                    width,
                    units,
                });
            }
        }
        Ok(())
    }

    /// Load and validate a config file. `.yaml` / `.yml` are parsed as YAML,
    /// anything else as JSON.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => serde_yaml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
