//! Encoder shape and the projection layout derived from it.

use crate::error::{FlopError, Result};
use crate::projection::{ProjectionDims, ProjectionId, ProjectionKind};
use serde::{Deserialize, Serialize};

/// Transformer encoder dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Width of the residual stream.
    pub hidden_size: usize,
    /// Number of encoder layers.
    pub num_hidden_layers: usize,
    /// Attention heads per layer; must divide `hidden_size`.
    pub num_attention_heads: usize,
    /// Feed-forward inner width.
    pub intermediate_size: usize,
    /// Standard deviation of the weight initializer.
    pub initializer_range: f32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            hidden_size: 768,
            num_hidden_layers: 12,
            num_attention_heads: 12,
            intermediate_size: 3072,
            initializer_range: 0.02,
        }
    }
}

impl EncoderConfig {
    /// Small encoder for tests and demos.
    pub fn tiny() -> Self {
        Self {
            hidden_size: 8,
            num_hidden_layers: 2,
            num_attention_heads: 2,
            intermediate_size: 16,
            initializer_range: 0.02,
        }
    }

    /// Set the hidden size.
    pub fn with_hidden_size(mut self, hidden_size: usize) -> Self {
        self.hidden_size = hidden_size;
        self
    }

    /// Set the number of layers.
    pub fn with_num_hidden_layers(mut self, layers: usize) -> Self {
        self.num_hidden_layers = layers;
        self
    }

    /// Set the number of attention heads.
    pub fn with_num_attention_heads(mut self, heads: usize) -> Self {
        self.num_attention_heads = heads;
        self
    }

    /// Set the feed-forward inner width.
    pub fn with_intermediate_size(mut self, size: usize) -> Self {
        self.intermediate_size = size;
        self
    }

    /// Size per attention head.
    pub fn head_dim(&self) -> usize {
        self.hidden_size / self.num_attention_heads.max(1)
    }

    /// Widths of one projection kind.
    pub fn projection_dims(&self, kind: ProjectionKind) -> ProjectionDims {
        let h = self.hidden_size;
        let i = self.intermediate_size;
        match kind {
            ProjectionKind::Query
            | ProjectionKind::Key
            | ProjectionKind::Value
            | ProjectionKind::AttentionOutput => ProjectionDims::new(h, h, h),
            ProjectionKind::Intermediate => ProjectionDims::new(h, h, i),
            ProjectionKind::Output => ProjectionDims::new(i, i, h),
        }
    }

    /// Every prunable projection in layout order.
    pub fn projection_ids(&self) -> impl Iterator<Item = ProjectionId> + Clone + '_ {
        (0..self.num_hidden_layers)
            .flat_map(|layer| ProjectionKind::ALL.into_iter().map(move |kind| ProjectionId::new(layer, kind)))
    }

    /// Check if `id` exists in this layout.
    pub fn contains(&self, id: &ProjectionId) -> bool {
        id.layer() < self.num_hidden_layers
    }

    /// Validate the shape.
    pub fn validate(&self) -> Result<()> {
        if self.hidden_size == 0 {
            return Err(FlopError::InvalidEncoder("hidden_size must be > 0".into()));
        }
        if self.intermediate_size == 0 {
            return Err(FlopError::InvalidEncoder("intermediate_size must be > 0".into()));
        }
        if self.num_attention_heads == 0 {
            return Err(FlopError::InvalidEncoder("num_attention_heads must be > 0".into()));
        }
        if self.hidden_size % self.num_attention_heads != 0 {
            return Err(FlopError::InvalidEncoder(format!(
                "hidden_size ({}) must be divisible by num_attention_heads ({})",
                self.hidden_size, self.num_attention_heads
            )));
        }
        if !self.initializer_range.is_finite() || self.initializer_range < 0.0 {
            return Err(FlopError::InvalidEncoder(format!(
                "initializer_range ({}) must be finite and >= 0.0",
                self.initializer_range
            )));
        }
        Ok(())
    }
}
