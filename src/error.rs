//! Error types for gate construction, model building, and checkpoint I/O.
//!
//! Configuration errors are fatal at build time: every variant that describes
//! a structural mismatch names the offending projection or parameter.

use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum FlopError {
    #[error("Invalid hard-concrete support: limit_l ({0}) must be finite and < 0")]
    InvalidLimitL(f32),

    #[error("Invalid hard-concrete support: limit_r ({0}) must be finite and > 1")]
    InvalidLimitR(f32),

    #[error("Invalid hard-concrete temperature: beta ({0}) must be finite and > 0")]
    InvalidTemperature(f32),

    #[error("Invalid hard-concrete eps: {0} (must be in (0.0, 0.5))")]
    InvalidEps(f32),

    #[error("Invalid gate init: {0}")]
    InvalidGateInit(String),

    #[error("Invalid target sparsity: {0} (must be between 0.0 and 1.0)")]
    InvalidTargetSparsity(f32),

    #[error("Invalid {name}: {value} (must be finite and >= 0.0)")]
    InvalidRate { name: &'static str, value: f32 },

    #[error("Invalid encoder config: {0}")]
    InvalidEncoder(String),

    #[error("pruned_layers_dim has {count} entries but factorize is disabled")]
    PrunedDimsWithoutFactorize { count: usize },

    #[error("Projection {projection} has no entry in pruned_layers_dim (factorize mode)")]
    MissingPrunedWidth { projection: String },

    #[error("pruned_layers_dim names unknown projection {0}")]
    UnknownProjection(String),

    #[error("Projection {projection}: pruned width {width} exceeds unit count {units}")]
    WidthExceedsUnits { projection: String, width: usize, units: usize },

    #[error("Invalid projection id: {0}")]
    InvalidProjectionId(String),

    #[error("Shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch { context: String, expected: Vec<usize>, actual: Vec<usize> },

    #[error("Projection {0} is not gated")]
    NotGated(String),

    #[error("Checkpoint tensor not found: {0}")]
    MissingTensor(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("SafeTensors error: {0}")]
    SafeTensors(#[from] safetensors::SafeTensorError),
}

/// Result type for flop operations
pub type Result<T> = std::result::Result<T, FlopError>;
