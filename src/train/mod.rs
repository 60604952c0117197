//! Training-step glue
//!
//! The encoder math, task loss and batching live with the caller. Each step
//! the caller runs [`FlopTrainer::forward`] / [`GatedProjection::backward`]
//! for the projections it touches and hands the task gradients to
//! [`FlopTrainer::apply_step`], which adds the sparsity regularization,
//! updates every parameter, and ascends the multipliers exactly once.
//!
//! ```
//! use flop::config::{EncoderConfig, FlopConfig};
//! use flop::train::FlopTrainer;
//! use std::collections::BTreeMap;
//!
//! let config = FlopConfig::default()
//!     .with_encoder(EncoderConfig::tiny())
//!     .with_target_sparsity_warmup(10);
//! let mut trainer = FlopTrainer::new(config).unwrap();
//!
//! let metrics = trainer.apply_step(0.0, BTreeMap::new()).unwrap();
//! assert_eq!(metrics.step, 0);
//! assert_eq!(trainer.global_step(), 1);
//! ```
//!
//! [`GatedProjection::backward`]: crate::projection::GatedProjection::backward

mod metrics;
mod trainer;

#[cfg(test)]
mod tests;

pub use metrics::StepMetrics;
pub use trainer::{FlopTrainer, Regularization};
