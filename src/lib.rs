//! # flop
//!
//! Structured L0 pruning of transformer encoders.
//!
//! Every prunable dense projection is realized as `down → gate → up`, with a
//! hard-concrete gate per bottleneck unit. During training an
//! augmented-Lagrangian controller pulls the expected fraction of pruned
//! parameters toward a scheduled target; afterwards the converged gates are
//! collapsed into fixed narrower projections.
//!
//! - [`gate`]: hard-concrete gates and their closed-form open probability
//! - [`projection`]: the gated `down → gate → up` projection
//! - [`sparsity`]: expected sparsity accounting and the dual-ascent controller
//! - [`factorize`]: width derivation and weight slicing after training
//! - [`encoder`]: the registry of an encoder's prunable projections
//! - [`train`]: per-step glue combining task and regularization gradients
//! - [`checkpoint`]: SafeTensors persistence with per-tensor kind tags
//!
//! # Example
//!
//! ```
//! use flop::config::{EncoderConfig, FlopConfig};
//! use flop::train::FlopTrainer;
//! use std::collections::BTreeMap;
//!
//! let config = FlopConfig::default()
//!     .with_encoder(EncoderConfig::tiny())
//!     .with_target_sparsity(0.5)
//!     .with_target_sparsity_warmup(100);
//! let mut trainer = FlopTrainer::new(config).unwrap();
//!
//! for _ in 0..3 {
//!     let metrics = trainer.apply_step(0.0, BTreeMap::new()).unwrap();
//!     assert!(metrics.sparsity >= 0.0 && metrics.sparsity <= 1.0);
//! }
//! let (compressed, widths) = trainer.factorize(0.0).unwrap();
//! assert_eq!(widths.len(), compressed.len());
//! ```
//!
//! # References
//!
//! - Louizos, C., Welling, M., & Kingma, D. P. (2018). Learning sparse neural
//!   networks through L0 regularization. ICLR.
//! - Wang, Z., Wohlwend, J., & Lei, T. (2020). Structured pruning of large
//!   language models. EMNLP.

pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod encoder;
pub mod error;
pub mod factorize;
pub mod gate;
pub mod optim;
pub mod projection;
pub mod sparsity;
pub mod train;

mod math;

pub use error::{FlopError, Result};
pub use factorize::{PrunedLayersDim, PruningFactorizer};
pub use gate::{HardConcreteGate, HardConcreteSupport};
pub use projection::{GatedProjection, ProjectionId};
pub use sparsity::{DualAscentController, SparsityAccountant};
