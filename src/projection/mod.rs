//! Gated projections
//!
//! Every prunable dense layer of the encoder is realized as
//! `down → gate → up`: a bias-free projection into a bottleneck of `units`
//! width, a per-unit hard-concrete mask, and a biased projection back to the
//! layer's output width. When a projection is built at a pre-decided pruned
//! width the gate is dropped and the bottleneck shrinks instead.
//!
//! # References
//!
//! - Wang, Z., Wohlwend, J., & Lei, T. (2020). Structured pruning of large
//!   language models. EMNLP.

mod dims;
mod gated;
mod id;
mod linear;
mod realization;


pub use dims::ProjectionDims;
pub use gated::{GatedProjection, ProjectionCache, ProjectionForward, ProjectionGrads};
pub use id::{ProjectionId, ProjectionKind};
pub use linear::{Linear, LinearGrads};
pub use realization::Realization;
