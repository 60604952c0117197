//! Sparsity accounting and dual-ascent control
//!
//! - [`SparsityAccountant`]: expected parameter-weighted sparsity of the gated
//!   projections, with its gradient with respect to every `log_alpha`
//! - [`SparsityTargetSchedule`]: linear warmup of the target sparsity
//! - [`DualAscentController`]: augmented-Lagrangian penalty
//!   `lambda * e + alpha * e²` on `e = sparsity - target`, with multipliers
//!   that ascend on the violation once per optimizer step
//!
//! # References
//!
//! - Wang, Z., Wohlwend, J., & Lei, T. (2020). Structured pruning of large
//!   language models. EMNLP.
//! - Bertsekas, D. (1982). Constrained optimization and Lagrange multiplier
//!   methods.

mod accountant;
mod controller;
mod schedule;

#[cfg(test)]
mod proptests;

pub use accountant::{ProjectionSparsity, SparsityAccountant, SparsityGradients, SparsityReport};
pub use controller::{ControllerStep, DualAscentController, LagrangeMultipliers, LagrangianTerm};
pub use schedule::{ControllerPhase, SparsityTargetSchedule};
