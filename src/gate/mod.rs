//! Hard-concrete gates (Louizos et al., 2018)
//!
//! A gate holds one `log_alpha` per output unit of a projection and turns it
//! into an open-coefficient in `[0, 1]`:
//!
//! - **Training**: `z = clamp(s * (r - l) + l, 0, 1)` with
//!   `s = sigmoid((ln u - ln(1 - u) + log_alpha) / beta)`, `u ~ U(eps, 1 - eps)`
//! - **Inference**: the same stretch and clamp applied to
//!   `sigmoid(log_alpha / beta)`, no noise
//! - **Expected L0**: `P(z > 0) = sigmoid(log_alpha - beta * ln(-l / r))`
//!
//! # References
//!
//! - Louizos, C., Welling, M., & Kingma, D. (2018). Learning sparse neural
//!   networks through L0 regularization. ICLR.
//! - Wang, Z., Wohlwend, J., & Lei, T. (2020). Structured pruning of large
//!   language models. EMNLP.

mod hard_concrete;
mod init;
mod sample;
mod support;

#[cfg(test)]
mod proptests;
#[cfg(test)]
mod tests;

pub use hard_concrete::HardConcreteGate;
pub use init::GateInit;
pub use sample::GateSample;
pub use support::HardConcreteSupport;
