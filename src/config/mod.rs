//! Declarative configuration
//!
//! A [`FlopConfig`] fully describes one pruning run: the encoder layout, the
//! hard-concrete support, gate initialization, the sparsity controller, and
//! whether the model is built gated or at fixed pruned widths. Files are YAML
//! or JSON.

mod encoder;
mod run;


pub use encoder::EncoderConfig;
pub use run::FlopConfig;
