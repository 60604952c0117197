//! Post-training factorization
//!
//! Once the gates have converged, each gated projection collapses to a
//! gate-free projection at the width of its surviving units. The resulting
//! [`PrunedLayersDim`] is the artifact consumed when the encoder is rebuilt
//! in factorize mode.
//!
//! ```
//! use flop::config::{EncoderConfig, FlopConfig};
//! use flop::encoder::PrunableEncoder;
//! use flop::factorize::PruningFactorizer;
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let config = FlopConfig::default().with_encoder(EncoderConfig::tiny());
//! let encoder = PrunableEncoder::build(&config, &mut StdRng::seed_from_u64(0)).unwrap();
//!
//! let (compressed, widths) = PruningFactorizer::new().compress_encoder(&encoder).unwrap();
//! assert!(!compressed.is_gated());
//! assert_eq!(widths.len(), encoder.len());
//! ```

mod factorizer;
mod widths;


pub use factorizer::PruningFactorizer;
pub use widths::PrunedLayersDim;
