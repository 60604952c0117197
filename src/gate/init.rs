//! Initial distribution of `log_alpha`.

use crate::error::{FlopError, Result};
use serde::{Deserialize, Serialize};

/// `log_alpha ~ Normal(ln(1 - d) - ln(d), std)` where `d` is the initial drop
/// rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateInit {
    /// Initial drop rate in `(0, 1)`.
    pub drop_rate_init: f32,
    /// Standard deviation of the initial `log_alpha` draw.
    pub std: f32,
}

impl Default for GateInit {
    fn default() -> Self {
        Self { drop_rate_init: 0.5, std: 0.01 }
    }
}

impl GateInit {
    /// Mean of the initial `log_alpha` draw.
    pub fn mean(&self) -> f32 {
        (1.0 - self.drop_rate_init).ln() - self.drop_rate_init.ln()
    }

    /// Validate the initial distribution.
    pub fn validate(&self) -> Result<()> {
        if !(self.drop_rate_init > 0.0 && self.drop_rate_init < 1.0) {
            return Err(FlopError::InvalidGateInit(format!(
                "drop_rate_init ({}) must be in (0.0, 1.0)",
                self.drop_rate_init
            )));
        }
        if !self.std.is_finite() || self.std < 0.0 {
            return Err(FlopError::InvalidGateInit(format!(
                "std ({}) must be finite and >= 0.0",
                self.std
            )));
        }
        Ok(())
    }
}
