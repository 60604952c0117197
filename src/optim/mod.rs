//! Optimizers for training the gated encoder

mod adamw;
mod optimizer;
mod scheduler;
mod sgd;

pub use adamw::AdamW;
pub use optimizer::{Optimizer, ParamUpdate};
pub use scheduler::{LRScheduler, LinearWarmupLR};
pub use sgd::SGD;
