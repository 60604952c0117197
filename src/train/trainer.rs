//! Core trainer struct and per-step update.

use super::StepMetrics;
use crate::checkpoint::Checkpoint;
use crate::config::FlopConfig;
use crate::encoder::PrunableEncoder;
use crate::error::{FlopError, Result};
use crate::factorize::{PrunedLayersDim, PruningFactorizer};
use crate::optim::{AdamW, LRScheduler, LinearWarmupLR, Optimizer};
use crate::projection::{ProjectionForward, ProjectionGrads, ProjectionId};
use crate::sparsity::{
    DualAscentController, LagrangianTerm, SparsityAccountant, SparsityGradients, SparsityReport,
};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;

/// Regularization evaluated on the current gates.
#[derive(Debug, Clone, PartialEq)]
pub struct Regularization {
    /// Sparsity metrics the penalties were computed from.
    pub report: SparsityReport,
    /// Augmented-Lagrangian term under the current multipliers.
    pub term: LagrangianTerm,
    /// `regularization_scale * (1 - sparsity)`.
    pub l0_penalty: f32,
    /// Gradient of both penalties with respect to every `log_alpha`.
    pub log_alpha_grads: SparsityGradients,
}

/// Owns the encoder, its optimizer and the sparsity controller for one run.
///
/// The model optimizer defaults to AdamW at `learning_rate` with decay on
/// kernels only; whichever optimizer is installed gets its learning rate from
/// a linear warmup over `learning_rate_warmup` steps. Optimizer state is not
/// part of a [`Checkpoint`], so restore into a freshly built trainer.
pub struct FlopTrainer {
    config: FlopConfig,
    encoder: PrunableEncoder,
    controller: DualAscentController,
    accountant: SparsityAccountant,
    optimizer: Box<dyn Optimizer>,
    scheduler: LinearWarmupLR,
    rng: StdRng,
}

impl FlopTrainer {
    /// Validate `config` and build a fresh encoder, seeded by `config.seed()`.
    pub fn new(config: FlopConfig) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(config.seed());
        let encoder = PrunableEncoder::build(&config, &mut rng)?;
        Self::with_encoder(config, encoder, rng)
    }

    /// Train an existing encoder, e.g. one loaded from a checkpoint.
    ///
    /// The encoder must have the configured shape and match the build mode:
    /// every projection gated when `factorize` is off, otherwise gate-free at
    /// exactly its `pruned_layers_dim` width.
    pub fn with_encoder(config: FlopConfig, encoder: PrunableEncoder, rng: StdRng) -> Result<Self> {
        config.validate()?;
        if encoder.config() != config.encoder() {
            return Err(FlopError::InvalidEncoder(
                "encoder shape differs from the configured encoder".into(),
            ));
        }
        check_realizations(&config, &encoder)?;
        let controller = config.controller()?;
        let optimizer = Box::new(AdamW::new(
            config.learning_rate(),
            0.9,
            0.999,
            1e-8,
            config.weight_decay(),
        ));
        let scheduler = LinearWarmupLR::new(config.learning_rate(), config.learning_rate_warmup());
        Ok(Self {
            config,
            encoder,
            controller,
            accountant: SparsityAccountant::new(),
            optimizer,
            scheduler,
            rng,
        })
    }

    /// Replace the model optimizer. Its learning rate is still driven by the
    /// warmup schedule.
    pub fn with_optimizer(mut self, optimizer: Box<dyn Optimizer>) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Run configuration.
    pub fn config(&self) -> &FlopConfig {
        &self.config
    }

    /// Model being trained.
    pub fn encoder(&self) -> &PrunableEncoder {
        &self.encoder
    }

    /// Mutable model access for callers that manage weights themselves.
    pub fn encoder_mut(&mut self) -> &mut PrunableEncoder {
        &mut self.encoder
    }

    /// Sparsity controller.
    pub fn controller(&self) -> &DualAscentController {
        &self.controller
    }

    /// Global step.
    pub fn global_step(&self) -> usize {
        self.controller.global_step()
    }

    /// Model learning rate at the current step.
    pub fn learning_rate(&self) -> f32 {
        self.scheduler.get_lr()
    }

    /// Run one projection, drawing gate noise from the trainer's RNG.
    pub fn forward(
        &mut self,
        id: &ProjectionId,
        input: &Array2<f32>,
        training: bool,
    ) -> Result<ProjectionForward> {
        self.encoder.forward(id, input, training, &mut self.rng)
    }

    /// Current sparsity metrics.
    pub fn report(&self) -> SparsityReport {
        self.accountant.report(self.encoder.projections())
    }

    /// Evaluate both penalties and their `log_alpha` gradients without
    /// changing any state.
    ///
    /// The loss seen by the gates is
    /// `regularization_scale * (1 - s) + lambda * (s - t) + alpha * (s - t)²`,
    /// so `∂/∂log_alpha = (lambda + 2 alpha (s - t) - regularization_scale) ∂s/∂log_alpha`.
    pub fn regularize(&self) -> Regularization {
        let report = self.report();
        let term = self.controller.lagrangian(report.sparsity);
        let scale = self.config.regularization_scale();
        let coefficient = term.sparsity_grad - scale;

        let log_alpha_grads = self
            .accountant
            .sparsity_gradients(self.encoder.projections())
            .into_iter()
            .map(|(id, grad)| (id, grad * coefficient))
            .collect();

        Regularization { l0_penalty: scale * (1.0 - report.sparsity), report, term, log_alpha_grads }
    }

    /// Apply one optimizer step.
    ///
    /// `grads` holds the task gradients of the projections the caller
    /// touched; missing projections are treated as having zero task
    /// gradient. The regularization gradients are added to every gate, all
    /// parameters are updated, then the multipliers ascend once and the step
    /// advances. When no gate is left the multipliers are not moved, and both
    /// penalties and the reported sparsity are zero.
    pub fn apply_step(
        &mut self,
        task_loss: f32,
        mut grads: BTreeMap<ProjectionId, ProjectionGrads>,
    ) -> Result<StepMetrics> {
        if let Some(unknown) = grads.keys().find(|id| self.encoder.projection(id).is_err()) {
            return Err(FlopError::UnknownProjection(unknown.to_string()));
        }

        let gated = self.encoder.is_gated();
        let reg = self.regularize();
        for projection in self.encoder.projections() {
            let entry = grads
                .entry(projection.id())
                .or_insert_with(|| ProjectionGrads::zeros_like(projection));
            if let Some(extra) = reg.log_alpha_grads.get(&projection.id()) {
                match entry.log_alpha.as_mut() {
                    Some(g) if g.len() == extra.len() => *g += extra,
                    Some(g) => {
                        return Err(FlopError::ShapeMismatch {
                            context: format!("{} log_alpha gradient", projection.id()),
                            expected: vec![extra.len()],
                            actual: vec![g.len()],
                        })
                    }
                    None => entry.log_alpha = Some(extra.clone()),
                }
            }
        }

        self.scheduler.apply(self.optimizer.as_mut());
        let learning_rate = self.optimizer.lr();
        {
            let mut updates = self.encoder.parameter_updates(&grads)?;
            self.optimizer.step(&mut updates);
        }

        let (step, phase, multipliers, l0_penalty, lagrangian_penalty) = if gated {
            let out = self.controller.step(reg.term.sparsity);
            (out.step, out.phase, out.multipliers, reg.l0_penalty, out.term.penalty)
        } else {
            let phase = self.controller.phase();
            (self.controller.advance(), phase, self.controller.multipliers(), 0.0, 0.0)
        };
        self.scheduler.step();

        let metrics = StepMetrics {
            step,
            phase,
            task_loss,
            l0_penalty,
            lagrangian_penalty,
            total_loss: task_loss + l0_penalty + lagrangian_penalty,
            sparsity: reg.report.sparsity,
            target: reg.term.target,
            lambda: multipliers.lambda,
            alpha: multipliers.alpha,
            learning_rate,
            expected_l0: reg
                .report
                .projections
                .iter()
                .map(|p| (p.projection, p.expected_l0))
                .collect(),
        };

        tracing::debug!(
            step = metrics.step,
            sparsity = metrics.sparsity,
            target = metrics.target,
            lambda = metrics.lambda,
            alpha = metrics.alpha,
            total_loss = metrics.total_loss,
            lr = metrics.learning_rate,
            "train step"
        );
        Ok(metrics)
    }

    /// Snapshot weights, gates, multipliers and step.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint::capture(&self.encoder, &self.controller)
    }

    /// Resume from a checkpoint taken with the same configuration.
    pub fn restore(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        checkpoint.restore(&mut self.encoder, &mut self.controller)?;
        self.scheduler.set_step(checkpoint.global_step());
        tracing::info!(
            step = checkpoint.global_step(),
            lambda = checkpoint.multipliers().lambda,
            alpha = checkpoint.multipliers().alpha,
            "restored checkpoint"
        );
        Ok(())
    }

    /// Compress the current model at `threshold`.
    pub fn factorize(&self, threshold: f32) -> Result<(PrunableEncoder, PrunedLayersDim)> {
        PruningFactorizer::new().with_threshold(threshold).compress_encoder(&self.encoder)
    }
}

fn check_realizations(config: &FlopConfig, encoder: &PrunableEncoder) -> Result<()> {
    for projection in encoder.projections() {
        let id = projection.id();
        if !config.factorize() {
            if !projection.is_gated() {
                return Err(FlopError::InvalidEncoder(format!(
                    "{id} is fixed-width but factorize is off"
                )));
            }
            continue;
        }
        if projection.is_gated() {
            return Err(FlopError::InvalidEncoder(format!("{id} is gated but factorize is on")));
        }
        let width = config
            .pruned_layers_dim()
            .get(&id)
            .ok_or_else(|| FlopError::MissingPrunedWidth { projection: id.to_string() })?;
        if projection.width() != width {
            return Err(FlopError::InvalidEncoder(format!(
                "{id} has width {} but pruned_layers_dim gives {width}",
                projection.width()
            )));
        }
    }
    Ok(())
}
