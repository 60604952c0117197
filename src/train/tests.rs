//! Tests for the training-step glue.

use super::*;
use crate::config::{EncoderConfig, FlopConfig};
use crate::error::FlopError;
use crate::projection::{ProjectionGrads, ProjectionId, ProjectionKind};
use approx::assert_relative_eq;
use ndarray::Array1;
use rand::SeedableRng;
use std::collections::BTreeMap;

fn config() -> FlopConfig {
    FlopConfig::default()
        .with_encoder(EncoderConfig::tiny())
        .with_target_sparsity(0.5)
        .with_target_sparsity_warmup(0)
        .with_learning_rate_warmup(0)
        .with_learning_rate(0.05)
        .with_seed(7)
}

fn run(trainer: &mut FlopTrainer, steps: usize) -> Vec<StepMetrics> {
    (0..steps).map(|_| trainer.apply_step(0.0, BTreeMap::new()).unwrap()).collect()
}

// =============================================================================
// Regularization
// =============================================================================

#[test]
fn test_new_trainer_starts_at_step_zero() {
    // TEST_ID: TRN-001
    let trainer = FlopTrainer::new(config()).unwrap();
    assert_eq!(trainer.global_step(), 0);
    assert!(trainer.encoder().is_gated());
    assert_eq!(trainer.encoder().len(), 12);
    assert_eq!(trainer.controller().multipliers().lambda, 0.0);
}

#[test]
fn test_regularization_pushes_gates_closed() {
    // TEST_ID: TRN-002
    let trainer = FlopTrainer::new(config()).unwrap();
    let reg = trainer.regularize();

    assert_eq!(reg.log_alpha_grads.len(), 12);
    assert_relative_eq!(reg.l0_penalty, 0.001 * (1.0 - reg.report.sparsity), epsilon = 1e-7);
    assert_relative_eq!(reg.term.penalty, 0.0);
    for grad in reg.log_alpha_grads.values() {
        assert!(
            grad.iter().all(|&g| g > 0.0),
            "TRN-002 FALSIFIED: descent on log_alpha must close gates, got {grad:?}"
        );
    }
}

#[test]
fn test_regularize_is_pure() {
    // TEST_ID: TRN-003
    let trainer = FlopTrainer::new(config()).unwrap();
    assert_eq!(trainer.regularize(), trainer.regularize());
    assert_eq!(trainer.global_step(), 0);
}

// =============================================================================
// apply_step
// =============================================================================

#[test]
fn test_apply_step_advances_once() {
    // TEST_ID: TRN-004
    let mut trainer = FlopTrainer::new(config()).unwrap();
    let metrics = run(&mut trainer, 3);
    assert_eq!(metrics.iter().map(|m| m.step).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(trainer.global_step(), 3);

    let first = &metrics[0];
    assert_relative_eq!(first.target, 0.5);
    assert_relative_eq!(first.lambda, first.sparsity - 0.5, epsilon = 1e-6);
    assert_relative_eq!(
        first.total_loss,
        first.task_loss + first.l0_penalty + first.lagrangian_penalty,
        epsilon = 1e-7
    );
    assert_eq!(first.expected_l0.len(), 12);
}

#[test]
fn test_sparsity_rises_toward_target() {
    // TEST_ID: TRN-005
    let mut trainer = FlopTrainer::new(config()).unwrap();
    let initial = trainer.report().sparsity;
    run(&mut trainer, 40);
    let later = trainer.report().sparsity;
    assert!(
        later > initial + 0.1,
        "TRN-005 FALSIFIED: sparsity {initial} -> {later} did not move toward 0.5"
    );
}

#[test]
fn test_learning_rate_warmup() {
    // TEST_ID: TRN-006
    let mut trainer = FlopTrainer::new(config().with_learning_rate_warmup(4)).unwrap();
    let before = trainer.encoder().clone();
    let metrics = run(&mut trainer, 3);
    assert_relative_eq!(metrics[0].learning_rate, 0.0);
    assert_relative_eq!(metrics[2].learning_rate, 0.025, epsilon = 1e-7);

    let mut fresh = FlopTrainer::new(config().with_learning_rate_warmup(4)).unwrap();
    fresh.apply_step(0.0, BTreeMap::new()).unwrap();
    assert_eq!(fresh.encoder(), &before, "TRN-006 FALSIFIED: zero learning rate moved weights");
}

#[test]
fn test_task_gradients_are_applied() {
    // TEST_ID: TRN-007
    let mut trainer = FlopTrainer::new(config()).unwrap();
    let id = ProjectionId::new(0, ProjectionKind::Output);
    let mut grads = ProjectionGrads::zeros_like(trainer.encoder().projection(&id).unwrap());
    grads.up_bias = Array1::ones(8);

    trainer.apply_step(1.5, BTreeMap::from([(id, grads)])).unwrap();
    let bias = trainer.encoder().projection(&id).unwrap().up().bias().unwrap().clone();
    for &b in &bias {
        assert_relative_eq!(b, -0.05, epsilon = 1e-4);
    }
}

#[test]
fn test_installed_optimizer_follows_schedule() {
    // TEST_ID: TRN-014
    let mut trainer = FlopTrainer::new(config().with_learning_rate_warmup(2))
        .unwrap()
        .with_optimizer(Box::new(crate::optim::SGD::new(1.0, 0.0)));
    let id = ProjectionId::new(1, ProjectionKind::Output);
    let grad = |trainer: &FlopTrainer| {
        let mut grads = ProjectionGrads::zeros_like(trainer.encoder().projection(&id).unwrap());
        grads.up_bias = Array1::ones(8);
        BTreeMap::from([(id, grads)])
    };

    let g = grad(&trainer);
    trainer.apply_step(0.0, g).unwrap();
    let g = grad(&trainer);
    let metrics = trainer.apply_step(0.0, g).unwrap();
    assert_relative_eq!(metrics.learning_rate, 0.025, epsilon = 1e-7);

    // step 0 ran at lr 0, step 1 at lr 0.025
    let bias = trainer.encoder().projection(&id).unwrap().up().bias().unwrap().clone();
    for &b in &bias {
        assert_relative_eq!(b, -0.025, epsilon = 1e-6);
    }
}

#[test]
fn test_rejects_unknown_projection() {
    // TEST_ID: TRN-008
    let mut trainer = FlopTrainer::new(config()).unwrap();
    let known = ProjectionId::new(0, ProjectionKind::Query);
    let grads = ProjectionGrads::zeros_like(trainer.encoder().projection(&known).unwrap());
    let unknown = ProjectionId::new(5, ProjectionKind::Query);

    let err = trainer.apply_step(0.0, BTreeMap::from([(unknown, grads)])).unwrap_err();
    assert!(matches!(err, FlopError::UnknownProjection(_)));
    assert_eq!(trainer.global_step(), 0);
}

#[test]
fn test_rejects_wrong_gate_gradient_length() {
    // TEST_ID: TRN-009
    let mut trainer = FlopTrainer::new(config()).unwrap();
    let id = ProjectionId::new(1, ProjectionKind::Key);
    let mut grads = ProjectionGrads::zeros_like(trainer.encoder().projection(&id).unwrap());
    grads.log_alpha = Some(Array1::zeros(3));

    let err = trainer.apply_step(0.0, BTreeMap::from([(id, grads)])).unwrap_err();
    assert!(matches!(err, FlopError::ShapeMismatch { .. }));
}

#[test]
fn test_metrics_json_line() {
    // TEST_ID: TRN-010
    let mut trainer = FlopTrainer::new(config()).unwrap();
    let line = run(&mut trainer, 1)[0].to_json_line().unwrap();
    assert!(!line.contains('\n'));
    let value: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(value["phase"], "steady");
    assert!(value["expected_l0"]["layer_0/attention/self/query"].is_number());
}

// =============================================================================
// Checkpoint and factorize
// =============================================================================

#[test]
fn test_restore_resumes_step_and_multipliers() {
    // TEST_ID: TRN-011
    let mut trainer = FlopTrainer::new(config().with_learning_rate_warmup(10)).unwrap();
    run(&mut trainer, 3);
    let checkpoint = trainer.checkpoint();

    let mut resumed = FlopTrainer::new(config().with_learning_rate_warmup(10).with_seed(99)).unwrap();
    resumed.restore(&checkpoint).unwrap();
    assert_eq!(resumed.global_step(), 3);
    assert_eq!(resumed.controller().multipliers(), trainer.controller().multipliers());
    assert_eq!(resumed.encoder(), trainer.encoder());
    assert_relative_eq!(resumed.learning_rate(), trainer.learning_rate());
}

#[test]
fn test_factorized_run_skips_ascent() {
    // TEST_ID: TRN-012
    let trainer = FlopTrainer::new(config()).unwrap();
    let (_, widths) = trainer.factorize(0.0).unwrap();

    let mut pruned = FlopTrainer::new(config().with_pruned_layers_dim(widths)).unwrap();
    assert!(!pruned.encoder().is_gated());
    let metrics = run(&mut pruned, 2);
    assert_eq!(pruned.global_step(), 2);
    assert_eq!(metrics[1].lambda, 0.0);
    assert_eq!(metrics[1].lagrangian_penalty, 0.0);
    assert_eq!(metrics[1].l0_penalty, 0.0);
    assert_eq!(metrics[1].sparsity, 0.0);
    assert!(metrics[1].expected_l0.is_empty());
}

#[test]
fn test_with_encoder_rejects_other_shape() {
    // TEST_ID: TRN-013
    let other = FlopConfig::default().with_encoder(EncoderConfig::tiny().with_hidden_size(4));
    let encoder = crate::encoder::PrunableEncoder::build(
        &other,
        &mut rand::rngs::StdRng::seed_from_u64(0),
    )
    .unwrap();
    let rng = rand::rngs::StdRng::seed_from_u64(1);
    assert!(matches!(
        FlopTrainer::with_encoder(config(), encoder, rng),
        Err(FlopError::InvalidEncoder(_))
    ));
}

fn tiny_encoder(config: &FlopConfig) -> crate::encoder::PrunableEncoder {
    crate::encoder::PrunableEncoder::build(config, &mut rand::rngs::StdRng::seed_from_u64(0))
        .unwrap()
}

fn uniform_widths(width: usize) -> crate::factorize::PrunedLayersDim {
    EncoderConfig::tiny().projection_ids().map(|id| (id, width)).collect()
}

#[test]
fn test_with_encoder_rejects_gated_encoder_in_factorize_mode() {
    // TEST_ID: TRN-015
    let gated = tiny_encoder(&config());
    let rng = rand::rngs::StdRng::seed_from_u64(1);
    assert!(matches!(
        FlopTrainer::with_encoder(config().with_pruned_layers_dim(uniform_widths(1)), gated, rng),
        Err(FlopError::InvalidEncoder(msg)) if msg.contains("layer_0/attention/self/query")
    ));
}

#[test]
fn test_with_encoder_rejects_width_mismatch() {
    // TEST_ID: TRN-016
    let fixed = tiny_encoder(&config().with_pruned_layers_dim(uniform_widths(2)));
    let rng = rand::rngs::StdRng::seed_from_u64(1);
    let narrower = config().with_pruned_layers_dim(uniform_widths(1));
    assert!(matches!(
        FlopTrainer::with_encoder(narrower, fixed.clone(), rng.clone()),
        Err(FlopError::InvalidEncoder(msg)) if msg.contains("width 2")
    ));

    let trainer =
        FlopTrainer::with_encoder(config().with_pruned_layers_dim(uniform_widths(2)), fixed, rng)
            .unwrap();
    assert!(!trainer.encoder().is_gated());
}

#[test]
fn test_with_encoder_rejects_fixed_width_encoder_when_gated() {
    // TEST_ID: TRN-017
    let fixed = tiny_encoder(&config().with_pruned_layers_dim(uniform_widths(2)));
    let rng = rand::rngs::StdRng::seed_from_u64(1);
    assert!(matches!(
        FlopTrainer::with_encoder(config(), fixed, rng),
        Err(FlopError::InvalidEncoder(msg)) if msg.contains("fixed-width")
    ));
}
