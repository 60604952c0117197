//! Property tests for sparsity accounting and control.

use super::tests::projection;
use super::*;
use crate::projection::ProjectionKind;
use proptest::prelude::*;

fn log_alphas() -> impl Strategy<Value = Vec<Vec<f32>>> {
    prop::collection::vec(prop::collection::vec(-8.0f32..8.0, 1..6), 1..4)
}

fn build(sets: &[Vec<f32>]) -> Vec<crate::projection::GatedProjection> {
    sets.iter()
        .enumerate()
        .map(|(layer, la)| projection(layer, ProjectionKind::Query, 2 + layer, la, 3))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_sparsity_in_unit_interval(sets in log_alphas()) {
        let s = SparsityAccountant::new().current_sparsity(&build(&sets));
        prop_assert!((0.0..=1.0).contains(&s));
    }

    #[test]
    fn prop_sparsity_monotone_in_log_alpha(sets in log_alphas(), delta in 0.0f32..4.0) {
        let accountant = SparsityAccountant::new();
        let before = accountant.current_sparsity(&build(&sets));
        let lowered: Vec<Vec<f32>> =
            sets.iter().map(|la| la.iter().map(|v| v - delta).collect()).collect();
        let after = accountant.current_sparsity(&build(&lowered));
        prop_assert!(after >= before - 1e-6, "before={before} after={after}");
    }

    #[test]
    fn prop_sparsity_order_invariant(sets in log_alphas()) {
        let accountant = SparsityAccountant::new();
        let forward = build(&sets);
        let reversed: Vec<_> = forward.iter().rev().collect();
        let a = accountant.current_sparsity(&forward);
        let b = accountant.current_sparsity(reversed.iter().copied());
        prop_assert!((a - b).abs() < 1e-6);
    }

    #[test]
    fn prop_lambda_moves_with_error(sparsity in 0.0f32..1.0, target in 0.0f32..1.0) {
        let schedule = SparsityTargetSchedule::new(target, 0).unwrap();
        let mut ctrl = DualAscentController::new(schedule, 0.5, 0.1, 0).unwrap();
        let out = ctrl.step(sparsity);
        let error = sparsity - target;
        if error > 0.0 {
            prop_assert!(out.multipliers.lambda > 0.0);
        } else if error < 0.0 {
            prop_assert!(out.multipliers.lambda < 0.0);
        }
        prop_assert!(out.multipliers.alpha >= 0.0);
    }

    #[test]
    fn prop_target_bounded_and_monotone(target in 0.0f32..=1.0, warmup in 0usize..1000, step in 0usize..2000) {
        let schedule = SparsityTargetSchedule::new(target, warmup).unwrap();
        let t0 = schedule.target_at(step);
        let t1 = schedule.target_at(step + 1);
        prop_assert!(t0 <= target + 1e-6);
        prop_assert!(t1 >= t0);
    }
}
