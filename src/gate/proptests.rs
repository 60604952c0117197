//! Property-based tests for hard-concrete gates.

use super::{HardConcreteGate, HardConcreteSupport};
use ndarray::Array1;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn support_strategy() -> impl Strategy<Value = HardConcreteSupport> {
    (-2.0f32..-1e-3, 1.001f32..3.0, 0.05f32..4.0).prop_map(|(l, r, beta)| {
        HardConcreteSupport::new(l, r, beta).expect("strategy only yields valid supports")
    })
}

proptest! {
    /// Inference coefficients stay in [0, 1] and do not depend on the rng.
    #[test]
    fn deterministic_bounded_and_pure(
        support in support_strategy(),
        log_alpha in prop::collection::vec(-50.0f32..50.0, 1..64),
        seed in any::<u64>(),
    ) {
        let gate = HardConcreteGate::new(Array1::from(log_alpha), support).unwrap();
        let a = gate.deterministic();
        let b = gate.sample(false, &mut StdRng::seed_from_u64(seed));
        prop_assert_eq!(&a, &b);
        for &z in a.values() {
            prop_assert!((0.0..=1.0).contains(&z));
        }
    }

    /// Training coefficients stay in [0, 1] and never go NaN.
    #[test]
    fn training_bounded_and_finite(
        support in support_strategy(),
        log_alpha in prop::collection::vec(-1e3f32..1e3, 1..64),
        seed in any::<u64>(),
    ) {
        let gate = HardConcreteGate::new(Array1::from(log_alpha), support).unwrap();
        let mask = gate.sample(true, &mut StdRng::seed_from_u64(seed));
        for (&z, &g) in mask.values().iter().zip(mask.log_alpha_grad()) {
            prop_assert!((0.0..=1.0).contains(&z));
            prop_assert!(g.is_finite());
        }
    }

    /// The open probability is monotone in log_alpha.
    #[test]
    fn open_probability_monotone(
        support in support_strategy(),
        a in -20.0f32..20.0,
        delta in 0.0f32..10.0,
    ) {
        let gate = HardConcreteGate::new(Array1::from(vec![a, a + delta]), support).unwrap();
        let p = gate.expected_open_probability();
        prop_assert!(p[1] >= p[0]);
        prop_assert!((0.0..=1.0).contains(&p[0]));
    }
}
