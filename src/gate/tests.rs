//! Tests for hard-concrete gates.

use super::*;
use approx::assert_relative_eq;
use ndarray::{arr1, Array1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn support_half() -> HardConcreteSupport {
    HardConcreteSupport::new(-0.1, 1.1, 0.5).expect("valid support")
}

// =============================================================================
// HardConcreteSupport Tests
// =============================================================================

#[test]
fn test_support_default_is_valid() {
    // TEST_ID: GATE-001
    let support = HardConcreteSupport::default();
    assert!(support.validate().is_ok(), "GATE-001 FALSIFIED: default support must validate");
    assert_relative_eq!(support.limit_l(), -0.1);
    assert_relative_eq!(support.limit_r(), 1.1);
    assert_relative_eq!(support.beta(), 2.0 / 3.0);
}

#[test]
fn test_support_rejects_degenerate_limits() {
    // TEST_ID: GATE-002
    assert!(matches!(
        HardConcreteSupport::new(0.0, 1.1, 0.5),
        Err(crate::FlopError::InvalidLimitL(_))
    ));
    assert!(matches!(
        HardConcreteSupport::new(0.2, 1.1, 0.5),
        Err(crate::FlopError::InvalidLimitL(_))
    ));
    assert!(matches!(
        HardConcreteSupport::new(-0.1, 1.0, 0.5),
        Err(crate::FlopError::InvalidLimitR(_))
    ));
    assert!(matches!(
        HardConcreteSupport::new(-0.1, 1.1, 0.0),
        Err(crate::FlopError::InvalidTemperature(_))
    ));
    assert!(matches!(
        HardConcreteSupport::new(-0.1, 1.1, -1.0),
        Err(crate::FlopError::InvalidTemperature(_))
    ));
    assert!(HardConcreteSupport::new(f32::NAN, 1.1, 0.5).is_err());
}

#[test]
fn test_support_rejects_bad_eps() {
    // TEST_ID: GATE-003
    let support = support_half();
    assert!(support.with_eps(0.0).is_err());
    assert!(support.with_eps(0.5).is_err());
    assert!(support.with_eps(1e-4).is_ok());
}

#[test]
fn test_support_stretch_maps_endpoints() {
    let support = support_half();
    assert_relative_eq!(support.stretch(0.0), -0.1, epsilon = 1e-6);
    assert_relative_eq!(support.stretch(1.0), 1.1, epsilon = 1e-6);
    assert_relative_eq!(support.span(), 1.2, epsilon = 1e-6);
}

// =============================================================================
// Construction
// =============================================================================

#[test]
fn test_gate_rejects_non_finite_log_alpha() {
    let err = HardConcreteGate::new(arr1(&[0.0, f32::INFINITY]), support_half());
    assert!(err.is_err());
}

#[test]
fn test_gate_init_centers_on_drop_rate() {
    // TEST_ID: GATE-010
    let mut rng = StdRng::seed_from_u64(0);
    let init = GateInit { drop_rate_init: 0.5, std: 0.0 };
    let gate = HardConcreteGate::init(16, support_half(), &init, &mut rng).unwrap();
    assert_eq!(gate.units(), 16);
    assert!(gate.log_alpha().iter().all(|&v| v == 0.0), "GATE-010 FALSIFIED: mean must be 0");

    let init = GateInit { drop_rate_init: 0.1, std: 0.0 };
    let gate = HardConcreteGate::init(4, support_half(), &init, &mut rng).unwrap();
    let expected = (0.9f32).ln() - (0.1f32).ln();
    for &v in gate.log_alpha() {
        assert_relative_eq!(v, expected, epsilon = 1e-6);
    }
}

#[test]
fn test_gate_init_rejects_bad_drop_rate() {
    let mut rng = StdRng::seed_from_u64(0);
    let init = GateInit { drop_rate_init: 1.0, std: 0.01 };
    assert!(HardConcreteGate::init(4, support_half(), &init, &mut rng).is_err());
    let init = GateInit { drop_rate_init: 0.5, std: -1.0 };
    assert!(HardConcreteGate::init(4, support_half(), &init, &mut rng).is_err());
}

#[test]
fn test_set_log_alpha_checks_length() {
    let mut gate = HardConcreteGate::new(Array1::zeros(3), support_half()).unwrap();
    assert!(gate.set_log_alpha(&[1.0, 2.0]).is_err());
    gate.set_log_alpha(&[1.0, 2.0, 3.0]).unwrap();
    assert_eq!(gate.log_alpha(), &arr1(&[1.0, 2.0, 3.0]));
}

// =============================================================================
// Sampling
// =============================================================================

#[test]
fn test_deterministic_three_closed_five_open() {
    // TEST_ID: GATE-020
    let log_alpha = arr1(&[-8.0, 9.0, -12.0, 7.5, 10.0, -9.0, 8.0, 11.0]);
    let gate = HardConcreteGate::new(log_alpha, support_half()).unwrap();
    let mask = gate.deterministic();

    let closed = mask.values().iter().filter(|&&z| z == 0.0).count();
    let open = mask.values().iter().filter(|&&z| z == 1.0).count();
    assert_eq!(closed, 3, "GATE-020 FALSIFIED: expected 3 closed units, got {closed}");
    assert_eq!(open, 5, "GATE-020 FALSIFIED: expected 5 open units, got {open}");
    assert_eq!(mask.open_count(0.0), 5);
    assert!(!mask.is_stochastic());
    assert_eq!(gate.open_units(0.0), vec![1, 3, 4, 6, 7]);
}

#[test]
fn test_inference_sample_is_pure() {
    // TEST_ID: GATE-021
    let gate = HardConcreteGate::new(arr1(&[-0.3, 0.0, 0.4, 2.0]), support_half()).unwrap();
    let mut rng_a = StdRng::seed_from_u64(1);
    let mut rng_b = StdRng::seed_from_u64(999);

    let a = gate.sample(false, &mut rng_a);
    let b = gate.sample(false, &mut rng_b);
    assert_eq!(a, b, "GATE-021 FALSIFIED: inference mask must not depend on the rng");
    assert_eq!(a, gate.deterministic());

    // The rng must not have been advanced.
    let mut fresh = StdRng::seed_from_u64(1);
    assert_eq!(rng_a.random::<u64>(), fresh.random::<u64>());
}

#[test]
fn test_training_sample_in_unit_interval() {
    let mut rng = StdRng::seed_from_u64(3);
    let gate = HardConcreteGate::new(Array1::linspace(-6.0, 6.0, 64), support_half()).unwrap();
    for _ in 0..50 {
        let mask = gate.sample(true, &mut rng);
        assert!(mask.is_stochastic());
        assert!(mask.values().iter().all(|&z| (0.0..=1.0).contains(&z)));
        assert!(mask.log_alpha_grad().iter().all(|g| g.is_finite() && *g >= 0.0));
    }
}

#[test]
fn test_training_sample_draws_fresh_noise() {
    let mut rng = StdRng::seed_from_u64(11);
    let gate = HardConcreteGate::new(Array1::zeros(32), support_half()).unwrap();
    let a = gate.sample(true, &mut rng);
    let b = gate.sample(true, &mut rng);
    assert_ne!(a.values(), b.values());
}

#[test]
fn test_expected_open_probability_matches_monte_carlo() {
    // TEST_ID: GATE-030
    // FALSIFIES: closed-form P(z > 0) disagrees with the sampling distribution
    let gate =
        HardConcreteGate::new(arr1(&[-2.0, -0.5, 0.0, 0.7, 3.0]), support_half()).unwrap();
    let expected = gate.expected_open_probability();
    let mut rng = StdRng::seed_from_u64(42);

    let draws = 10_000;
    let mut open = vec![0usize; gate.units()];
    for _ in 0..draws {
        let mask = gate.sample(true, &mut rng);
        for (count, &z) in open.iter_mut().zip(mask.values()) {
            if z > 0.0 {
                *count += 1;
            }
        }
    }

    for (i, &count) in open.iter().enumerate() {
        let freq = count as f32 / draws as f32;
        assert!(
            (freq - expected[i]).abs() < 0.02,
            "GATE-030 FALSIFIED: unit {i}: closed form {} vs monte carlo {freq}",
            expected[i]
        );
    }
}

#[test]
fn test_expected_l0_sums_probabilities() {
    let gate = HardConcreteGate::new(arr1(&[-1.0, 0.0, 1.0]), support_half()).unwrap();
    assert_relative_eq!(gate.expected_l0(), gate.expected_open_probability().sum());
    let shift = 0.5 * (0.1f32 / 1.1).ln();
    let p0 = 1.0 / (1.0 + (-(0.0 - shift)).exp());
    assert_relative_eq!(gate.expected_open_probability()[1], p0, epsilon = 1e-6);
}

// =============================================================================
// Gradients
// =============================================================================

#[test]
fn test_training_grad_matches_finite_difference() {
    // TEST_ID: GATE-040
    let base = arr1(&[-0.4f32, 0.1, 0.3, 0.8]);
    let gate = HardConcreteGate::new(base.clone(), support_half()).unwrap();
    let sample = gate.sample(true, &mut StdRng::seed_from_u64(5));
    let h = 1e-3f32;

    for i in 0..base.len() {
        let mut plus = base.clone();
        plus[i] += h;
        let mut minus = base.clone();
        minus[i] -= h;
        // Same seed reproduces the same noise.
        let zp = HardConcreteGate::new(plus, support_half())
            .unwrap()
            .sample(true, &mut StdRng::seed_from_u64(5));
        let zm = HardConcreteGate::new(minus, support_half())
            .unwrap()
            .sample(true, &mut StdRng::seed_from_u64(5));
        let (vp, vm) = (zp.values()[i], zm.values()[i]);
        if vp <= 0.0 || vm <= 0.0 || vp >= 1.0 || vm >= 1.0 {
            continue;
        }
        let fd = (vp - vm) / (2.0 * h);
        assert!(
            (fd - sample.log_alpha_grad()[i]).abs() < 1e-2,
            "GATE-040 FALSIFIED: unit {i}: analytic {} vs fd {fd}",
            sample.log_alpha_grad()[i]
        );
    }
}

#[test]
fn test_clamped_units_have_zero_grad() {
    let gate = HardConcreteGate::new(arr1(&[-20.0, 20.0]), support_half()).unwrap();
    let mask = gate.deterministic();
    assert_eq!(mask.log_alpha_grad(), &arr1(&[0.0, 0.0]));
    assert_eq!(mask.backward(&arr1(&[3.0, -2.0])), arr1(&[0.0, 0.0]));
}

#[test]
fn test_expected_open_probability_grad_matches_finite_difference() {
    let base = arr1(&[-1.5f32, 0.0, 2.0]);
    let gate = HardConcreteGate::new(base.clone(), support_half()).unwrap();
    let grad = gate.expected_open_probability_grad();
    let h = 1e-3f32;
    for i in 0..base.len() {
        let mut plus = base.clone();
        plus[i] += h;
        let mut minus = base.clone();
        minus[i] -= h;
        let pp = HardConcreteGate::new(plus, support_half()).unwrap().expected_open_probability();
        let pm = HardConcreteGate::new(minus, support_half()).unwrap().expected_open_probability();
        let fd = (pp[i] - pm[i]) / (2.0 * h);
        assert!((fd - grad[i]).abs() < 1e-3, "unit {i}: analytic {} vs fd {fd}", grad[i]);
    }
}

#[test]
fn test_empty_gate() {
    let gate = HardConcreteGate::new(Array1::zeros(0), support_half()).unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    assert!(gate.sample(true, &mut rng).is_empty());
    assert_eq!(gate.expected_l0(), 0.0);
}
