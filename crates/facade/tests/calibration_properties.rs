use privcal::{
    analytical_gaussian, calibrate, classical_gaussian, gaussian_delta, laplace, rdp_gaussian,
    subsample_forward, subsample_inverse, CompositionAccountant, Mechanism, PrivacyEvent, RdpCurve,
};
use proptest::prelude::*;

#[test]
fn analytical_result_is_tight() {
    let res = analytical_gaussian(1.0, 1e-5).expect("analytical");
    let sigma = res.noise_parameter();
    assert!(gaussian_delta(1.0, sigma).expect("delta") <= 1e-5);
    assert!(gaussian_delta(1.0, sigma * (1.0 - 1e-6)).expect("delta") > 1e-5);
}

#[test]
fn laplace_pure_scaling_is_linear() {
    let b1 = laplace(0.5, 0.0, 1).expect("laplace").noise_parameter();
    for k in [2u64, 8, 32] {
        let bk = laplace(0.5, 0.0, k).expect("laplace").noise_parameter();
        assert!((bk - k as f64 * b1).abs() <= 1e-6 * bk, "k={k} b={bk}");
    }
}

#[test]
fn laplace_approximate_scaling_is_sublinear() {
    let b64 = laplace(1.0, 1e-6, 64).expect("laplace").noise_parameter();
    let b1024 = laplace(1.0, 1e-6, 1024).expect("laplace").noise_parameter();
    let ratio = b1024 / b64;
    // Sixteen times the rounds: linear would be 16, square root 4.
    assert!(ratio < 8.0 && ratio > 3.0, "ratio={ratio}");
}

#[test]
fn multi_round_calibration_meets_target_with_accountant() {
    let res = calibrate("laplace", 2.0, 1e-6, 100, 0.05).expect("calibrate");
    let curve = RdpCurve::new(
        Mechanism::subsampled(Mechanism::laplace(res.noise_parameter()).expect("laplace"), 0.05)
            .expect("subsampled"),
    )
    .expect("curve");
    let mut acc = CompositionAccountant::new();
    acc.record_curve_n(&curve, 100);
    assert!(acc.get_epsilon(1e-6) <= 2.0);
}

#[test]
fn accountant_records_raw_budgets() {
    let mut acc = CompositionAccountant::new();
    for _ in 0..100 {
        acc.record(0.01, 1e-9).expect("record");
    }
    // Advanced composition beats the pure sum of 1.0.
    let eps = acc.get_epsilon(1e-5);
    assert!(eps < 0.5, "eps={eps}");
    // Nothing left after the raw deltas: the pure sum is all that remains.
    assert!((acc.get_epsilon(1e-7 * 0.5) - 1.0).abs() < 1e-9);
}

#[test]
fn event_and_calibrator_agree() {
    let res = calibrate("gaussian", 1.0, 1e-5, 10, 1.0).expect("calibrate");
    let eps = PrivacyEvent::gaussian_rounds(res.noise_parameter(), 10, 1.0)
        .and_then(|event| event.epsilon(1e-5))
        .expect("epsilon");
    assert!(eps <= 1.0);
    assert!(eps > 0.99);
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 24, .. ProptestConfig::default() })]

    #[test]
    fn analytical_dominates(eps in 0.05f64..1.0, log_delta in -10.0f64..-3.0) {
        let delta = 10f64.powf(log_delta);
        let ana = analytical_gaussian(eps, delta).unwrap().noise_parameter();
        prop_assert!(ana <= classical_gaussian(eps, delta).unwrap().noise_parameter() * (1.0 + 1e-6));
        prop_assert!(ana <= rdp_gaussian(eps, delta).unwrap().noise_parameter() * (1.0 + 1e-6));
    }

    #[test]
    fn amplification_round_trip(eps in 0.05f64..5.0, delta in 0.0f64..1e-4, gamma in 0.01f64..1.0) {
        let (eps0, delta0) = subsample_inverse(eps, delta, gamma).unwrap();
        let (eps1, delta1) = subsample_forward(eps0, delta0, gamma).unwrap();
        prop_assert!((eps1 - eps).abs() <= 1e-9 * eps.max(1.0));
        prop_assert!((delta1 - delta).abs() <= 1e-15);
    }

    #[test]
    fn subsampling_never_needs_more_noise(rate in 0.01f64..1.0) {
        let sub = calibrate("gaussian", 1.0, 1e-5, 1, rate).unwrap().noise_parameter();
        let full = calibrate("gaussian", 1.0, 1e-5, 1, 1.0).unwrap().noise_parameter();
        prop_assert!(sub <= full * (1.0 + 1e-6));
    }
}
