//! Privacy amplification by subsampling.
//!
//! Both directions are closed form. The inverse is a sufficient base
//! requirement; multi-round calibration uses the subsampled RDP curve from
//! [`crate::rdp`] instead, which is tighter.

use privcal_core::{validate_delta, validate_sampling_rate, DpError, Result};

/// Amplified `(epsilon, delta)` of a base `(eps0, delta0)` mechanism applied
/// to a `gamma`-subsample.
pub fn subsample_forward(eps0: f64, delta0: f64, gamma: f64) -> Result<(f64, f64)> {
    if !eps0.is_finite() || eps0 < 0.0 {
        return Err(DpError::invalid(format!(
            "base epsilon must be non-negative and finite, got {eps0}"
        )));
    }
    if !delta0.is_finite() || !(0.0..=1.0).contains(&delta0) {
        return Err(DpError::invalid(format!(
            "base delta must be in [0, 1], got {delta0}"
        )));
    }
    validate_sampling_rate(gamma)?;
    Ok(amplify(eps0, delta0, gamma))
}

/// Minimal base `(eps0, delta0)` whose `gamma`-subsampled guarantee meets the
/// target `(epsilon, delta)`.
pub fn subsample_inverse(epsilon: f64, delta: f64, gamma: f64) -> Result<(f64, f64)> {
    if !epsilon.is_finite() || epsilon <= 0.0 {
        return Err(DpError::invalid(format!(
            "epsilon must be positive and finite, got {epsilon}"
        )));
    }
    validate_delta(delta)?;
    validate_sampling_rate(gamma)?;

    let delta0 = delta / gamma;
    if delta0 >= 1.0 {
        return Err(DpError::domain(format!(
            "base delta {delta0} = {delta} / {gamma} is not below one"
        )));
    }
    let eps0 = (epsilon.exp_m1() / gamma).ln_1p();
    if !eps0.is_finite() {
        return Err(DpError::domain(format!(
            "base epsilon is not finite for epsilon={epsilon}, gamma={gamma}"
        )));
    }
    Ok((eps0, delta0))
}

pub(crate) fn amplify(eps0: f64, delta0: f64, gamma: f64) -> (f64, f64) {
    ((gamma * eps0.exp_m1()).ln_1p(), gamma * delta0)
}
