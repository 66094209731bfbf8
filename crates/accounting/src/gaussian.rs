//! Gaussian mechanism calibration.
//!
//! Three calibrations of the noise scale `sigma` (unit L2 sensitivity) to a
//! target `(epsilon, delta)`:
//!
//! - the classical closed form `sqrt(2 ln(1.25 / delta)) / epsilon`,
//! - an RDP-based calibration through the optimal Rényi order,
//! - the analytical calibration of Balle & Wang, which uses the exact
//!   `delta(epsilon, sigma)` of the Gaussian mechanism and dominates both.

use statrs::distribution::{ContinuousCDF, Normal};

use privcal_core::{validate_epsilon, DpError, PrivacyBudget, Result};

use crate::calibrate::CalibrationResult;
use crate::search::{minimize_unimodal, search_decreasing, Probe, SearchConfig, SearchOutcome};

fn validate_gaussian_delta(delta: f64) -> Result<()> {
    if !delta.is_finite() || delta <= 0.0 || delta >= 1.0 {
        return Err(DpError::invalid(format!(
            "Gaussian calibration needs delta in (0, 1), got {delta}"
        )));
    }
    Ok(())
}

fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| DpError::numerical(format!("standard normal: {e}")))
}

fn delta_for_sigma(sigma: f64, eps: f64, normal: &Normal) -> f64 {
    let term1 = normal.cdf(-eps * sigma + 1.0 / (2.0 * sigma));
    let term2 = eps.exp() * normal.cdf(-eps * sigma - 1.0 / (2.0 * sigma));
    (term1 - term2).clamp(0.0, 1.0)
}

/// Exact `delta` of the Gaussian mechanism with noise `sigma` at `epsilon`.
pub fn gaussian_delta(epsilon: f64, sigma: f64) -> Result<f64> {
    if !epsilon.is_finite() || epsilon < 0.0 {
        return Err(DpError::invalid(format!(
            "epsilon must be non-negative and finite, got {epsilon}"
        )));
    }
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(DpError::invalid(format!(
            "sigma must be positive and finite, got {sigma}"
        )));
    }
    Ok(delta_for_sigma(sigma, epsilon, &standard_normal()?))
}

/// Classical calibration `sqrt(2 ln(1.25 / delta)) / epsilon`.
///
/// The formula is only a valid guarantee for `epsilon <= 1`; it is still
/// computed for larger `epsilon`.
pub fn classical_gaussian_sigma(epsilon: f64, delta: f64) -> Result<f64> {
    validate_epsilon(epsilon)?;
    validate_gaussian_delta(delta)?;
    Ok((2.0 * (1.25 / delta).ln()).sqrt() / epsilon)
}

/// Smallest `sigma` whose exact `delta(epsilon, sigma)` is at most `delta`.
pub fn analytical_gaussian_sigma(
    epsilon: f64,
    delta: f64,
    search: &SearchConfig,
) -> Result<SearchOutcome> {
    validate_epsilon(epsilon)?;
    validate_gaussian_delta(delta)?;
    let normal = standard_normal()?;
    search_decreasing(search, delta, |sigma| {
        Ok(Probe::Value(delta_for_sigma(sigma, epsilon, &normal)))
    })
}

/// Epsilon of a single Gaussian release via the optimal Rényi order.
///
/// Minimises `alpha / (2 sigma^2) + ln(1 / delta) / (alpha - 1)` over
/// `alpha > 1` by golden-section search on `ln(alpha - 1)`.
pub fn rdp_gaussian_epsilon(sigma: f64, delta: f64) -> Result<f64> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(DpError::invalid(format!(
            "sigma must be positive and finite, got {sigma}"
        )));
    }
    validate_gaussian_delta(delta)?;
    Ok(rdp_epsilon_unchecked(sigma, (1.0 / delta).ln()))
}

fn rdp_epsilon_unchecked(sigma: f64, log_delta_inv: f64) -> f64 {
    let objective = |log_am1: f64| {
        let am1 = log_am1.exp();
        (am1 + 1.0) / (2.0 * sigma * sigma) + log_delta_inv / am1
    };
    let (_, eps) = minimize_unimodal(objective, (1e-8f64).ln(), (1e12f64).ln(), 200);
    eps
}

/// Smallest `sigma` whose RDP-derived epsilon is at most `epsilon`.
pub fn rdp_gaussian_sigma(epsilon: f64, delta: f64, search: &SearchConfig) -> Result<SearchOutcome> {
    validate_epsilon(epsilon)?;
    validate_gaussian_delta(delta)?;
    let log_delta_inv = (1.0 / delta).ln();
    search_decreasing(search, epsilon, |sigma| {
        Ok(Probe::Value(rdp_epsilon_unchecked(sigma, log_delta_inv)))
    })
}

/// Classical Gaussian calibration for unit sensitivity.
pub fn classical_gaussian(epsilon: f64, delta: f64) -> Result<CalibrationResult> {
    let sigma = classical_gaussian_sigma(epsilon, delta)?;
    Ok(CalibrationResult::Gaussian {
        sigma,
        achieved: PrivacyBudget { epsilon, delta },
    })
}

/// RDP-based Gaussian calibration for unit sensitivity.
pub fn rdp_gaussian(epsilon: f64, delta: f64) -> Result<CalibrationResult> {
    let out = rdp_gaussian_sigma(epsilon, delta, &SearchConfig::default())?;
    Ok(CalibrationResult::Gaussian {
        sigma: out.argument,
        achieved: PrivacyBudget {
            epsilon: out.value,
            delta,
        },
    })
}

/// Analytical Gaussian calibration for unit sensitivity.
pub fn analytical_gaussian(epsilon: f64, delta: f64) -> Result<CalibrationResult> {
    let out = analytical_gaussian_sigma(epsilon, delta, &SearchConfig::default())?;
    Ok(CalibrationResult::Gaussian {
        sigma: out.argument,
        achieved: PrivacyBudget {
            epsilon,
            delta: out.value,
        },
    })
}
