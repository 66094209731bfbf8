//! (epsilon, delta) privacy budgets.

use crate::error::{DpError, Result};

/// An (epsilon, delta)-DP guarantee, either requested or achieved.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PrivacyBudget {
    /// Bound on the privacy loss.
    pub epsilon: f64,
    /// Probability of exceeding the loss bound.
    pub delta: f64,
}

impl PrivacyBudget {
    /// Create a validated budget with `epsilon > 0` and `delta` in `[0, 1)`.
    pub fn new(epsilon: f64, delta: f64) -> Result<Self> {
        let budget = Self { epsilon, delta };
        budget.validate()?;
        Ok(budget)
    }

    /// A pure epsilon-DP budget.
    pub fn pure(epsilon: f64) -> Result<Self> {
        Self::new(epsilon, 0.0)
    }

    /// Validate the budget invariants.
    pub fn validate(&self) -> Result<()> {
        validate_epsilon(self.epsilon)?;
        validate_delta(self.delta)
    }

    /// Whether this budget spends no delta.
    pub fn is_pure(&self) -> bool {
        self.delta == 0.0
    }

    /// Whether this guarantee is at least as strong as `other`.
    pub fn satisfies(&self, other: &PrivacyBudget) -> bool {
        self.epsilon <= other.epsilon && self.delta <= other.delta
    }
}

/// Validate a positive, finite epsilon.
pub fn validate_epsilon(epsilon: f64) -> Result<()> {
    if !epsilon.is_finite() || epsilon <= 0.0 {
        return Err(DpError::invalid(format!(
            "epsilon must be positive and finite, got {epsilon}"
        )));
    }
    Ok(())
}

/// Validate a delta in `[0, 1)`.
pub fn validate_delta(delta: f64) -> Result<()> {
    if !delta.is_finite() || !(0.0..1.0).contains(&delta) {
        return Err(DpError::invalid(format!(
            "delta must be in [0, 1), got {delta}"
        )));
    }
    Ok(())
}

/// Validate a subsampling rate in `(0, 1]`.
pub fn validate_sampling_rate(gamma: f64) -> Result<()> {
    if !gamma.is_finite() || gamma <= 0.0 || gamma > 1.0 {
        return Err(DpError::invalid(format!(
            "sampling rate must be in (0, 1], got {gamma}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rejects_non_positive_epsilon() {
        assert!(PrivacyBudget::new(0.0, 1e-6).is_err());
        assert!(PrivacyBudget::new(-1.0, 1e-6).is_err());
        assert!(PrivacyBudget::new(f64::NAN, 1e-6).is_err());
        assert!(PrivacyBudget::new(f64::INFINITY, 1e-6).is_err());
    }

    #[test]
    fn delta_must_be_below_one() {
        assert!(PrivacyBudget::new(1.0, 0.0).is_ok());
        assert!(PrivacyBudget::new(1.0, 0.999).is_ok());
        assert!(PrivacyBudget::new(1.0, 1.0).is_err());
        assert!(PrivacyBudget::new(1.0, -1e-9).is_err());
    }

    #[test]
    fn sampling_rate_bounds() {
        assert!(validate_sampling_rate(1.0).is_ok());
        assert!(validate_sampling_rate(1e-9).is_ok());
        assert!(validate_sampling_rate(0.0).is_err());
        assert!(validate_sampling_rate(1.5).is_err());
    }

    #[test]
    fn pure_budget_has_zero_delta() {
        let b = PrivacyBudget::pure(0.5).expect("budget");
        assert!(b.is_pure());
        assert!(b.satisfies(&PrivacyBudget::new(0.5, 1e-6).expect("budget")));
    }

    proptest! {
        #[test]
        fn valid_ranges_are_accepted(eps in 1e-6f64..100.0, delta in 0.0f64..0.999) {
            prop_assert!(PrivacyBudget::new(eps, delta).is_ok());
        }
    }
}
