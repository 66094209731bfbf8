//! Monotone bracketing and bisection shared by the calibrators.

use privcal_core::{DpError, Result};

/// Tolerances and iteration caps for a monotone search.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchConfig {
    /// Relative width of the final bracket.
    pub tolerance: f64,
    /// Relative distance to the target at which the search may stop early.
    pub value_tolerance: f64,
    /// Maximum number of bisection steps.
    pub max_iterations: usize,
    /// Maximum number of doublings/halvings while bracketing.
    pub max_bracket_expansions: usize,
    /// First upper end tried while bracketing.
    pub initial_upper: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-9,
            value_tolerance: 1e-9,
            max_iterations: 200,
            max_bracket_expansions: 100,
            initial_upper: 1.0,
        }
    }
}

impl SearchConfig {
    /// Set the relative bracket tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the relative value tolerance.
    pub fn with_value_tolerance(mut self, value_tolerance: f64) -> Self {
        self.value_tolerance = value_tolerance;
        self
    }

    /// Set the bisection iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the bracketing cap.
    pub fn with_max_bracket_expansions(mut self, max_bracket_expansions: usize) -> Self {
        self.max_bracket_expansions = max_bracket_expansions;
        self
    }

    /// Set the initial upper end.
    pub fn with_initial_upper(mut self, initial_upper: f64) -> Self {
        self.initial_upper = initial_upper;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 || self.tolerance >= 1.0 {
            return Err(DpError::config("search tolerance must be in (0, 1)"));
        }
        if !self.value_tolerance.is_finite() || self.value_tolerance < 0.0 {
            return Err(DpError::config("value tolerance must be non-negative"));
        }
        if self.max_iterations == 0 {
            return Err(DpError::config("max_iterations must be positive"));
        }
        if !self.initial_upper.is_finite() || self.initial_upper <= 0.0 {
            return Err(DpError::config("initial_upper must be positive and finite"));
        }
        Ok(())
    }
}

/// Result of probing the objective at one parameter value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Probe {
    /// The objective value.
    Value(f64),
    /// The objective is known to exceed the target; its value was not computed.
    Exceeded,
}

/// Outcome of a successful search.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SearchOutcome {
    /// Smallest parameter found that meets the target.
    pub argument: f64,
    /// Objective value at `argument` (at most the target).
    pub value: f64,
    /// Bisection steps taken.
    pub iterations: usize,
}

const MONOTONE_SLACK: f64 = 1e-9;

/// Find the smallest positive `x` with `objective(x) <= target`, for an
/// objective that is non-increasing in `x`.
///
/// The search converges from above: the returned argument always meets the
/// target. A probe that contradicts monotonicity is a numerical error.
pub fn search_decreasing<F>(config: &SearchConfig, target: f64, mut objective: F) -> Result<SearchOutcome>
where
    F: FnMut(f64) -> Result<Probe>,
{
    config.validate()?;
    let meets = |probe: Probe| matches!(probe, Probe::Value(v) if v <= target);

    let mut hi = config.initial_upper;
    let mut hi_probe = objective(hi)?;
    let mut lo = 0.0;
    let mut lo_value: Option<f64> = None;
    let mut expansions = 0usize;

    while !meets(hi_probe) {
        if expansions >= config.max_bracket_expansions {
            tracing::warn!(upper = hi, expansions, "bracket_not_established");
            return Err(DpError::non_convergence(
                "failed to bracket a parameter achieving the target",
                hi,
            ));
        }
        lo = hi;
        lo_value = probe_value(hi_probe);
        hi *= 2.0;
        hi_probe = objective(hi)?;
        if let Probe::Value(v) = hi_probe {
            check_order(lo_value, v)?;
        }
        expansions += 1;
    }

    if lo == 0.0 {
        // The initial guess already meets the target; walk the lower end down.
        lo = 0.5 * hi;
        let mut shrinks = 0usize;
        loop {
            let probe = objective(lo)?;
            if let (Probe::Value(v), Some(hv)) = (probe, probe_value(hi_probe)) {
                check_order(Some(v), hv)?;
            }
            if !meets(probe) {
                lo_value = probe_value(probe);
                break;
            }
            if shrinks >= config.max_bracket_expansions {
                tracing::warn!(lower = lo, shrinks, "bracket_not_established");
                return Err(DpError::non_convergence(
                    "target met at every probed parameter; no lower bracket",
                    lo,
                ));
            }
            hi = lo;
            hi_probe = probe;
            lo *= 0.5;
            shrinks += 1;
        }
    }

    let mut hi_value = probe_value(hi_probe).unwrap_or(target);
    check_order(lo_value, hi_value)?;

    for iteration in 0..config.max_iterations {
        if hi - lo <= config.tolerance * hi {
            return Ok(SearchOutcome {
                argument: hi,
                value: hi_value,
                iterations: iteration,
            });
        }
        let mid = 0.5 * (lo + hi);
        let probe = objective(mid)?;
        if let Probe::Value(v) = probe {
            check_order(lo_value, v)?;
            check_order(Some(v), hi_value)?;
        }
        tracing::trace!(iteration, lo, hi, mid, ?probe, "bisection_step");

        if meets(probe) {
            hi = mid;
            hi_value = probe_value(probe).unwrap_or(target);
            if target > 0.0 && (target - hi_value) <= config.value_tolerance * target {
                return Ok(SearchOutcome {
                    argument: hi,
                    value: hi_value,
                    iterations: iteration + 1,
                });
            }
        } else {
            lo = mid;
            lo_value = probe_value(probe);
        }
    }

    tracing::warn!(lo, hi, max_iterations = config.max_iterations, "bisection_exhausted");
    Err(DpError::non_convergence(
        "bisection exhausted its iteration cap",
        hi,
    ))
}

fn probe_value(probe: Probe) -> Option<f64> {
    match probe {
        Probe::Value(v) => Some(v),
        Probe::Exceeded => None,
    }
}

/// `lower_arg_value` belongs to a smaller parameter, so it must not be below
/// `higher_arg_value`.
fn check_order(lower_arg_value: Option<f64>, higher_arg_value: f64) -> Result<()> {
    if let Some(lv) = lower_arg_value {
        if lv.is_finite() && higher_arg_value > lv + MONOTONE_SLACK * lv.abs().max(1e-300) {
            tracing::warn!(lv, higher_arg_value, "monotonicity_violation");
            return Err(DpError::numerical(format!(
                "objective increased with the noise parameter ({lv} -> {higher_arg_value})"
            )));
        }
    }
    Ok(())
}

/// Golden-section minimisation of a unimodal function on `[lo, hi]`.
///
/// Returns `(argmin, min)`.
pub fn minimize_unimodal<F>(mut f: F, mut lo: f64, mut hi: f64, iterations: usize) -> (f64, f64)
where
    F: FnMut(f64) -> f64,
{
    let ratio = 0.5 * (5.0f64.sqrt() - 1.0);
    let mut x1 = hi - ratio * (hi - lo);
    let mut x2 = lo + ratio * (hi - lo);
    let mut f1 = f(x1);
    let mut f2 = f(x2);
    for _ in 0..iterations {
        if f1 <= f2 {
            hi = x2;
            x2 = x1;
            f2 = f1;
            x1 = hi - ratio * (hi - lo);
            f1 = f(x1);
        } else {
            lo = x1;
            x1 = x2;
            f1 = f2;
            x2 = lo + ratio * (hi - lo);
            f2 = f(x2);
        }
    }
    if f1 <= f2 {
        (x1, f1)
    } else {
        (x2, f2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_threshold_of_reciprocal() {
        // 1/x <= 0.25 first holds at x = 4.
        let out = search_decreasing(&SearchConfig::default(), 0.25, |x| Ok(Probe::Value(1.0 / x)))
            .expect("search");
        assert!((out.argument - 4.0).abs() < 1e-6);
        assert!(out.value <= 0.25);
    }

    #[test]
    fn walks_lower_end_down() {
        let out = search_decreasing(&SearchConfig::default(), 100.0, |x| Ok(Probe::Value(1.0 / x)))
            .expect("search");
        assert!((out.argument - 0.01).abs() < 1e-8);
    }

    #[test]
    fn exceeded_probes_count_as_misses() {
        let out = search_decreasing(&SearchConfig::default(), 0.5, |x| {
            Ok(if x < 2.0 {
                Probe::Exceeded
            } else {
                Probe::Value(1.0 / x)
            })
        })
        .expect("search");
        assert!((out.argument - 2.0).abs() < 1e-6);
    }

    #[test]
    fn unreachable_target_is_non_convergence() {
        let cfg = SearchConfig::default().with_max_bracket_expansions(10);
        let err = search_decreasing(&cfg, 0.5, |_| Ok(Probe::Value(1.0))).unwrap_err();
        assert_eq!(err.last_estimate(), Some(1024.0));
    }

    #[test]
    fn iteration_cap_is_non_convergence() {
        let cfg = SearchConfig::default()
            .with_max_iterations(3)
            .with_value_tolerance(0.0);
        let err =
            search_decreasing(&cfg, 0.3, |x| Ok(Probe::Value(1.0 / x))).unwrap_err();
        assert!(matches!(err, DpError::NonConvergence { .. }));
        assert!(err.last_estimate().expect("estimate") >= 1.0 / 0.3);
    }

    #[test]
    fn increasing_objective_is_numerical_error() {
        let err = search_decreasing(&SearchConfig::default(), 0.5, |x| {
            Ok(Probe::Value(if x < 1.5 { 0.9 } else if x < 3.0 { 0.95 } else { 0.1 }))
        })
        .unwrap_err();
        assert!(matches!(err, DpError::NumericalError { .. }));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = SearchConfig::default().with_tolerance(0.0);
        assert!(search_decreasing(&cfg, 1.0, |_| Ok(Probe::Value(0.0))).is_err());
    }

    #[test]
    fn golden_section_finds_parabola_minimum() {
        let (x, fx) = minimize_unimodal(|x| (x - 1.5) * (x - 1.5) + 2.0, -10.0, 10.0, 100);
        assert!((x - 1.5).abs() < 1e-6);
        assert!((fx - 2.0).abs() < 1e-10);
    }
}
