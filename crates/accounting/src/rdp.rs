//! Rényi Differential Privacy of canonical mechanisms.
//!
//! Closed forms assume unit sensitivity. Orders must be strictly greater than
//! one; `f64::INFINITY` evaluates the pure-DP limit, and the KL divergence
//! (order one) has its own entry points.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use privcal_core::{validate_sampling_rate, DpError, Mechanism, Result};

/// Validate a Rényi order: finite `alpha > 1`, or `+inf`.
pub fn check_order(alpha: f64) -> Result<()> {
    if alpha.is_nan() {
        return Err(DpError::invalid("Rényi order must not be NaN"));
    }
    if alpha == 1.0 {
        return Err(DpError::invalid(
            "Rényi order 1 is the KL divergence; use the explicit kl_* functions",
        ));
    }
    if alpha < 1.0 {
        return Err(DpError::invalid(format!(
            "Rényi order must be > 1, got {alpha}"
        )));
    }
    Ok(())
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(DpError::invalid(format!(
            "{name} must be positive and finite, got {value}"
        )));
    }
    Ok(())
}

fn check_probability(p: f64) -> Result<()> {
    if !p.is_finite() || p <= 0.0 || p >= 1.0 {
        return Err(DpError::invalid(format!(
            "probability must be in (0, 1), got {p}"
        )));
    }
    Ok(())
}

/// RDP of the Gaussian mechanism: `alpha / (2 sigma^2)`.
pub fn gaussian(sigma: f64, alpha: f64) -> Result<f64> {
    check_positive("sigma", sigma)?;
    check_order(alpha)?;
    Ok(gaussian_rdp(sigma, alpha))
}

/// RDP of the Laplace mechanism with scale `b`.
pub fn laplace(b: f64, alpha: f64) -> Result<f64> {
    check_positive("b", b)?;
    check_order(alpha)?;
    Ok(laplace_rdp(b, alpha))
}

/// RDP of binary randomized response with truth probability `p`.
pub fn randomized_response(p: f64, alpha: f64) -> Result<f64> {
    check_probability(p)?;
    check_order(alpha)?;
    Ok(randomized_response_rdp(p, alpha))
}

/// Tightest RDP bound implied by pure `epsilon`-DP.
///
/// Randomized response with `p = e^eps / (1 + e^eps)` is the worst case, so
/// this equals its curve.
pub fn pure_dp(epsilon: f64, alpha: f64) -> Result<f64> {
    if !epsilon.is_finite() || epsilon < 0.0 {
        return Err(DpError::invalid(format!(
            "epsilon must be non-negative and finite, got {epsilon}"
        )));
    }
    check_order(alpha)?;
    Ok(pure_dp_rdp(epsilon, alpha))
}

/// KL divergence of the Gaussian mechanism.
pub fn kl_gaussian(sigma: f64) -> Result<f64> {
    check_positive("sigma", sigma)?;
    Ok(1.0 / (2.0 * sigma * sigma))
}

/// KL divergence of the Laplace mechanism.
pub fn kl_laplace(b: f64) -> Result<f64> {
    check_positive("b", b)?;
    let lambda = 1.0 / b;
    Ok(lambda + (-lambda).exp_m1())
}

/// KL divergence of binary randomized response.
pub fn kl_randomized_response(p: f64) -> Result<f64> {
    check_probability(p)?;
    Ok((2.0 * p - 1.0) * (p / (1.0 - p)).ln())
}

pub(crate) fn gaussian_rdp(sigma: f64, alpha: f64) -> f64 {
    alpha / (2.0 * sigma * sigma)
}

pub(crate) fn laplace_rdp(b: f64, alpha: f64) -> f64 {
    let lambda = 1.0 / b;
    if alpha.is_infinite() {
        return lambda;
    }
    let first = (alpha / (2.0 * alpha - 1.0)).ln() + (alpha - 1.0) * lambda;
    let second = ((alpha - 1.0) / (2.0 * alpha - 1.0)).ln() - alpha * lambda;
    (log_add_exp(first, second) / (alpha - 1.0)).clamp(0.0, lambda)
}

pub(crate) fn randomized_response_rdp(p: f64, alpha: f64) -> f64 {
    let p = p.max(1.0 - p);
    let log_p = p.ln();
    let log_q = (1.0 - p).ln();
    if alpha.is_infinite() {
        return log_p - log_q;
    }
    let first = alpha * log_p + (1.0 - alpha) * log_q;
    let second = alpha * log_q + (1.0 - alpha) * log_p;
    (log_add_exp(first, second) / (alpha - 1.0)).clamp(0.0, log_p - log_q)
}

pub(crate) fn pure_dp_rdp(epsilon: f64, alpha: f64) -> f64 {
    if epsilon == 0.0 {
        return 0.0;
    }
    if alpha.is_infinite() {
        return epsilon;
    }
    let log_num = log_add_exp(alpha * epsilon, -(alpha - 1.0) * epsilon);
    let log_den = epsilon + (-epsilon).exp().ln_1p();
    ((log_num - log_den) / (alpha - 1.0)).clamp(0.0, epsilon)
}

/// The RDP curve of one mechanism.
#[derive(Clone, Debug, PartialEq)]
pub struct RdpCurve {
    mechanism: Mechanism,
}

impl RdpCurve {
    /// Curve of a validated mechanism.
    pub fn new(mechanism: Mechanism) -> Result<Self> {
        mechanism.validate()?;
        Ok(Self { mechanism })
    }

    /// The mechanism this curve describes.
    pub fn mechanism(&self) -> &Mechanism {
        &self.mechanism
    }

    /// Divergence at order `alpha`.
    pub fn eval(&self, alpha: f64) -> Result<f64> {
        check_order(alpha)?;
        Ok(self.evaluate_unchecked(&[alpha])[0])
    }

    /// The `alpha -> inf` limit, i.e. the pure-DP epsilon (possibly infinite).
    pub fn pure_epsilon(&self) -> f64 {
        let (inner, rate) = self.mechanism.innermost();
        let base = eval_closed_form(inner, f64::INFINITY).unwrap_or(f64::INFINITY);
        if rate < 1.0 {
            (rate * base.exp_m1()).ln_1p()
        } else {
            base
        }
    }

    /// KL divergence (order one).
    pub fn kl(&self) -> Result<f64> {
        match &self.mechanism {
            Mechanism::Gaussian { sigma } => kl_gaussian(*sigma),
            Mechanism::Laplace { b } => kl_laplace(*b),
            Mechanism::RandomizedResponse { p } => kl_randomized_response(*p),
            Mechanism::Subsampled { .. } => Err(DpError::unsupported(
                "KL divergence of a subsampled mechanism",
            )),
        }
    }

    /// Evaluate the curve on a grid of orders.
    pub fn evaluate(&self, orders: &[f64]) -> Result<Vec<f64>> {
        for &alpha in orders {
            check_order(alpha)?;
        }
        Ok(self.evaluate_unchecked(orders))
    }

    pub(crate) fn evaluate_unchecked(&self, orders: &[f64]) -> Vec<f64> {
        let (inner, rate) = self.mechanism.innermost();
        if rate >= 1.0 {
            return map_orders(orders, |alpha| {
                eval_closed_form(inner, alpha).unwrap_or(f64::INFINITY)
            });
        }
        let table = SubsampledTable::new(inner, rate, max_order_ceil(orders));
        map_orders(orders, |alpha| table.rdp(alpha))
    }
}

fn eval_closed_form(mechanism: &Mechanism, alpha: f64) -> Option<f64> {
    match mechanism {
        Mechanism::Gaussian { sigma } => Some(gaussian_rdp(*sigma, alpha)),
        Mechanism::Laplace { b } => Some(laplace_rdp(*b, alpha)),
        Mechanism::RandomizedResponse { p } => Some(randomized_response_rdp(*p, alpha)),
        Mechanism::Subsampled { .. } => None,
    }
}

fn map_orders<F>(orders: &[f64], f: F) -> Vec<f64>
where
    F: Fn(f64) -> f64 + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        orders.par_iter().map(|&alpha| f(alpha)).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        orders.iter().map(|&alpha| f(alpha)).collect()
    }
}

/// RDP of a Poisson-subsampled closed-form mechanism at order `alpha`.
pub fn subsampled(base: &Mechanism, gamma: f64, alpha: f64) -> Result<f64> {
    validate_sampling_rate(gamma)?;
    check_order(alpha)?;
    RdpCurve::new(Mechanism::subsampled(base.clone(), gamma)?)?.eval(alpha)
}

/// Precomputed state for subsampled-RDP evaluation over a grid.
struct SubsampledTable<'a> {
    base: &'a Mechanism,
    rate: f64,
    log_fact: Vec<f64>,
    /// Base RDP at integer orders, indexed by order.
    base_rdp: Vec<f64>,
}

impl<'a> SubsampledTable<'a> {
    fn new(base: &'a Mechanism, rate: f64, max_alpha: usize) -> Self {
        let max_alpha = max_alpha.max(2);
        let log_fact = precompute_log_factorials(max_alpha);
        let base_rdp = match base {
            Mechanism::Gaussian { .. } => Vec::new(),
            _ => (0..=max_alpha)
                .map(|j| {
                    if j < 2 {
                        0.0
                    } else {
                        eval_closed_form(base, j as f64).unwrap_or(f64::INFINITY)
                    }
                })
                .collect(),
        };
        Self {
            base,
            rate,
            log_fact,
            base_rdp,
        }
    }

    fn rdp(&self, alpha: f64) -> f64 {
        if alpha.is_infinite() {
            return self.amplified_pure_limit();
        }
        if alpha > MAX_TABLE_ORDER as f64 {
            // Past the table: the divergence at any order is bounded by the
            // pure limit and by the unsampled mechanism.
            let unsampled = eval_closed_form(self.base, alpha).unwrap_or(f64::INFINITY);
            return unsampled.min(self.amplified_pure_limit()).max(0.0);
        }

        let bound = if is_integer(alpha) {
            self.log_moment(alpha.round() as usize) / (alpha - 1.0)
        } else {
            // log A_alpha is convex in alpha, so interpolating it between the
            // neighbouring integer orders is an upper bound.
            let floor = alpha.floor();
            let t = alpha - floor;
            let lower = self.log_moment(floor as usize);
            let upper = self.log_moment(floor as usize + 1);
            ((1.0 - t) * lower + t * upper) / (alpha - 1.0)
        };

        // Subsampling never increases the divergence of the base mechanism.
        let unsampled = eval_closed_form(self.base, alpha).unwrap_or(f64::INFINITY);
        bound.min(unsampled).max(0.0)
    }

    fn amplified_pure_limit(&self) -> f64 {
        let base = eval_closed_form(self.base, f64::INFINITY).unwrap_or(f64::INFINITY);
        (self.rate * base.exp_m1()).ln_1p()
    }

    /// `(alpha - 1) * rdp(alpha)` at an integer order.
    fn log_moment(&self, alpha: usize) -> f64 {
        if alpha <= 1 {
            return 0.0;
        }
        let alpha_f = alpha as f64;
        match self.base {
            Mechanism::Gaussian { sigma } => {
                log_a_term(self.rate, *sigma, alpha, &self.log_fact)
            }
            _ => {
                let unsampled = (alpha_f - 1.0) * self.base_rdp[alpha];
                self.log_moment_upper_bound(alpha).min(unsampled)
            }
        }
    }

    /// Zhu & Wang's general upper bound for Poisson subsampling.
    fn log_moment_upper_bound(&self, alpha: usize) -> f64 {
        let q = self.rate;
        let log_q = q.ln();
        let log_1mq = (-q).ln_1p();
        let alpha_f = alpha as f64;
        let log_fact = &self.log_fact;
        let log_binom = |j: usize| log_fact[alpha] - log_fact[j] - log_fact[alpha - j];

        let mut log_sum = scaled(alpha_f - 1.0, log_1mq) + (alpha_f * q - q + 1.0).ln();
        log_sum = log_add_exp(
            log_sum,
            log_binom(2) + 2.0 * log_q + scaled(alpha_f - 2.0, log_1mq) + self.base_rdp[2],
        );
        let log_three = 3.0f64.ln();
        for j in 3..=alpha {
            let j_f = j as f64;
            let term = log_three
                + log_binom(j)
                + j_f * log_q
                + scaled(alpha_f - j_f, log_1mq)
                + (j_f - 1.0) * self.base_rdp[j];
            log_sum = log_add_exp(log_sum, term);
        }
        log_sum
    }
}

/// `k * log_x` with `0 * -inf = 0`.
fn scaled(k: f64, log_x: f64) -> f64 {
    if k == 0.0 {
        0.0
    } else {
        k * log_x
    }
}

/// Largest integer order the subsampled tables are built for.
const MAX_TABLE_ORDER: usize = 4096;

/// Table size for `orders`, capped at [`MAX_TABLE_ORDER`].
pub(crate) fn max_order_ceil(orders: &[f64]) -> usize {
    orders
        .iter()
        .copied()
        .filter(|&a| a.is_finite() && a > 1.0)
        .map(|a| a.min(MAX_TABLE_ORDER as f64).ceil() as usize)
        .max()
        .unwrap_or(0)
}

fn precompute_log_factorials(max_alpha: usize) -> Vec<f64> {
    let mut log_fact = vec![0.0; max_alpha.saturating_add(2)];
    for i in 1..log_fact.len() {
        log_fact[i] = log_fact[i - 1] + (i as f64).ln();
    }
    log_fact
}

fn is_integer(x: f64) -> bool {
    (x - x.round()).abs() < 1e-12
}

/// Compute log(A_alpha) of the subsampled Gaussian for integer alpha.
fn log_a_term(q: f64, sigma: f64, alpha: usize, log_fact: &[f64]) -> f64 {
    let log_q = q.ln();
    let log_1mq = (-q).ln_1p();
    let sigma_sq = sigma * sigma;
    let alpha_f = alpha as f64;

    let mut log_sum = f64::NEG_INFINITY;
    for j in 0..=alpha {
        let j_f = j as f64;
        let log_binom = log_fact[alpha] - log_fact[j] - log_fact[alpha - j];
        let log_prob = j_f * log_q + scaled(alpha_f - j_f, log_1mq);
        let log_exp = j_f * (j_f - 1.0) / (2.0 * sigma_sq);
        log_sum = log_add_exp(log_sum, log_binom + log_prob + log_exp);
    }
    log_sum
}

/// Numerically stable log(exp(a) + exp(b)).
pub(crate) fn log_add_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    if a > b {
        a + (b - a).exp().ln_1p()
    } else {
        b + (a - b).exp().ln_1p()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn gaussian_closed_form() {
        let v = gaussian(2.0, 3.0).expect("rdp");
        assert!((v - 3.0 / 8.0).abs() < 1e-15);
        assert_eq!(gaussian(2.0, f64::INFINITY).expect("rdp"), f64::INFINITY);
    }

    #[test]
    fn order_one_is_rejected() {
        assert!(gaussian(1.0, 1.0).is_err());
        assert!(laplace(1.0, 0.5).is_err());
        assert!(laplace(1.0, f64::NAN).is_err());
        assert!(kl_laplace(1.0).is_ok());
    }

    #[test]
    fn invalid_scales_are_rejected() {
        assert!(gaussian(0.0, 2.0).is_err());
        assert!(laplace(-1.0, 2.0).is_err());
        assert!(randomized_response(1.0, 2.0).is_err());
    }

    #[test]
    fn laplace_limits() {
        let b = 2.0;
        assert!((laplace(b, f64::INFINITY).expect("rdp") - 0.5).abs() < 1e-15);
        let near_one = laplace(b, 1.0 + 1e-7).expect("rdp");
        let kl = kl_laplace(b).expect("kl");
        assert!((near_one - kl).abs() < 1e-5);
        let large = laplace(b, 1e6).expect("rdp");
        assert!(large <= 0.5 && large > 0.49);
    }

    #[test]
    fn laplace_matches_explicit_formula() {
        let (b, a): (f64, f64) = (1.5, 4.0);
        let expected = ((a / (2.0 * a - 1.0)) * ((a - 1.0) / b).exp()
            + ((a - 1.0) / (2.0 * a - 1.0)) * (-a / b).exp())
        .ln()
            / (a - 1.0);
        assert!((laplace(b, a).expect("rdp") - expected).abs() < 1e-12);
    }

    #[test]
    fn pure_dp_matches_randomized_response() {
        let eps: f64 = 0.7;
        let p = eps.exp() / (1.0 + eps.exp());
        for &alpha in &[1.5, 2.0, 10.0, 100.0, f64::INFINITY] {
            let a = pure_dp(eps, alpha).expect("pure");
            let b = randomized_response(p, alpha).expect("rr");
            assert!((a - b).abs() < 1e-9, "alpha={alpha}: {a} vs {b}");
        }
        assert_eq!(pure_dp(0.0, 3.0).expect("pure"), 0.0);
    }

    #[test]
    fn randomized_response_kl() {
        let eps: f64 = 1.0;
        let p = eps.exp() / (1.0 + eps.exp());
        let kl = kl_randomized_response(p).expect("kl");
        assert!((kl - eps * (eps / 2.0).tanh()).abs() < 1e-12);
    }

    #[test]
    fn subsampled_gaussian_full_rate_matches_base() {
        let curve = RdpCurve::new(Mechanism::Gaussian { sigma: 1.3 }).expect("curve");
        let v = curve.eval(7.0).expect("eval");
        assert!((v - 7.0 / (2.0 * 1.69)).abs() < 1e-12);
    }

    #[test]
    fn subsampling_reduces_divergence() {
        for base in [Mechanism::Gaussian { sigma: 2.0 }, Mechanism::Laplace { b: 2.0 }] {
            let full = RdpCurve::new(base.clone()).expect("curve");
            let sub = RdpCurve::new(Mechanism::subsampled(base, 0.05).expect("sub"))
                .expect("curve");
            for &alpha in &[1.5, 2.0, 4.5, 16.0, 64.0] {
                let f = full.eval(alpha).expect("full");
                let s = sub.eval(alpha).expect("sub");
                assert!(s <= f + 1e-12, "alpha={alpha}: {s} > {f}");
                assert!(s >= 0.0);
            }
        }
    }

    #[test]
    fn subsampled_gaussian_order_two_closed_form() {
        // A_2 = 1 + q^2 (e^{1/sigma^2} - 1) for the subsampled Gaussian.
        let (sigma, q): (f64, f64) = (1.5, 0.1);
        let curve =
            RdpCurve::new(Mechanism::subsampled(Mechanism::Gaussian { sigma }, q).expect("sub"))
                .expect("curve");
        let expected = (q * q * (1.0 / (sigma * sigma)).exp_m1()).ln_1p();
        assert!((curve.eval(2.0).expect("eval") - expected).abs() < 1e-12);
    }

    #[test]
    fn subsampled_pure_limit_uses_amplification() {
        let curve = RdpCurve::new(
            Mechanism::subsampled(Mechanism::Laplace { b: 1.0 }, 0.01).expect("sub"),
        )
        .expect("curve");
        let expected = (0.01 * 1.0f64.exp_m1()).ln_1p();
        assert!((curve.pure_epsilon() - expected).abs() < 1e-12);
        let gaussian = RdpCurve::new(Mechanism::Gaussian { sigma: 1.0 }).expect("curve");
        assert_eq!(gaussian.pure_epsilon(), f64::INFINITY);
    }

    #[test]
    fn nested_subsampling_flattens() {
        let nested = Mechanism::subsampled(
            Mechanism::subsampled(Mechanism::Gaussian { sigma: 1.0 }, 0.5).expect("inner"),
            0.2,
        )
        .expect("outer");
        let flat = Mechanism::subsampled(Mechanism::Gaussian { sigma: 1.0 }, 0.1).expect("flat");
        let a = RdpCurve::new(nested).expect("curve").eval(8.0).expect("eval");
        let b = RdpCurve::new(flat).expect("curve").eval(8.0).expect("eval");
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn huge_orders_skip_the_table() {
        let base = Mechanism::Gaussian { sigma: 1.0 };
        let curve = RdpCurve::new(Mechanism::subsampled(base.clone(), 0.5).expect("sub"))
            .expect("curve");
        for alpha in [1e8, 1e300] {
            let v = curve.eval(alpha).expect("eval");
            assert!((v - alpha / 2.0).abs() <= 1e-12 * alpha, "alpha={alpha}: {v}");
        }

        let laplace = Mechanism::Laplace { b: 2.0 };
        let pure = (0.5 * 0.5f64.exp_m1()).ln_1p();
        for alpha in [1e8, 1e300] {
            let v = subsampled(&laplace, 0.5, alpha).expect("subsampled");
            assert!(v <= pure + 1e-15 && v >= 0.0, "alpha={alpha}: {v}");
        }
        let grid = curve.evaluate(&[2.0, 4096.5, 1e300]).expect("grid");
        assert!(grid.iter().all(|v| v.is_finite()));
        assert_eq!(max_order_ceil(&[2.0, 1e300]), MAX_TABLE_ORDER);
    }

    #[test]
    fn subsampled_entry_point_matches_curve() {
        let base = Mechanism::Laplace { b: 1.0 };
        let curve = RdpCurve::new(Mechanism::subsampled(base.clone(), 0.1).expect("sub"))
            .expect("curve");
        let direct = subsampled(&base, 0.1, 6.0).expect("subsampled");
        assert_eq!(direct, curve.eval(6.0).expect("eval"));
        assert!(subsampled(&base, 0.0, 6.0).unwrap_err().is_validation());
    }

    #[test]
    fn kl_of_subsampled_is_unsupported() {
        let curve = RdpCurve::new(
            Mechanism::subsampled(Mechanism::Gaussian { sigma: 1.0 }, 0.5).expect("sub"),
        )
        .expect("curve");
        assert!(matches!(curve.kl(), Err(DpError::UnsupportedFeature { .. })));
    }

    proptest! {
        #[test]
        fn laplace_decreases_in_b(
            b_a in 0.1f64..50.0,
            b_b in 0.1f64..50.0,
            alpha in 1.01f64..512.0,
        ) {
            let lo = b_a.min(b_b);
            let hi = b_a.max(b_b);
            let d_lo = laplace(lo, alpha).unwrap();
            let d_hi = laplace(hi, alpha).unwrap();
            prop_assert!(d_hi <= d_lo + 1e-12);
        }

        #[test]
        fn laplace_is_non_decreasing_in_order(
            b in 0.1f64..50.0,
            a1 in 1.01f64..256.0,
            a2 in 1.01f64..256.0,
        ) {
            let lo = a1.min(a2);
            let hi = a1.max(a2);
            prop_assert!(laplace(b, lo).unwrap() <= laplace(b, hi).unwrap() + 1e-12);
        }
    }
}
