//! Rényi composition accountant.
//!
//! The accountant owns a fixed grid of Rényi orders and sums per-order
//! divergences of everything recorded. A separate pure-DP slot tracks the
//! `alpha = inf` sum, and the `delta` of raw approximate-DP records is spent
//! additively before the RDP-to-`(epsilon, delta)` conversion.

use privcal_core::{validate_delta, DpError, Result};

use crate::rdp::{pure_dp_rdp, RdpCurve};

/// One entry of the accountant's history.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordedEvent {
    /// A raw `(epsilon, delta)` guarantee.
    EpsilonDelta {
        /// Local epsilon.
        epsilon: f64,
        /// Local delta.
        delta: f64,
    },
    /// An RDP curve composed `count` times.
    Curve {
        /// The composed curve.
        curve: RdpCurve,
        /// Number of compositions.
        count: u64,
    },
}

/// Composition accountant over a fixed order grid.
#[derive(Clone, Debug, PartialEq)]
pub struct CompositionAccountant {
    orders: Vec<f64>,
    rdp: Vec<f64>,
    pure_epsilon: f64,
    delta_spent: f64,
    events: Vec<RecordedEvent>,
}

impl Default for CompositionAccountant {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositionAccountant {
    /// Create an accountant with default Rényi orders.
    pub fn new() -> Self {
        Self::with_orders(default_orders())
    }

    /// Create an accountant with custom orders.
    ///
    /// Orders are filtered to finite values above one, sorted and
    /// deduplicated. An empty result falls back to [`default_orders`].
    pub fn with_orders(orders: Vec<f64>) -> Self {
        let mut orders = normalize_orders(orders);
        if orders.is_empty() {
            orders = default_orders();
        }
        let rdp = vec![0.0; orders.len()];
        Self {
            orders,
            rdp,
            pure_epsilon: 0.0,
            delta_spent: 0.0,
            events: Vec::new(),
        }
    }

    /// Record a raw `(epsilon, delta)` guarantee.
    ///
    /// `epsilon` contributes its tight pure-DP RDP bound at every order and
    /// `delta` is spent additively.
    pub fn record(&mut self, epsilon: f64, delta: f64) -> Result<()> {
        if !epsilon.is_finite() || epsilon < 0.0 {
            return Err(DpError::invalid(format!(
                "local epsilon must be non-negative and finite, got {epsilon}"
            )));
        }
        validate_delta(delta)?;

        for (acc, &alpha) in self.rdp.iter_mut().zip(self.orders.iter()) {
            *acc += pure_dp_rdp(epsilon, alpha);
        }
        self.pure_epsilon += epsilon;
        self.delta_spent += delta;
        self.events.push(RecordedEvent::EpsilonDelta { epsilon, delta });
        Ok(())
    }

    /// Record one application of a mechanism described by its RDP curve.
    pub fn record_curve(&mut self, curve: &RdpCurve) {
        self.record_curve_n(curve, 1);
    }

    /// Record `count` identical applications of a mechanism.
    pub fn record_curve_n(&mut self, curve: &RdpCurve, count: u64) {
        if count == 0 {
            return;
        }
        let profile = CurveProfile::new(curve, &self.orders);
        self.accumulate(&profile, count);
    }

    /// Add `count` copies of a precomputed grid profile.
    pub(crate) fn accumulate(&mut self, profile: &CurveProfile, count: u64) {
        let n = count as f64;
        for (acc, &value) in self.rdp.iter_mut().zip(profile.values.iter()) {
            *acc = add_scaled(*acc, value, n);
        }
        self.pure_epsilon = add_scaled(self.pure_epsilon, profile.pure_epsilon, n);

        if let Some(RecordedEvent::Curve { curve, count: total }) = self.events.last_mut() {
            if *curve == profile.curve {
                *total = total.saturating_add(count);
                return;
            }
        }
        self.events.push(RecordedEvent::Curve {
            curve: profile.curve.clone(),
            count,
        });
    }

    /// Epsilon of everything recorded so far at `target_delta`.
    ///
    /// Returns `+inf` when no finite guarantee exists, including targets
    /// outside `[0, 1)`.
    pub fn get_epsilon(&self, target_delta: f64) -> f64 {
        self.get_epsilon_and_order(target_delta).0
    }

    /// Like [`get_epsilon`](Self::get_epsilon), also reporting the optimal
    /// order. `None` means the pure-DP slot was tightest.
    pub fn get_epsilon_and_order(&self, target_delta: f64) -> (f64, Option<f64>) {
        if !target_delta.is_finite() || !(0.0..1.0).contains(&target_delta) {
            return (f64::INFINITY, None);
        }
        let remaining = target_delta - self.delta_spent;
        if remaining <= 0.0 {
            return (self.pure_epsilon, None);
        }

        let log_delta_inv = -remaining.ln();
        let mut best = (self.pure_epsilon, None);
        for (&alpha, &rdp) in self.orders.iter().zip(self.rdp.iter()) {
            if !rdp.is_finite() {
                continue;
            }
            let eps = rdp + log_delta_inv / (alpha - 1.0);
            if eps < best.0 {
                best = (eps, Some(alpha));
            }
        }
        best
    }

    /// Combine two accountants built on the same order grid.
    pub fn merge(mut self, other: Self) -> Result<Self> {
        if self.orders != other.orders {
            return Err(DpError::invalid(
                "cannot merge accountants with different order grids",
            ));
        }
        for (acc, value) in self.rdp.iter_mut().zip(other.rdp) {
            *acc += value;
        }
        self.pure_epsilon += other.pure_epsilon;
        self.delta_spent += other.delta_spent;
        self.events.extend(other.events);
        Ok(self)
    }

    /// The order grid.
    pub fn orders(&self) -> &[f64] {
        &self.orders
    }

    /// Accumulated divergence per order.
    pub fn accumulated(&self) -> &[f64] {
        &self.rdp
    }

    /// Accumulated pure-DP epsilon (`alpha = inf`).
    pub fn pure_epsilon(&self) -> f64 {
        self.pure_epsilon
    }

    /// Delta spent by raw `(epsilon, delta)` records.
    pub fn delta_spent(&self) -> f64 {
        self.delta_spent
    }

    /// Recorded history, oldest first.
    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    /// Reset the accountant, keeping its order grid.
    pub fn reset(&mut self) {
        self.rdp.fill(0.0);
        self.pure_epsilon = 0.0;
        self.delta_spent = 0.0;
        self.events.clear();
    }
}

/// Grid values of one curve, computed once and composed many times.
#[derive(Clone, Debug)]
pub(crate) struct CurveProfile {
    curve: RdpCurve,
    values: Vec<f64>,
    pure_epsilon: f64,
}

impl CurveProfile {
    pub(crate) fn new(curve: &RdpCurve, orders: &[f64]) -> Self {
        Self {
            curve: curve.clone(),
            values: curve.evaluate_unchecked(orders),
            pure_epsilon: curve.pure_epsilon(),
        }
    }
}

// 0 * inf stays 0 so an unused slot does not poison the sum.
fn add_scaled(acc: f64, value: f64, n: f64) -> f64 {
    if value == 0.0 {
        acc
    } else {
        acc + value * n
    }
}

fn normalize_orders(orders: Vec<f64>) -> Vec<f64> {
    let mut orders: Vec<f64> = orders
        .into_iter()
        .filter(|&a| a.is_finite() && a > 1.0)
        .collect();
    orders.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    orders.dedup_by(|a, b| (*a - *b).abs() < 1e-12);
    orders
}

/// Default Rényi orders.
///
/// - `linspace(1.01, 8, 50)`
/// - integers `8..64`
/// - `linspace(65, 512, 10)`, rounded
/// - `768, 1024, 2048` for long pure-leaning compositions
pub fn default_orders() -> Vec<f64> {
    let mut orders = Vec::new();

    orders.extend(linspace(1.01, 8.0, 50));
    for a in 8..64 {
        orders.push(a as f64);
    }
    for a in linspace(65.0, 512.0, 10) {
        orders.push(a.round());
    }
    orders.extend([768.0, 1024.0, 2048.0]);

    orders
}

pub(crate) fn has_valid_orders(orders: &[f64]) -> bool {
    !normalize_orders(orders.to_vec()).is_empty()
}

fn linspace(start: f64, end: f64, num: usize) -> Vec<f64> {
    if num == 0 {
        return Vec::new();
    }
    if num == 1 {
        return vec![start];
    }
    let step = (end - start) / (num as f64 - 1.0);
    (0..num).map(|i| start + step * i as f64).collect()
}
