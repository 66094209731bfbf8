//! Composable privacy events.
//!
//! A [`PrivacyEvent`] describes what was released; evaluating it builds a
//! fresh [`CompositionAccountant`] and records the event into it.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use privcal_core::{validate_delta, validate_sampling_rate, Mechanism, Result};

use crate::accountant::{default_orders, CompositionAccountant};
use crate::rdp::RdpCurve;

/// A composable description of differentially private releases.
#[derive(Clone, Debug, PartialEq)]
pub enum PrivacyEvent {
    /// A release with a known `(epsilon, delta)` guarantee.
    EpsilonDelta {
        /// Local epsilon.
        epsilon: f64,
        /// Local delta.
        delta: f64,
    },
    /// One application of a mechanism.
    Mechanism(Mechanism),
    /// An event composed with itself `count` times.
    SelfComposed {
        /// The inner event.
        event: Box<PrivacyEvent>,
        /// Number of compositions.
        count: u64,
    },
    /// Independent events composed together.
    Composed(Vec<PrivacyEvent>),
}

impl PrivacyEvent {
    /// `rounds` applications of a Gaussian mechanism on a `sampling_rate`
    /// subsample.
    pub fn gaussian_rounds(sigma: f64, rounds: u64, sampling_rate: f64) -> Result<Self> {
        Self::rounds_of(Mechanism::gaussian(sigma)?, rounds, sampling_rate)
    }

    /// `rounds` applications of a Laplace mechanism on a `sampling_rate`
    /// subsample.
    pub fn laplace_rounds(b: f64, rounds: u64, sampling_rate: f64) -> Result<Self> {
        Self::rounds_of(Mechanism::laplace(b)?, rounds, sampling_rate)
    }

    fn rounds_of(base: Mechanism, rounds: u64, sampling_rate: f64) -> Result<Self> {
        validate_sampling_rate(sampling_rate)?;
        let mechanism = if sampling_rate < 1.0 {
            Mechanism::subsampled(base, sampling_rate)?
        } else {
            base
        };
        Ok(PrivacyEvent::SelfComposed {
            event: Box::new(PrivacyEvent::Mechanism(mechanism)),
            count: rounds,
        })
    }

    /// Epsilon at `delta` using an accountant on the default order grid.
    pub fn epsilon(&self, delta: f64) -> Result<f64> {
        validate_delta(delta)?;
        Ok(self.accountant(&default_orders())?.get_epsilon(delta))
    }

    /// Record this event into a fresh accountant over `orders`.
    pub fn accountant(&self, orders: &[f64]) -> Result<CompositionAccountant> {
        let mut acc = CompositionAccountant::with_orders(orders.to_vec());
        self.apply(&mut acc)?;
        Ok(acc)
    }

    /// Record this event into `acc`.
    pub fn apply(&self, acc: &mut CompositionAccountant) -> Result<()> {
        match self {
            PrivacyEvent::EpsilonDelta { epsilon, delta } => acc.record(*epsilon, *delta),
            PrivacyEvent::Mechanism(mechanism) => {
                acc.record_curve(&RdpCurve::new(mechanism.clone())?);
                Ok(())
            }
            PrivacyEvent::SelfComposed { event, count } => match event.as_ref() {
                PrivacyEvent::Mechanism(mechanism) => {
                    acc.record_curve_n(&RdpCurve::new(mechanism.clone())?, *count);
                    Ok(())
                }
                inner => {
                    for _ in 0..*count {
                        inner.apply(acc)?;
                    }
                    Ok(())
                }
            },
            PrivacyEvent::Composed(events) => {
                let composed = compose_all(events, acc.orders())?;
                let merged = std::mem::take(acc).merge(composed)?;
                *acc = merged;
                Ok(())
            }
        }
    }
}

#[cfg(feature = "parallel")]
fn compose_all(events: &[PrivacyEvent], orders: &[f64]) -> Result<CompositionAccountant> {
    events
        .par_iter()
        .map(|event| event.accountant(orders))
        .try_reduce(
            || CompositionAccountant::with_orders(orders.to_vec()),
            |a, b| a.merge(b),
        )
}

#[cfg(not(feature = "parallel"))]
fn compose_all(events: &[PrivacyEvent], orders: &[f64]) -> Result<CompositionAccountant> {
    events.iter().try_fold(
        CompositionAccountant::with_orders(orders.to_vec()),
        |acc, event| acc.merge(event.accountant(orders)?),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn epsilon_increases_with_rounds() {
        let e1 = PrivacyEvent::gaussian_rounds(2.0, 10, 0.1)
            .and_then(|e| e.epsilon(1e-6))
            .expect("epsilon");
        let e2 = PrivacyEvent::gaussian_rounds(2.0, 20, 0.1)
            .and_then(|e| e.epsilon(1e-6))
            .expect("epsilon");
        assert!(e2 >= e1);
    }

    #[test]
    fn self_composed_matches_accountant() {
        let event = PrivacyEvent::gaussian_rounds(1.5, 25, 0.2).expect("event");
        let eps = event.epsilon(1e-6).expect("epsilon");

        let curve = RdpCurve::new(
            Mechanism::subsampled(Mechanism::gaussian(1.5).expect("gaussian"), 0.2)
                .expect("subsampled"),
        )
        .expect("curve");
        let mut acc = CompositionAccountant::new();
        acc.record_curve_n(&curve, 25);
        assert!((eps - acc.get_epsilon(1e-6)).abs() <= 1e-9);
    }

    #[test]
    fn pure_events_compose_additively_at_zero_delta() {
        let event = PrivacyEvent::Composed(vec![
            PrivacyEvent::EpsilonDelta {
                epsilon: 0.25,
                delta: 0.0,
            },
            PrivacyEvent::SelfComposed {
                event: Box::new(PrivacyEvent::EpsilonDelta {
                    epsilon: 0.5,
                    delta: 0.0,
                }),
                count: 3,
            },
        ]);
        assert!((event.epsilon(0.0).expect("epsilon") - 1.75).abs() < 1e-12);
    }

    #[test]
    fn laplace_rounds_at_zero_delta_is_linear() {
        let event = PrivacyEvent::laplace_rounds(2.0, 8, 1.0).expect("event");
        assert!((event.epsilon(0.0).expect("epsilon") - 4.0).abs() < 1e-12);
    }

    #[test]
    fn invalid_inner_mechanism_is_rejected() {
        assert!(PrivacyEvent::gaussian_rounds(0.0, 1, 1.0).is_err());
        assert!(PrivacyEvent::laplace_rounds(1.0, 1, 1.5).is_err());
        let event = PrivacyEvent::Mechanism(Mechanism::Gaussian { sigma: -1.0 });
        assert!(event.epsilon(1e-5).unwrap_err().is_validation());
    }

    proptest! {
        #[test]
        fn more_noise_reduces_epsilon(
            noise_a in 0.5f64..10.0,
            noise_b in 0.5f64..10.0,
            rounds in 1u64..200,
            rate in 0.01f64..0.9,
        ) {
            let low = noise_a.min(noise_b);
            let high = noise_a.max(noise_b);
            let eps_low = PrivacyEvent::gaussian_rounds(low, rounds, rate).unwrap().epsilon(1e-6).unwrap();
            let eps_high = PrivacyEvent::gaussian_rounds(high, rounds, rate).unwrap().epsilon(1e-6).unwrap();
            prop_assert!(eps_high <= eps_low + 1e-9);
        }
    }
}
