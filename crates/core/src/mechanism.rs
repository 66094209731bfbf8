//! Randomized mechanisms described by their noise parameters.
//!
//! A [`Mechanism`] only describes the noise distribution; drawing samples is
//! left to the host environment.

use std::fmt;
use std::str::FromStr;

use crate::budget::validate_sampling_rate;
use crate::error::{DpError, Result};

/// A randomized mechanism with unit sensitivity.
#[derive(Clone, Debug, PartialEq)]
pub enum Mechanism {
    /// Gaussian noise with standard deviation `sigma` (unit L2 sensitivity).
    Gaussian {
        /// Noise standard deviation.
        sigma: f64,
    },
    /// Laplace noise with scale `b` (unit L1 sensitivity).
    Laplace {
        /// Noise scale.
        b: f64,
    },
    /// Binary randomized response reporting the true bit with probability `p`.
    RandomizedResponse {
        /// Probability of reporting the true value.
        p: f64,
    },
    /// Poisson subsampling at rate `gamma` applied to an inner mechanism.
    Subsampled {
        /// The inner mechanism.
        base: Box<Mechanism>,
        /// Subsampling rate.
        gamma: f64,
    },
}

impl Mechanism {
    /// Gaussian mechanism with noise `sigma > 0`.
    pub fn gaussian(sigma: f64) -> Result<Self> {
        positive("sigma", sigma)?;
        Ok(Self::Gaussian { sigma })
    }

    /// Laplace mechanism with scale `b > 0`.
    pub fn laplace(b: f64) -> Result<Self> {
        positive("b", b)?;
        Ok(Self::Laplace { b })
    }

    /// Randomized response with truth probability `p` in `(0, 1)`.
    pub fn randomized_response(p: f64) -> Result<Self> {
        if !p.is_finite() || p <= 0.0 || p >= 1.0 {
            return Err(DpError::invalid(format!(
                "randomized response probability must be in (0, 1), got {p}"
            )));
        }
        Ok(Self::RandomizedResponse { p })
    }

    /// Subsample `base` at rate `gamma` in `(0, 1]`.
    pub fn subsampled(base: Mechanism, gamma: f64) -> Result<Self> {
        validate_sampling_rate(gamma)?;
        base.validate()?;
        Ok(Self::Subsampled {
            base: Box::new(base),
            gamma,
        })
    }

    /// Noise mechanism of `kind` with the given noise parameter.
    pub fn of_kind(kind: MechanismKind, noise: f64) -> Result<Self> {
        match kind {
            MechanismKind::Gaussian => Self::gaussian(noise),
            MechanismKind::Laplace => Self::laplace(noise),
        }
    }

    /// Validate parameters of a mechanism built by hand.
    pub fn validate(&self) -> Result<()> {
        match self {
            Mechanism::Gaussian { sigma } => positive("sigma", *sigma),
            Mechanism::Laplace { b } => positive("b", *b),
            Mechanism::RandomizedResponse { p } => Self::randomized_response(*p).map(|_| ()),
            Mechanism::Subsampled { base, gamma } => {
                validate_sampling_rate(*gamma)?;
                base.validate()
            }
        }
    }

    /// Strip subsampling layers, returning the innermost mechanism and the
    /// combined sampling rate.
    pub fn innermost(&self) -> (&Mechanism, f64) {
        match self {
            Mechanism::Subsampled { base, gamma } => {
                let (inner, rate) = base.innermost();
                (inner, rate * gamma)
            }
            other => (other, 1.0),
        }
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(DpError::invalid(format!(
            "{name} must be positive and finite, got {value}"
        )));
    }
    Ok(())
}

/// Mechanism families the noise calibrator can calibrate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MechanismKind {
    /// Gaussian noise, calibrated through `sigma`.
    Gaussian,
    /// Laplace noise, calibrated through `b`.
    Laplace,
}

impl MechanismKind {
    /// Name of the calibrated noise parameter.
    pub fn parameter_name(&self) -> &'static str {
        match self {
            MechanismKind::Gaussian => "sigma",
            MechanismKind::Laplace => "b",
        }
    }
}

impl fmt::Display for MechanismKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MechanismKind::Gaussian => f.write_str("gaussian"),
            MechanismKind::Laplace => f.write_str("laplace"),
        }
    }
}

impl FromStr for MechanismKind {
    type Err = DpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gaussian" => Ok(MechanismKind::Gaussian),
            "laplace" => Ok(MechanismKind::Laplace),
            other => Err(DpError::invalid(format!(
                "unsupported mechanism kind: {other}"
            ))),
        }
    }
}
