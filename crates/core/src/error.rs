//! Error types for privacy accounting and calibration.

/// Errors that can occur during accounting or calibration.
#[derive(Debug, thiserror::Error)]
pub enum DpError {
    /// Invalid parameter provided.
    #[error("invalid parameter: {msg}")]
    InvalidParameters {
        /// Human-readable error description.
        msg: String,
    },

    /// A closed-form mapping was asked for a value outside its domain.
    #[error("domain error: {msg}")]
    Domain {
        /// Human-readable error description.
        msg: String,
    },

    /// A bracket or bisection search ran out of iterations.
    #[error("search did not converge: {msg} (last estimate {last_estimate:.6e})")]
    NonConvergence {
        /// Human-readable error description.
        msg: String,
        /// Best estimate available when the search stopped.
        last_estimate: f64,
    },

    /// Numerical computation error.
    #[error("numerical error: {msg}")]
    NumericalError {
        /// Human-readable error description.
        msg: String,
    },

    /// Configuration error.
    #[error("configuration error: {msg}")]
    ConfigError {
        /// Human-readable error description.
        msg: String,
    },

    /// Unsupported feature or configuration.
    #[error("unsupported feature: {msg}")]
    UnsupportedFeature {
        /// Human-readable error description.
        msg: String,
    },
}

/// Result type for DP operations.
pub type Result<T> = std::result::Result<T, DpError>;

impl DpError {
    /// Create an invalid parameter error.
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        Self::InvalidParameters { msg: msg.into() }
    }

    /// Create a domain error.
    pub fn domain<S: Into<String>>(msg: S) -> Self {
        Self::Domain { msg: msg.into() }
    }

    /// Create a non-convergence error carrying the last estimate.
    pub fn non_convergence<S: Into<String>>(msg: S, last_estimate: f64) -> Self {
        Self::NonConvergence {
            msg: msg.into(),
            last_estimate,
        }
    }

    /// Create a numerical error.
    pub fn numerical<S: Into<String>>(msg: S) -> Self {
        Self::NumericalError { msg: msg.into() }
    }

    /// Create a configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError { msg: msg.into() }
    }

    /// Create an unsupported feature error.
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Self::UnsupportedFeature { msg: msg.into() }
    }

    /// Whether this error came from validating caller input.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidParameters { .. })
    }

    /// Last estimate carried by a non-convergence error.
    pub fn last_estimate(&self) -> Option<f64> {
        match self {
            Self::NonConvergence { last_estimate, .. } => Some(*last_estimate),
            _ => None,
        }
    }
}
