//! Core types for differential privacy noise calibration.
//!
//! This crate provides the shared vocabulary of the workspace: privacy
//! budgets, mechanism descriptions, and the error type.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod budget;
pub mod error;
pub mod mechanism;

pub use budget::{validate_delta, validate_epsilon, validate_sampling_rate, PrivacyBudget};
pub use error::{DpError, Result};
pub use mechanism::{Mechanism, MechanismKind};

/// Common imports for downstream users.
pub mod prelude {
    pub use crate::{DpError, Mechanism, MechanismKind, PrivacyBudget, Result};
}
