//! Facade crate re-exporting stable APIs.
//!
//! ```
//! let res = privcal::calibrate("gaussian", 1.0, 1e-5, 1, 1.0).unwrap();
//! assert!(res.noise_parameter() > 0.0);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use privcal_accounting as accounting;
pub use privcal_core as core;

pub use accounting::{
    analytical_gaussian, calibrate, calibrate_event_parameter, classical_gaussian,
    default_orders, gaussian_delta, laplace, rdp_gaussian, rdp_gaussian_epsilon,
    subsample_forward, subsample_inverse, AccountantConfig, CalibrationConfig, CalibrationMode,
    CalibrationResult, Calibrator, CompositionAccountant, GaussianCalibrator, GaussianStrategy,
    LaplaceCalibrator, NoiseCalibrator, PrivacyEvent, RdpAccountantConfig, RdpCurve,
    RecordedEvent, SearchConfig,
};
pub use core::{DpError, Mechanism, MechanismKind, PrivacyBudget, Result};

/// Convenience prelude covering calibration and accounting.
pub mod prelude {
    pub use crate::accounting::prelude::*;
    pub use crate::core::prelude::*;
}
