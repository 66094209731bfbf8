//! Privacy accounting and noise calibration.
//!
//! Rényi divergences of canonical mechanisms, amplification by subsampling,
//! Gaussian calibration, a composition accountant, and a noise calibrator
//! that ties them together.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod accountant;
pub mod accountants;
pub mod calibrate;
pub mod event;
pub mod gaussian;
pub mod rdp;
pub mod search;
pub mod subsampling;

pub use accountant::{default_orders, CompositionAccountant, RecordedEvent};
pub use accountants::{AccountantConfig, RdpAccountantConfig};
pub use calibrate::{
    calibrate, calibrate_event_parameter, laplace, CalibrationConfig, CalibrationMode,
    CalibrationResult, Calibrator, GaussianCalibrator, GaussianStrategy, LaplaceCalibrator,
    NoiseCalibrator,
};
pub use event::PrivacyEvent;
pub use gaussian::{
    analytical_gaussian, classical_gaussian, gaussian_delta, rdp_gaussian, rdp_gaussian_epsilon,
};
pub use rdp::RdpCurve;
pub use search::{Probe, SearchConfig, SearchOutcome};
pub use subsampling::{subsample_forward, subsample_inverse};

/// Common imports for privacy accounting.
pub mod prelude {
    pub use crate::{
        analytical_gaussian, calibrate, classical_gaussian, laplace, rdp_gaussian,
        subsample_forward, subsample_inverse, AccountantConfig, CalibrationConfig,
        CalibrationMode, CalibrationResult, Calibrator, CompositionAccountant, GaussianStrategy,
        NoiseCalibrator, PrivacyEvent, RdpAccountantConfig, RdpCurve, SearchConfig,
    };
}
