//! Noise calibration.
//!
//! Finds the smallest noise parameter of a mechanism whose guarantee meets a
//! target `(epsilon, delta)`, for a single release, several rounds, a
//! subsample, or rounds over subsamples.

use std::fmt;

use privcal_core::{
    validate_delta, validate_epsilon, validate_sampling_rate, DpError, Mechanism, MechanismKind,
    PrivacyBudget, Result,
};

use crate::accountant::CurveProfile;
use crate::accountants::{AccountantConfig, RdpAccountantConfig};
use crate::event::PrivacyEvent;
use crate::gaussian::{analytical_gaussian_sigma, classical_gaussian_sigma, rdp_gaussian_sigma};
use crate::rdp::RdpCurve;
use crate::search::{search_decreasing, Probe, SearchConfig};
use crate::subsampling::{amplify, subsample_inverse};

/// Calibrated noise parameter with the guarantee it achieves.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CalibrationResult {
    /// Gaussian noise.
    Gaussian {
        /// Noise standard deviation.
        sigma: f64,
        /// Achieved guarantee.
        achieved: PrivacyBudget,
    },
    /// Laplace noise.
    Laplace {
        /// Noise scale.
        b: f64,
        /// Achieved guarantee.
        achieved: PrivacyBudget,
    },
}

impl CalibrationResult {
    fn new(kind: MechanismKind, noise: f64, achieved: PrivacyBudget) -> Self {
        match kind {
            MechanismKind::Gaussian => Self::Gaussian {
                sigma: noise,
                achieved,
            },
            MechanismKind::Laplace => Self::Laplace { b: noise, achieved },
        }
    }

    /// Mechanism family of the result.
    pub fn kind(&self) -> MechanismKind {
        match self {
            Self::Gaussian { .. } => MechanismKind::Gaussian,
            Self::Laplace { .. } => MechanismKind::Laplace,
        }
    }

    /// `sigma` or `b`.
    pub fn noise_parameter(&self) -> f64 {
        match *self {
            Self::Gaussian { sigma, .. } => sigma,
            Self::Laplace { b, .. } => b,
        }
    }

    /// Achieved guarantee.
    pub fn achieved(&self) -> PrivacyBudget {
        match *self {
            Self::Gaussian { achieved, .. } | Self::Laplace { achieved, .. } => achieved,
        }
    }

    /// Achieved epsilon.
    pub fn achieved_epsilon(&self) -> f64 {
        self.achieved().epsilon
    }

    /// Achieved delta.
    pub fn achieved_delta(&self) -> f64 {
        self.achieved().delta
    }

    /// The calibrated mechanism.
    pub fn mechanism(&self) -> Result<Mechanism> {
        Mechanism::of_kind(self.kind(), self.noise_parameter())
    }

    fn scaled(self, factor: f64) -> Self {
        Self::new(self.kind(), self.noise_parameter() * factor, self.achieved())
    }
}

impl fmt::Display for CalibrationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let achieved = self.achieved();
        write!(
            f,
            "{}={} (epsilon={}, delta={})",
            self.kind().parameter_name(),
            self.noise_parameter(),
            achieved.epsilon,
            achieved.delta
        )
    }
}

/// How the mechanism is applied to the data.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CalibrationMode {
    /// One release on the full dataset.
    Single,
    /// `rounds` releases on the full dataset.
    MultiRound {
        /// Number of releases.
        rounds: u64,
    },
    /// One release on a Poisson subsample.
    Subsampled {
        /// Sampling rate.
        gamma: f64,
    },
    /// `rounds` releases, each on a fresh Poisson subsample.
    SubsampledMultiRound {
        /// Number of releases.
        rounds: u64,
        /// Sampling rate.
        gamma: f64,
    },
}

impl CalibrationMode {
    /// Select the mode from a round count and a sampling rate.
    pub fn from_parts(rounds: u64, sampling_rate: f64) -> Result<Self> {
        if rounds < 1 {
            return Err(DpError::invalid("rounds must be at least 1"));
        }
        validate_sampling_rate(sampling_rate)?;
        Ok(match (rounds > 1, sampling_rate < 1.0) {
            (false, false) => Self::Single,
            (true, false) => Self::MultiRound { rounds },
            (false, true) => Self::Subsampled {
                gamma: sampling_rate,
            },
            (true, true) => Self::SubsampledMultiRound {
                rounds,
                gamma: sampling_rate,
            },
        })
    }

    /// Number of releases.
    pub fn rounds(&self) -> u64 {
        match *self {
            Self::Single | Self::Subsampled { .. } => 1,
            Self::MultiRound { rounds } | Self::SubsampledMultiRound { rounds, .. } => rounds,
        }
    }

    /// Sampling rate of each release.
    pub fn sampling_rate(&self) -> f64 {
        match *self {
            Self::Single | Self::MultiRound { .. } => 1.0,
            Self::Subsampled { gamma } | Self::SubsampledMultiRound { gamma, .. } => gamma,
        }
    }

    fn validate(&self) -> Result<()> {
        Self::from_parts(self.rounds(), self.sampling_rate()).map(|_| ())
    }
}

/// Single-release Gaussian calibration method.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GaussianStrategy {
    /// `sqrt(2 ln(1.25 / delta)) / epsilon`; only valid for `epsilon <= 1`.
    Classical,
    /// Optimal Rényi order conversion.
    Rdp,
    /// Exact Balle & Wang calibration.
    #[default]
    Analytical,
}

/// Settings shared by the calibrators.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationConfig {
    /// Accountant used for multi-round composition.
    pub accountant: RdpAccountantConfig,
    /// Search tolerances and caps.
    pub search: SearchConfig,
    /// Sensitivity of the released query; noise scales linearly with it.
    pub sensitivity: f64,
    /// Method for single Gaussian releases.
    pub gaussian_strategy: GaussianStrategy,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            accountant: RdpAccountantConfig::default(),
            search: SearchConfig::default(),
            sensitivity: 1.0,
            gaussian_strategy: GaussianStrategy::default(),
        }
    }
}

impl CalibrationConfig {
    /// Set the accountant configuration.
    pub fn with_accountant(mut self, accountant: RdpAccountantConfig) -> Self {
        self.accountant = accountant;
        self
    }

    /// Set the search configuration.
    pub fn with_search(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    /// Set the query sensitivity.
    pub fn with_sensitivity(mut self, sensitivity: f64) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    /// Set the single-release Gaussian strategy.
    pub fn with_gaussian_strategy(mut self, strategy: GaussianStrategy) -> Self {
        self.gaussian_strategy = strategy;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.accountant.validate()?;
        self.search.validate()?;
        if !self.sensitivity.is_finite() || self.sensitivity <= 0.0 {
            return Err(DpError::config(format!(
                "sensitivity must be positive and finite, got {}",
                self.sensitivity
            )));
        }
        Ok(())
    }
}

/// Calibrates the noise of one mechanism family.
///
/// Implementors provide the single-release calibration; the provided
/// [`calibrate`](Calibrator::calibrate) handles every [`CalibrationMode`].
pub trait Calibrator {
    /// Mechanism family calibrated.
    fn kind(&self) -> MechanismKind;

    /// Shared settings.
    fn config(&self) -> &CalibrationConfig;

    /// Reject targets this family cannot meet.
    fn validate_target(&self, epsilon: f64, delta: f64) -> Result<()> {
        validate_epsilon(epsilon)?;
        validate_delta(delta)
    }

    /// Calibrate one release at unit sensitivity.
    fn calibrate_single(&self, epsilon: f64, delta: f64) -> Result<CalibrationResult>;

    /// Calibrate for `mode`, scaled by the configured sensitivity.
    fn calibrate(&self, epsilon: f64, delta: f64, mode: CalibrationMode) -> Result<CalibrationResult> {
        self.validate_target(epsilon, delta)?;
        mode.validate()?;
        let config = self.config();
        config.validate()?;
        tracing::debug!(kind = %self.kind(), epsilon, delta, ?mode, "calibration_started");

        let unit = match mode {
            CalibrationMode::Single => self.calibrate_single(epsilon, delta)?,
            CalibrationMode::Subsampled { gamma } => {
                let (eps0, delta0) = subsample_inverse(epsilon, delta, gamma)?;
                tracing::debug!(eps0, delta0, gamma, "base_budget");
                let base = self.calibrate_single(eps0, delta0)?;
                let (eps, delta) = amplify(base.achieved_epsilon(), base.achieved_delta(), gamma);
                CalibrationResult::new(
                    self.kind(),
                    base.noise_parameter(),
                    PrivacyBudget { epsilon: eps, delta },
                )
            }
            CalibrationMode::MultiRound { rounds } => {
                compose_rounds(self.kind(), config, epsilon, delta, rounds, 1.0)?
            }
            CalibrationMode::SubsampledMultiRound { rounds, gamma } => {
                compose_rounds(self.kind(), config, epsilon, delta, rounds, gamma)?
            }
        };

        let result = unit.scaled(config.sensitivity);
        tracing::debug!(
            noise = result.noise_parameter(),
            achieved_epsilon = result.achieved_epsilon(),
            achieved_delta = result.achieved_delta(),
            "calibration_finished"
        );
        Ok(result)
    }
}

/// Calibrates Gaussian noise (`sigma`).
#[derive(Clone, Debug, Default)]
pub struct GaussianCalibrator {
    config: CalibrationConfig,
}

impl GaussianCalibrator {
    /// Calibrator with the given settings.
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }
}

impl Calibrator for GaussianCalibrator {
    fn kind(&self) -> MechanismKind {
        MechanismKind::Gaussian
    }

    fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    fn validate_target(&self, epsilon: f64, delta: f64) -> Result<()> {
        validate_epsilon(epsilon)?;
        validate_delta(delta)?;
        if delta == 0.0 {
            return Err(DpError::invalid(
                "the Gaussian mechanism cannot satisfy delta = 0",
            ));
        }
        Ok(())
    }

    fn calibrate_single(&self, epsilon: f64, delta: f64) -> Result<CalibrationResult> {
        let search = &self.config.search;
        let (sigma, achieved) = match self.config.gaussian_strategy {
            GaussianStrategy::Classical => {
                if epsilon > 1.0 {
                    return Err(DpError::invalid(format!(
                        "classical Gaussian calibration requires epsilon <= 1, got {epsilon}"
                    )));
                }
                let sigma = classical_gaussian_sigma(epsilon, delta)?;
                (sigma, PrivacyBudget { epsilon, delta })
            }
            GaussianStrategy::Rdp => {
                let out = rdp_gaussian_sigma(epsilon, delta, search)?;
                (
                    out.argument,
                    PrivacyBudget {
                        epsilon: out.value,
                        delta,
                    },
                )
            }
            GaussianStrategy::Analytical => {
                let out = analytical_gaussian_sigma(epsilon, delta, search)?;
                (
                    out.argument,
                    PrivacyBudget {
                        epsilon,
                        delta: out.value,
                    },
                )
            }
        };
        Ok(CalibrationResult::Gaussian { sigma, achieved })
    }
}

/// Calibrates Laplace noise (`b`).
#[derive(Clone, Debug, Default)]
pub struct LaplaceCalibrator {
    config: CalibrationConfig,
}

impl LaplaceCalibrator {
    /// Calibrator with the given settings.
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }
}

impl Calibrator for LaplaceCalibrator {
    fn kind(&self) -> MechanismKind {
        MechanismKind::Laplace
    }

    fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    // A single Laplace release is pure epsilon-DP; delta is left unspent.
    fn calibrate_single(&self, epsilon: f64, _delta: f64) -> Result<CalibrationResult> {
        validate_epsilon(epsilon)?;
        Ok(CalibrationResult::Laplace {
            b: 1.0 / epsilon,
            achieved: PrivacyBudget::pure(epsilon)?,
        })
    }
}

/// Dispatches calibration requests by mechanism kind.
#[derive(Clone, Debug, Default)]
pub struct NoiseCalibrator {
    gaussian: GaussianCalibrator,
    laplace: LaplaceCalibrator,
}

impl NoiseCalibrator {
    /// Calibrator sharing `config` across kinds.
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            gaussian: GaussianCalibrator::new(config.clone()),
            laplace: LaplaceCalibrator::new(config),
        }
    }

    /// The calibrator for `kind`.
    pub fn calibrator(&self, kind: MechanismKind) -> &dyn Calibrator {
        match kind {
            MechanismKind::Gaussian => &self.gaussian,
            MechanismKind::Laplace => &self.laplace,
        }
    }

    /// Calibrate `kind` for `rounds` releases at `sampling_rate`.
    pub fn calibrate(
        &self,
        kind: MechanismKind,
        epsilon: f64,
        delta: f64,
        rounds: u64,
        sampling_rate: f64,
    ) -> Result<CalibrationResult> {
        let mode = CalibrationMode::from_parts(rounds, sampling_rate)?;
        self.calibrator(kind).calibrate(epsilon, delta, mode)
    }
}

/// Calibrate with default settings; `kind` is `"gaussian"` or `"laplace"`.
pub fn calibrate(
    kind: &str,
    epsilon: f64,
    delta: f64,
    rounds: u64,
    sampling_rate: f64,
) -> Result<CalibrationResult> {
    let kind: MechanismKind = kind.parse()?;
    NoiseCalibrator::default().calibrate(kind, epsilon, delta, rounds, sampling_rate)
}

/// Laplace scale `b` for `rounds` releases at unit sensitivity.
pub fn laplace(epsilon: f64, delta: f64, rounds: u64) -> Result<CalibrationResult> {
    NoiseCalibrator::default().calibrate(MechanismKind::Laplace, epsilon, delta, rounds, 1.0)
}

/// Smallest parameter of a monotone event family whose epsilon at
/// `target_delta` is at most `target_epsilon`.
///
/// `make_event` must describe less privacy loss as its argument grows, as a
/// noise scale does.
pub fn calibrate_event_parameter<F>(
    make_event: F,
    target_epsilon: f64,
    target_delta: f64,
    search: &SearchConfig,
) -> Result<f64>
where
    F: Fn(f64) -> Result<PrivacyEvent>,
{
    validate_epsilon(target_epsilon)?;
    validate_delta(target_delta)?;
    let out = search_decreasing(search, target_epsilon, |x| {
        Ok(Probe::Value(make_event(x)?.epsilon(target_delta)?))
    })?;
    Ok(out.argument)
}

fn compose_rounds(
    kind: MechanismKind,
    config: &CalibrationConfig,
    epsilon: f64,
    delta: f64,
    rounds: u64,
    gamma: f64,
) -> Result<CalibrationResult> {
    let template = config.accountant.create_accountant()?;
    let out = search_decreasing(&config.search, epsilon, |noise| {
        let mut mechanism = Mechanism::of_kind(kind, noise)?;
        if gamma < 1.0 {
            mechanism = Mechanism::subsampled(mechanism, gamma)?;
        }
        let profile = CurveProfile::new(&RdpCurve::new(mechanism)?, template.orders());

        let mut acc = template.clone();
        let mut composed = 0u64;
        let mut batch = 1u64;
        while composed < rounds {
            let n = batch.min(rounds - composed);
            acc.accumulate(&profile, n);
            composed += n;
            if composed < rounds && acc.get_epsilon(delta) > epsilon {
                return Ok(Probe::Exceeded);
            }
            batch = batch.saturating_mul(2);
        }
        Ok(Probe::Value(acc.get_epsilon(delta)))
    })?;
    tracing::debug!(
        noise = out.argument,
        iterations = out.iterations,
        rounds,
        gamma,
        "composition_search_finished"
    );
    Ok(CalibrationResult::new(
        kind,
        out.argument,
        PrivacyBudget {
            epsilon: out.value,
            delta,
        },
    ))
}
