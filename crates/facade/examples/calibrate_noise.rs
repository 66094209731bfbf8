use privcal::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> privcal::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let (epsilon, delta) = (1.0, 1e-6);

    println!("single release at (epsilon={epsilon}, delta={delta}):");
    println!("  classical   {}", classical_gaussian(epsilon, delta)?);
    println!("  rdp         {}", rdp_gaussian(epsilon, delta)?);
    println!("  analytical  {}", analytical_gaussian(epsilon, delta)?);

    for rounds in [1u64, 16, 256, 2048] {
        println!("laplace, {rounds} rounds: {}", laplace(epsilon, delta, rounds)?);
    }

    let calibrator = NoiseCalibrator::new(CalibrationConfig::default().with_sensitivity(2.0));
    let res = calibrator.calibrate(MechanismKind::Gaussian, epsilon, delta, 1000, 0.01)?;
    println!("gaussian, 1000 rounds at rate 0.01, sensitivity 2: {res}");

    let check = PrivacyEvent::gaussian_rounds(res.noise_parameter() / 2.0, 1000, 0.01)?;
    println!("  epsilon re-derived from the event: {:.6}", check.epsilon(delta)?);
    Ok(())
}
