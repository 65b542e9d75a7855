use super::IonBalanceError;
use crate::common::constants::{
    IONIZATION_RATE_COEFFICIENT, RADIATIVE_LOG_OFFSET, RADIATIVE_LOG_SLOPE,
    RADIATIVE_RECOMBINATION_COEFFICIENT, RADIATIVE_SQRT_SLOPE, RATE_TEMPERATURE_OFFSET,
    THREE_BODY_RECOMBINATION_COEFFICIENT,
};
use crate::modules::atomic::AtomicStructure;

/// Inputs of one corona-balance rate evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct StageRateInput {
    /// Stage index entering the radiative recombination term.
    pub(super) charge: f64,
    pub(super) ionization_energy: f64,
    pub(super) outer_electrons: f64,
}

/// Natural log of `S / (Ar + Ne·A3r)` for one stage.
///
/// `S` is evaluated in log space so the `exp(-χ/T)` factor cannot underflow
/// before the ratio is formed.
pub(super) fn log_stage_ratio(
    input: StageRateInput,
    temperature: f64,
    electron_density: f64,
) -> Result<f64, IonBalanceError> {
    let chi = input.ionization_energy;
    if !chi.is_finite() || chi <= 0.0 {
        return Err(IonBalanceError::InvalidPlasmaParameters {
            reason: format!("ionization energy must be finite and > 0, got {chi}"),
        });
    }

    let reduced_temperature = temperature / chi;
    let shape = RATE_TEMPERATURE_OFFSET + reduced_temperature;

    let log_ionization = (IONIZATION_RATE_COEFFICIENT * input.outer_electrons).ln()
        + 0.5 * reduced_temperature.ln()
        - chi / temperature
        - 1.5 * chi.ln()
        - shape.ln();

    let radiative = RADIATIVE_RECOMBINATION_COEFFICIENT
        * (chi / temperature).sqrt()
        * input.charge
        * (RADIATIVE_LOG_OFFSET
            + RADIATIVE_LOG_SLOPE * (chi / temperature).ln()
            + RADIATIVE_SQRT_SLOPE * reduced_temperature.sqrt());
    let three_body = THREE_BODY_RECOMBINATION_COEFFICIENT * input.outer_electrons
        / (temperature * chi * chi * shape);
    let recombination = radiative + electron_density * three_body;

    let log_ratio = log_ionization - recombination.ln();
    if log_ratio.is_nan() {
        return Err(IonBalanceError::InvalidPlasmaParameters {
            reason: format!(
                "rate balance is undefined at T={temperature}, Ne={electron_density}, chi={chi}"
            ),
        });
    }
    Ok(log_ratio)
}

/// Log ratios for stages `first..=last` of `atom`, each using the stage's own
/// ionization energy, outer-shell count and charge.
pub(super) fn log_stage_ratios(
    atom: &AtomicStructure,
    stages: std::ops::RangeInclusive<usize>,
    temperature: f64,
    electron_density: f64,
) -> Result<Vec<f64>, IonBalanceError> {
    stages
        .map(|stage| {
            let ionization_energy = atom.ionization_energy(stage).ok_or_else(|| {
                IonBalanceError::InvalidPlasmaParameters {
                    reason: format!(
                        "no ionization energy for stage {stage} of Z={}",
                        atom.atomic_number()
                    ),
                }
            })?;
            log_stage_ratio(
                StageRateInput {
                    charge: stage as f64,
                    ionization_energy,
                    outer_electrons: f64::from(atom.outermost_electron_count(stage)),
                },
                temperature,
                electron_density,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{StageRateInput, log_stage_ratio};
    use crate::modules::ion_balance::IonBalanceError;

    fn direct_ratio(input: StageRateInput, temperature: f64, electron_density: f64) -> f64 {
        let chi = input.ionization_energy;
        let s = 9e-6 * input.outer_electrons * (temperature / chi).sqrt()
            * (-chi / temperature).exp()
            / (chi.powf(1.5) * (4.88 + temperature / chi));
        let ar = 5.2e-14
            * (chi / temperature).sqrt()
            * input.charge
            * (0.429 + 0.5 * (chi / temperature).ln() + 0.469 * (temperature / chi).sqrt());
        let a3r = 2.97e-27 * input.outer_electrons
            / (temperature * chi * chi * (4.88 + temperature / chi));
        s / (ar + electron_density * a3r)
    }

    #[test]
    fn log_ratio_matches_the_direct_formula() {
        let cases = [
            (0.0, 5.985769, 3.0, 25.0, 1.0e20),
            (2.0, 28.447642, 1.0, 40.0, 3.0e21),
            (5.0, 190.49, 7.0, 30.0, 1.0e18),
        ];
        for (charge, chi, outer, temperature, density) in cases {
            let input = StageRateInput {
                charge,
                ionization_energy: chi,
                outer_electrons: outer,
            };
            let expected = direct_ratio(input, temperature, density);
            let actual = log_stage_ratio(input, temperature, density)
                .expect("valid parameters")
                .exp();
            assert!(
                ((actual - expected) / expected).abs() < 1.0e-10,
                "charge {charge}: {actual} vs {expected}"
            );
        }
    }

    #[test]
    fn non_positive_ionization_energy_is_rejected() {
        let input = StageRateInput {
            charge: 1.0,
            ionization_energy: 0.0,
            outer_electrons: 1.0,
        };
        assert!(matches!(
            log_stage_ratio(input, 25.0, 1.0e20),
            Err(IonBalanceError::InvalidPlasmaParameters { .. })
        ));
    }
}
