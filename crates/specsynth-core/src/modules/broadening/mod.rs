mod model;

pub use model::{
    AxisSpec, BroadeningRequest, GaussianWidth, IonizationStageSpectrum, PopulationLevel,
    StickSpectrum, WavelengthWindow, WidthModel,
};

use crate::common::constants::{
    BOLTZMANN_SCALE, FWHM_TO_SIGMA, HC_EV_NM, LORENTZ_WIDTH_FACTOR, energy_to_wavelength,
    wavelength_to_energy,
};
use crate::domain::SynthError;
use crate::modules::line_list::{LineList, Transition};
use crate::numerics::{deterministic_argsort, linear_grid};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fmt::{Debug, Formatter};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BroadeningError {
    #[error("temperature must be finite and > 0, got {value}")]
    InvalidTemperature { value: f64 },
    #[error("wavelength window must satisfy 0 < min < max, got [{min}, {max}] nm")]
    InvalidWindow { min: f64, max: f64 },
    #[error("broadening axis needs at least 2 samples, got {count}")]
    InvalidAxis { count: usize },
    #[error("axis wavelength at index {index} must be finite and > 0, got {value}")]
    InvalidAxisValue { index: usize, value: f64 },
    #[error("gaussian width must be finite and > 0, got {fwhm} at {energy} eV")]
    InvalidWidth { energy: f64, fwhm: f64 },
    #[error("ion stage {ion} has no lines inside the wavelength window")]
    NoLinesInWindow { ion: u32 },
}

impl BroadeningError {
    /// Errors caused by the window, axis or width model rather than by the
    /// plasma point being evaluated.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidWindow { .. }
                | Self::InvalidAxis { .. }
                | Self::InvalidAxisValue { .. }
                | Self::InvalidWidth { .. }
        )
    }
}

impl From<BroadeningError> for SynthError {
    fn from(error: BroadeningError) -> Self {
        match error {
            BroadeningError::InvalidTemperature { .. } | BroadeningError::InvalidWidth { .. } => {
                SynthError::computation("RUN.BROADENING", error.to_string())
            }
            _ => SynthError::input_validation("INPUT.BROADENING", error.to_string()),
        }
    }
}

/// A surviving line reduced to what the kernels need.
#[derive(Debug, Clone, Copy)]
struct PreparedLine {
    center: f64,
    strength: f64,
    degeneracy: f64,
    population: f64,
}

/// Evaluation axis: energies to evaluate at and the wavelengths reported for them.
struct EvaluationAxis {
    energies: Vec<f64>,
    wavelengths: Vec<f64>,
}

/// Turns line lists into Gaussian, unweighted Lorentzian and
/// population-weighted Lorentzian curves.
pub struct BroadeningEngine {
    width: Box<dyn GaussianWidth>,
    population_level: PopulationLevel,
}

impl Debug for BroadeningEngine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadeningEngine")
            .field("population_level", &self.population_level)
            .finish_non_exhaustive()
    }
}

impl Default for BroadeningEngine {
    fn default() -> Self {
        Self::new(WidthModel::default())
    }
}

impl BroadeningEngine {
    pub fn new(width: impl GaussianWidth + 'static) -> Self {
        Self {
            width: Box::new(width),
            population_level: PopulationLevel::default(),
        }
    }

    pub fn with_population_level(mut self, population_level: PopulationLevel) -> Self {
        self.population_level = population_level;
        self
    }

    pub fn population_level(&self) -> PopulationLevel {
        self.population_level
    }

    /// Broadens every line inside the request window. Pure in its inputs.
    pub fn broaden(
        &self,
        lines: &LineList,
        request: &BroadeningRequest,
    ) -> Result<IonizationStageSpectrum, BroadeningError> {
        self.broaden_transitions(lines.transitions(), request)
    }

    /// Like [`Self::broaden`], with an empty window yielding an all-zero spectrum.
    pub fn broaden_or_zero(
        &self,
        lines: &LineList,
        request: &BroadeningRequest,
    ) -> Result<IonizationStageSpectrum, BroadeningError> {
        match self.broaden(lines, request) {
            Err(BroadeningError::NoLinesInWindow { ion }) => {
                let axis = evaluation_axis(request)?;
                debug!(ion, "no lines in window, using zero contribution");
                Ok(IonizationStageSpectrum::zeros(ion, axis.wavelengths))
            }
            other => other,
        }
    }

    /// One spectrum per `(index_lower, index_upper)` level pair. Pairs with no
    /// line in the window are left out.
    pub fn broaden_by_transition_group(
        &self,
        lines: &LineList,
        request: &BroadeningRequest,
    ) -> Result<BTreeMap<(i64, i64), IonizationStageSpectrum>, BroadeningError> {
        let mut groups: BTreeMap<(i64, i64), Vec<Transition>> = BTreeMap::new();
        for transition in lines {
            groups
                .entry(transition.level_pair())
                .or_default()
                .push(*transition);
        }

        let mut spectra = BTreeMap::new();
        for (pair, transitions) in groups {
            match self.broaden_transitions(&transitions, request) {
                Ok(spectrum) => {
                    spectra.insert(pair, spectrum);
                }
                Err(BroadeningError::NoLinesInWindow { .. }) => continue,
                Err(error) => return Err(error),
            }
        }
        Ok(spectra)
    }

    fn broaden_transitions(
        &self,
        transitions: &[Transition],
        request: &BroadeningRequest,
    ) -> Result<IonizationStageSpectrum, BroadeningError> {
        validate_request(request)?;
        let axis = evaluation_axis(request)?;
        let prepared = self.prepare_lines(transitions, request);
        if prepared.is_empty() {
            return Err(BroadeningError::NoLinesInWindow { ion: request.ion });
        }

        let samples = axis
            .energies
            .par_iter()
            .map(|&energy| self.evaluate_point(energy, &prepared))
            .collect::<Result<Vec<_>, _>>()?;

        let mut gaussian = Vec::with_capacity(samples.len());
        let mut cross_unweighted = Vec::with_capacity(samples.len());
        let mut cross_weighted = Vec::with_capacity(samples.len());
        for (g, unweighted, weighted) in samples {
            gaussian.push(g);
            cross_unweighted.push(unweighted);
            cross_weighted.push(weighted);
        }

        debug!(
            ion = request.ion,
            temperature = request.temperature,
            lines = prepared.len(),
            points = axis.energies.len(),
            "broadened stage"
        );

        Ok(IonizationStageSpectrum {
            ion: request.ion,
            wavelengths: axis.wavelengths,
            gaussian,
            cross_unweighted,
            cross_weighted,
        })
    }

    fn prepare_lines(
        &self,
        transitions: &[Transition],
        request: &BroadeningRequest,
    ) -> Vec<PreparedLine> {
        let (energy_min, energy_max) = request.window.energy_bounds();
        let surviving: Vec<&Transition> = transitions
            .iter()
            .filter(|line| {
                line.transition_energy > energy_min && line.transition_energy < energy_max
            })
            .collect();

        let references: Vec<(f64, f64)> = surviving
            .iter()
            .map(|line| {
                self.population_level.reference(
                    line.energy_lower,
                    line.energy_upper,
                    line.j_lower,
                    line.j_upper,
                )
            })
            .collect();

        // Upper-level populations are measured from the lowest lower level of
        // the whole list; lower-level ones from the lowest surviving reference.
        let ground = match self.population_level {
            PopulationLevel::Lower => references.iter().copied().min_by(ground_order),
            PopulationLevel::Upper if surviving.is_empty() => None,
            PopulationLevel::Upper => transitions
                .iter()
                .map(|line| (line.energy_lower, line.j_lower))
                .min_by(ground_order),
        };
        let Some((ground_energy, ground_j)) = ground else {
            return Vec::new();
        };
        let ground_degeneracy = 2.0 * ground_j + 1.0;

        surviving
            .iter()
            .zip(&references)
            .map(|(line, &(energy_ref, j_ref))| {
                let degeneracy = 2.0 * j_ref + 1.0;
                let boltzmann =
                    (-(energy_ref - ground_energy).abs() * BOLTZMANN_SCALE / request.temperature)
                        .exp();
                PreparedLine {
                    center: shifted_center(line.transition_energy, request.wavelength_shift),
                    strength: line.strength.abs(),
                    degeneracy,
                    population: degeneracy * boltzmann / ground_degeneracy,
                }
            })
            .collect()
    }

    fn evaluate_point(
        &self,
        energy: f64,
        lines: &[PreparedLine],
    ) -> Result<(f64, f64, f64), BroadeningError> {
        let fwhm = self.width.fwhm(energy);
        if !fwhm.is_finite() || fwhm <= 0.0 {
            return Err(BroadeningError::InvalidWidth { energy, fwhm });
        }

        let gamma = LORENTZ_WIDTH_FACTOR * fwhm;
        let half_gamma_squared = gamma * gamma / 4.0;
        let gaussian_norm = FWHM_TO_SIGMA / ((2.0 * PI).sqrt() * fwhm);
        let exponent_scale = FWHM_TO_SIGMA * FWHM_TO_SIGMA / (2.0 * fwhm * fwhm);

        let mut gaussian = 0.0;
        let mut unweighted = 0.0;
        let mut weighted = 0.0;
        for line in lines {
            let offset = line.center - energy;
            let offset_squared = offset * offset;
            gaussian += line.strength * gaussian_norm * (-exponent_scale * offset_squared).exp();

            let lorentzian = gamma / (2.0 * PI * (offset_squared + half_gamma_squared));
            let per_state = line.strength / line.degeneracy;
            unweighted += per_state * lorentzian;
            weighted += per_state * line.population * lorentzian;
        }

        Ok((gaussian, unweighted, weighted))
    }
}

/// Raw lines in the window as a zero-peak-zero polyline, padded with zero
/// points at the window edges. Lines are ordered by wavelength.
pub fn stick_spectrum(lines: &LineList, window: &WavelengthWindow) -> StickSpectrum {
    let inside: Vec<(f64, f64)> = lines
        .iter()
        .map(|line| (line.wavelength_nm(), line.strength))
        .filter(|(wavelength, _)| window.contains_open(*wavelength))
        .collect();
    let keys: Vec<f64> = inside.iter().map(|(wavelength, _)| *wavelength).collect();

    let mut wavelengths = Vec::with_capacity(3 * inside.len() + 2);
    let mut intensities = Vec::with_capacity(3 * inside.len() + 2);
    wavelengths.push(window.min_nm);
    intensities.push(0.0);
    for index in deterministic_argsort(&keys) {
        let (wavelength, strength) = inside[index];
        wavelengths.extend([wavelength, wavelength, wavelength]);
        intensities.extend([0.0, strength, 0.0]);
    }
    wavelengths.push(window.max_nm);
    intensities.push(0.0);

    StickSpectrum {
        wavelengths,
        intensities,
    }
}

/// Smallest energy first, smallest J among ties.
fn ground_order(lhs: &(f64, f64), rhs: &(f64, f64)) -> Ordering {
    lhs.0.total_cmp(&rhs.0).then_with(|| lhs.1.total_cmp(&rhs.1))
}

fn shifted_center(transition_energy: f64, wavelength_shift: f64) -> f64 {
    (HC_EV_NM / (HC_EV_NM / transition_energy - wavelength_shift)).abs()
}

fn validate_request(request: &BroadeningRequest) -> Result<(), BroadeningError> {
    if !request.temperature.is_finite() || request.temperature <= 0.0 {
        return Err(BroadeningError::InvalidTemperature {
            value: request.temperature,
        });
    }
    if !request.window.is_valid() {
        return Err(BroadeningError::InvalidWindow {
            min: request.window.min_nm,
            max: request.window.max_nm,
        });
    }
    Ok(())
}

fn evaluation_axis(request: &BroadeningRequest) -> Result<EvaluationAxis, BroadeningError> {
    match &request.axis {
        AxisSpec::Samples(count) => {
            let (energy_min, energy_max) = request.window.energy_bounds();
            // Descending energies give ascending wavelengths.
            let energies = linear_grid(energy_max, energy_min, *count)
                .ok_or(BroadeningError::InvalidAxis { count: *count })?;
            let wavelengths = energies.iter().map(|&e| energy_to_wavelength(e)).collect();
            Ok(EvaluationAxis {
                energies,
                wavelengths,
            })
        }
        AxisSpec::Wavelengths(wavelengths) => {
            if wavelengths.len() < 2 {
                return Err(BroadeningError::InvalidAxis {
                    count: wavelengths.len(),
                });
            }
            if let Some((index, &value)) = wavelengths
                .iter()
                .enumerate()
                .find(|(_, value)| !value.is_finite() || **value <= 0.0)
            {
                return Err(BroadeningError::InvalidAxisValue { index, value });
            }
            Ok(EvaluationAxis {
                energies: wavelengths.iter().map(|&w| wavelength_to_energy(w)).collect(),
                wavelengths: wavelengths.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AxisSpec, BroadeningEngine, BroadeningError, BroadeningRequest, PopulationLevel,
        WavelengthWindow, WidthModel, stick_spectrum,
    };
    use crate::common::constants::{BOLTZMANN_SCALE, HC_EV_NM, wavelength_to_energy};
    use crate::modules::line_list::{LineList, Transition};

    fn line(energy_upper: f64, strength: f64, pair: (i64, i64)) -> Transition {
        Transition {
            energy_lower: 0.0,
            energy_upper,
            transition_energy: energy_upper,
            strength,
            index_lower: pair.0,
            index_upper: pair.1,
            j_lower: 0.0,
            j_upper: 1.0,
        }
    }

    fn eight_to_fourteen_ev() -> WavelengthWindow {
        WavelengthWindow::new(HC_EV_NM / 14.0, HC_EV_NM / 8.0)
    }

    fn engine(fwhm: f64) -> BroadeningEngine {
        BroadeningEngine::new(WidthModel::Constant { fwhm })
    }

    fn value_near(wavelengths: &[f64], curve: &[f64], energy: f64) -> f64 {
        let target = HC_EV_NM / energy;
        let index = wavelengths
            .iter()
            .enumerate()
            .min_by(|lhs, rhs| {
                (lhs.1 - target)
                    .abs()
                    .total_cmp(&(rhs.1 - target).abs())
            })
            .map(|(index, _)| index)
            .expect("non-empty axis");
        curve[index]
    }

    #[test]
    fn single_line_gaussian_integrates_to_line_strength() {
        let lines = LineList::new("inline", vec![line(11.0, -0.8, (1, 2))]);
        let request =
            BroadeningRequest::new(1, 20.0, eight_to_fourteen_ev(), AxisSpec::Samples(4001));

        let spectrum = engine(0.27).broaden(&lines, &request).expect("one line survives");
        let energies: Vec<f64> = spectrum
            .wavelengths
            .iter()
            .map(|&w| wavelength_to_energy(w))
            .collect();
        let integral: f64 = energies
            .windows(2)
            .zip(spectrum.gaussian.windows(2))
            .map(|(e, g)| (e[0] - e[1]).abs() * (g[0] + g[1]) / 2.0)
            .sum();

        assert!((integral - 0.8).abs() < 1.0e-3, "integral was {integral}");
        assert!(spectrum.wavelengths.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn broadening_is_a_pure_function_of_its_inputs() {
        let lines = LineList::new(
            "inline",
            vec![line(10.0, 1.0, (1, 2)), line(12.0, 0.5, (1, 3))],
        );
        let request =
            BroadeningRequest::new(1, 25.0, eight_to_fourteen_ev(), AxisSpec::Samples(501))
                .with_wavelength_shift(0.05);
        let engine = engine(0.27);

        let first = engine.broaden(&lines, &request).expect("first run");
        let second = engine.broaden(&lines, &request).expect("second run");
        assert_eq!(first, second);
    }

    #[test]
    fn two_line_scenario_shows_two_resolved_peaks() {
        let lines = LineList::new(
            "inline",
            vec![line(10.0, 1.0, (1, 2)), line(12.0, 0.5, (1, 3))],
        );
        let request =
            BroadeningRequest::new(1, 25.0, eight_to_fourteen_ev(), AxisSpec::Samples(2001));

        let lower = engine(0.27).broaden(&lines, &request).expect("lower reference");
        let peak_10 = value_near(&lower.wavelengths, &lower.cross_weighted, 10.0);
        let peak_12 = value_near(&lower.wavelengths, &lower.cross_weighted, 12.0);
        let valley = value_near(&lower.wavelengths, &lower.cross_weighted, 11.0);
        assert!(peak_10 > 3.0 * valley);
        assert!(peak_12 > 3.0 * valley);
        // Both lines start from E=0, so both weights are 1.
        assert_eq!(lower.cross_weighted, lower.cross_unweighted);

        let upper = engine(0.27)
            .with_population_level(PopulationLevel::Upper)
            .broaden(&lines, &request)
            .expect("upper reference");
        // Ground is the shared lower level (E=0, J=0); each line is weighted by
        // its upper level: (2·1+1)·exp(−E_upper·0.124/T) / (2·0+1).
        let weight = |energy_upper: f64| 3.0 * (-energy_upper * BOLTZMANN_SCALE / 25.0_f64).exp();
        let ratio_10 = value_near(&upper.wavelengths, &upper.cross_weighted, 10.0)
            / value_near(&upper.wavelengths, &upper.cross_unweighted, 10.0);
        let ratio_12 = value_near(&upper.wavelengths, &upper.cross_weighted, 12.0)
            / value_near(&upper.wavelengths, &upper.cross_unweighted, 12.0);
        assert!((ratio_10 - weight(10.0)).abs() < 1.0e-2);
        assert!((ratio_12 - weight(12.0)).abs() < 1.0e-2);
        assert!(ratio_12 < ratio_10);
    }

    #[test]
    fn upper_reference_ground_comes_from_the_full_line_list() {
        let mut outside = line(50.0, 1.0, (0, 1));
        outside.energy_lower = -2.0;
        outside.j_lower = 1.0;
        let request =
            BroadeningRequest::new(1, 25.0, eight_to_fourteen_ev(), AxisSpec::Samples(501));
        let engine = engine(0.27).with_population_level(PopulationLevel::Upper);

        let inside_only = LineList::new("inline", vec![line(10.0, 1.0, (1, 2))]);
        let with_outside = LineList::new("inline", vec![line(10.0, 1.0, (1, 2)), outside]);
        let near = engine.broaden(&inside_only, &request).expect("inside only");
        let far = engine.broaden(&with_outside, &request).expect("with outside line");

        // Ground moves from (0, J=0) to (−2, J=1): degeneracy 1 → 3, gap 10 → 12 eV.
        let expected = (-2.0 * BOLTZMANN_SCALE / 25.0_f64).exp() / 3.0;
        let index = near.len() / 2;
        let ratio = far.cross_weighted[index] / near.cross_weighted[index];
        assert!((ratio - expected).abs() < 1.0e-12);
        assert_eq!(far.cross_unweighted, near.cross_unweighted);
    }

    #[test]
    fn empty_window_is_signalled_and_zero_filled_on_request() {
        let lines = LineList::new("inline", vec![line(50.0, 1.0, (1, 2))]);
        let request =
            BroadeningRequest::new(4, 25.0, eight_to_fourteen_ev(), AxisSpec::Samples(11));
        let engine = engine(0.27);

        assert_eq!(
            engine.broaden(&lines, &request),
            Err(BroadeningError::NoLinesInWindow { ion: 4 })
        );
        let zeros = engine.broaden_or_zero(&lines, &request).expect("zero spectrum");
        assert_eq!(zeros.ion, 4);
        assert_eq!(zeros.len(), 11);
        assert!(zeros.is_zero());
    }

    #[test]
    fn caller_axis_is_kept_verbatim() {
        let lines = LineList::new("inline", vec![line(10.0, 1.0, (1, 2))]);
        let axis = vec![120.0, 124.0, 128.0];
        let request = BroadeningRequest::new(
            1,
            25.0,
            eight_to_fourteen_ev(),
            AxisSpec::Wavelengths(axis.clone()),
        );

        let spectrum = engine(0.27).broaden(&lines, &request).expect("broadened");
        assert_eq!(spectrum.wavelengths, axis);
        assert!(spectrum.gaussian[1] > spectrum.gaussian[0]);
        assert!(spectrum.gaussian[1] > spectrum.gaussian[2]);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let lines = LineList::new("inline", vec![line(10.0, 1.0, (1, 2))]);
        let window = eight_to_fourteen_ev();

        let request = BroadeningRequest::new(1, 0.0, window, AxisSpec::Samples(11));
        assert!(matches!(
            engine(0.27).broaden(&lines, &request),
            Err(BroadeningError::InvalidTemperature { .. })
        ));

        let request = BroadeningRequest::new(1, 25.0, window, AxisSpec::Samples(1));
        assert_eq!(
            engine(0.27).broaden(&lines, &request),
            Err(BroadeningError::InvalidAxis { count: 1 })
        );

        let request = BroadeningRequest::new(1, 25.0, window, AxisSpec::Samples(11));
        assert!(matches!(
            engine(0.0).broaden(&lines, &request),
            Err(BroadeningError::InvalidWidth { .. })
        ));

        let request = BroadeningRequest::new(
            1,
            25.0,
            WavelengthWindow::new(20.0, 10.0),
            AxisSpec::Samples(11),
        );
        assert!(matches!(
            engine(0.27).broaden(&lines, &request),
            Err(BroadeningError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn transition_groups_are_broadened_separately() {
        let lines = LineList::new(
            "inline",
            vec![
                line(10.0, 1.0, (1, 2)),
                line(10.5, 0.3, (1, 2)),
                line(12.0, 0.5, (1, 3)),
                line(50.0, 0.5, (2, 3)),
            ],
        );
        let request =
            BroadeningRequest::new(1, 25.0, eight_to_fourteen_ev(), AxisSpec::Samples(101));
        let engine = engine(0.27);

        let groups = engine
            .broaden_by_transition_group(&lines, &request)
            .expect("grouped broadening");
        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec![(1, 2), (1, 3)]);

        let total = engine.broaden(&lines, &request).expect("total");
        for index in 0..total.len() {
            let summed = groups[&(1, 2)].gaussian[index] + groups[&(1, 3)].gaussian[index];
            let expected = total.gaussian[index];
            assert!((summed - expected).abs() <= 1.0e-12 * expected.max(1.0));
        }
    }

    #[test]
    fn stick_spectrum_pads_window_edges() {
        let lines = LineList::new(
            "inline",
            vec![line(12.0, 0.5, (1, 3)), line(10.0, 1.0, (1, 2)), line(50.0, 2.0, (2, 3))],
        );
        let window = eight_to_fourteen_ev();
        let sticks = stick_spectrum(&lines, &window);

        assert_eq!(sticks.wavelengths.len(), 8);
        assert_eq!(sticks.wavelengths[0], window.min_nm);
        assert_eq!(sticks.wavelengths[7], window.max_nm);
        assert_eq!(sticks.intensities, vec![0.0, 0.0, 0.5, 0.0, 0.0, 1.0, 0.0, 0.0]);
        assert!((sticks.wavelengths[2] - HC_EV_NM / 12.0).abs() < 1.0e-12);
    }
}
