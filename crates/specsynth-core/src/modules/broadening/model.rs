use super::BroadeningError;
use crate::common::constants::wavelength_to_energy;
use crate::domain::CurveKind;
use serde::{Deserialize, Serialize};

/// Instrumental Gaussian FWHM (eV) as a function of photon energy (eV).
pub trait GaussianWidth: Send + Sync {
    fn fwhm(&self, energy_ev: f64) -> f64;
}

impl<F> GaussianWidth for F
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    fn fwhm(&self, energy_ev: f64) -> f64 {
        self(energy_ev)
    }
}

/// Width functions expressible in a project file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidthModel {
    Constant { fwhm: f64 },
    /// `fwhm = intercept + slope · E`.
    Linear { intercept: f64, slope: f64 },
}

impl Default for WidthModel {
    fn default() -> Self {
        Self::Constant { fwhm: 0.27 }
    }
}

impl WidthModel {
    /// Checks the width is finite and positive over a whole window. A linear
    /// model is extremal at the window edges.
    pub fn check_over(&self, window: &WavelengthWindow) -> Result<(), BroadeningError> {
        let (energy_min, energy_max) = window.energy_bounds();
        for energy in [energy_min, energy_max] {
            let fwhm = self.fwhm(energy);
            if !fwhm.is_finite() || fwhm <= 0.0 {
                return Err(BroadeningError::InvalidWidth { energy, fwhm });
            }
        }
        Ok(())
    }
}

impl GaussianWidth for WidthModel {
    fn fwhm(&self, energy_ev: f64) -> f64 {
        match *self {
            Self::Constant { fwhm } => fwhm,
            Self::Linear { intercept, slope } => intercept + slope * energy_ev,
        }
    }
}

/// Which level of a transition carries the Boltzmann population weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopulationLevel {
    /// The level with the smaller energy; ties go to the lower level.
    #[default]
    Lower,
    /// The level with the larger energy; ties go to the upper level. The
    /// ground is the lowest lower level of the full line list.
    Upper,
}

impl PopulationLevel {
    /// Returns `(E_ref, J_ref)` for one transition.
    pub(super) fn reference(
        self,
        energy_lower: f64,
        energy_upper: f64,
        j_lower: f64,
        j_upper: f64,
    ) -> (f64, f64) {
        let take_lower = match self {
            Self::Lower => energy_lower <= energy_upper,
            Self::Upper => energy_lower > energy_upper,
        };
        if take_lower {
            (energy_lower, j_lower)
        } else {
            (energy_upper, j_upper)
        }
    }
}

/// Wavelength window in nm; `min_nm < max_nm`, both positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WavelengthWindow {
    pub min_nm: f64,
    pub max_nm: f64,
}

impl WavelengthWindow {
    pub const fn new(min_nm: f64, max_nm: f64) -> Self {
        Self { min_nm, max_nm }
    }

    pub fn is_valid(&self) -> bool {
        self.min_nm.is_finite()
            && self.max_nm.is_finite()
            && self.min_nm > 0.0
            && self.min_nm < self.max_nm
    }

    /// `(E_min, E_max)` in eV.
    pub fn energy_bounds(&self) -> (f64, f64) {
        (
            wavelength_to_energy(self.max_nm),
            wavelength_to_energy(self.min_nm),
        )
    }

    pub fn contains_open(&self, wavelength_nm: f64) -> bool {
        wavelength_nm > self.min_nm && wavelength_nm < self.max_nm
    }
}

/// Output axis: `n` generated samples or explicit wavelengths in nm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisSpec {
    Samples(usize),
    Wavelengths(Vec<f64>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BroadeningRequest {
    pub ion: u32,
    pub temperature: f64,
    pub window: WavelengthWindow,
    pub axis: AxisSpec,
    /// Wavelength shift in nm applied to every line centre.
    pub wavelength_shift: f64,
}

impl BroadeningRequest {
    pub fn new(ion: u32, temperature: f64, window: WavelengthWindow, axis: AxisSpec) -> Self {
        Self {
            ion,
            temperature,
            window,
            axis,
            wavelength_shift: 0.0,
        }
    }

    pub fn with_wavelength_shift(mut self, wavelength_shift: f64) -> Self {
        self.wavelength_shift = wavelength_shift;
        self
    }
}

/// The three broadened curves of one ionization stage on a shared axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IonizationStageSpectrum {
    pub ion: u32,
    pub wavelengths: Vec<f64>,
    pub gaussian: Vec<f64>,
    pub cross_unweighted: Vec<f64>,
    pub cross_weighted: Vec<f64>,
}

impl IonizationStageSpectrum {
    /// Zero contribution for a stage without lines in the window.
    pub fn zeros(ion: u32, wavelengths: Vec<f64>) -> Self {
        let length = wavelengths.len();
        Self {
            ion,
            wavelengths,
            gaussian: vec![0.0; length],
            cross_unweighted: vec![0.0; length],
            cross_weighted: vec![0.0; length],
        }
    }

    pub fn curve(&self, kind: CurveKind) -> &[f64] {
        match kind {
            CurveKind::Gaussian => &self.gaussian,
            CurveKind::CrossUnweighted => &self.cross_unweighted,
            CurveKind::CrossWeighted => &self.cross_weighted,
        }
    }

    pub fn len(&self) -> usize {
        self.wavelengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelengths.is_empty()
    }

    pub fn is_zero(&self) -> bool {
        CurveKind::ALL
            .iter()
            .all(|kind| self.curve(*kind).iter().all(|value| *value == 0.0))
    }
}

/// Zero-peak-zero polyline of the raw lines, for plotting line positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickSpectrum {
    pub wavelengths: Vec<f64>,
    pub intensities: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::{
        AxisSpec, BroadeningError, GaussianWidth, IonizationStageSpectrum, PopulationLevel,
        WavelengthWindow, WidthModel,
    };
    use crate::domain::CurveKind;

    #[test]
    fn width_models_and_closures_share_the_width_seam() {
        let constant = WidthModel::Constant { fwhm: 0.27 };
        let linear = WidthModel::Linear {
            intercept: 0.1,
            slope: 0.01,
        };
        let closure = |energy: f64| energy * 0.02;

        assert_eq!(constant.fwhm(123.0), 0.27);
        assert!((linear.fwhm(10.0) - 0.2).abs() < 1.0e-12);
        assert!((closure.fwhm(10.0) - 0.2).abs() < 1.0e-12);
    }

    #[test]
    fn width_models_are_checked_across_the_window() {
        let window = WavelengthWindow::new(1239.85 / 14.0, 1239.85 / 8.0);
        assert!(WidthModel::Constant { fwhm: 0.27 }.check_over(&window).is_ok());
        assert!(matches!(
            WidthModel::Constant { fwhm: 0.0 }.check_over(&window),
            Err(BroadeningError::InvalidWidth { .. })
        ));

        // Positive at 14 eV, negative at 8 eV.
        let falling = WidthModel::Linear {
            intercept: -0.5,
            slope: 0.05,
        };
        assert!(matches!(
            falling.check_over(&window),
            Err(BroadeningError::InvalidWidth { energy, .. }) if (energy - 8.0).abs() < 1.0e-9
        ));
    }

    #[test]
    fn width_model_round_trips_through_project_json() {
        let parsed: WidthModel =
            serde_json::from_str(r#"{ "constant": { "fwhm": 0.5 } }"#).expect("json");
        assert_eq!(parsed, WidthModel::Constant { fwhm: 0.5 });

        let axis: AxisSpec = serde_json::from_str(r#"{ "samples": 11 }"#).expect("json");
        assert_eq!(axis, AxisSpec::Samples(11));
    }

    #[test]
    fn reference_level_selection_honours_ties() {
        assert_eq!(
            PopulationLevel::Lower.reference(0.0, 10.0, 0.0, 1.0),
            (0.0, 0.0)
        );
        assert_eq!(
            PopulationLevel::Lower.reference(5.0, 5.0, 0.5, 1.5),
            (5.0, 0.5)
        );
        assert_eq!(
            PopulationLevel::Upper.reference(0.0, 10.0, 0.0, 1.0),
            (10.0, 1.0)
        );
        assert_eq!(
            PopulationLevel::Upper.reference(5.0, 5.0, 0.5, 1.5),
            (5.0, 1.5)
        );
    }

    #[test]
    fn window_converts_to_reversed_energy_bounds() {
        let window = WavelengthWindow::new(1239.85 / 14.0, 1239.85 / 8.0);
        let (low, high) = window.energy_bounds();
        assert!((low - 8.0).abs() < 1.0e-12);
        assert!((high - 14.0).abs() < 1.0e-12);
        assert!(!WavelengthWindow::new(10.0, 10.0).is_valid());
        assert!(!WavelengthWindow::new(-1.0, 10.0).is_valid());
    }

    #[test]
    fn zero_stage_spectrum_exposes_every_curve() {
        let zeros = IonizationStageSpectrum::zeros(2, vec![8.0, 9.0, 10.0]);
        assert!(zeros.is_zero());
        for kind in CurveKind::ALL {
            assert_eq!(zeros.curve(kind).len(), 3);
        }
    }
}
