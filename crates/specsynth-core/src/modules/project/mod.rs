//! JSON project files describing one element, its stage line lists, the
//! measured spectrum and the scan settings.

use crate::domain::{CurveKind, SimilarityMethod, SynthError, SynthResult};
use crate::modules::atomic::AtomicStructure;
use crate::modules::broadening::{
    AxisSpec, BroadeningEngine, PopulationLevel, WavelengthWindow, WidthModel,
};
use crate::modules::experiment::ExperimentalSpectrum;
use crate::modules::grid_scan::{GridAxis, ScanGrid, default_workers};
use crate::modules::ion_balance::AbundanceStrategyKind;
use crate::modules::line_list::LineList;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ProjectConfigError {
    #[error("failed to read project file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse project file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid project file '{}': {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
}

impl From<ProjectConfigError> for SynthError {
    fn from(error: ProjectConfigError) -> Self {
        match error {
            ProjectConfigError::Read { .. } => {
                SynthError::io_system("IO.PROJECT_CONFIG", error.to_string())
            }
            _ => SynthError::input_validation("INPUT.PROJECT_CONFIG", error.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementConfig {
    pub atomic_number: usize,
    /// Replaces the built-in table; must hold exactly `atomic_number` entries.
    #[serde(default)]
    pub ionization_energies: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    pub ion: u32,
    pub line_list: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BroadeningConfig {
    #[serde(default)]
    pub fwhm: WidthModel,
    /// Generated axis size; without it the experimental wavelengths are used.
    #[serde(default)]
    pub samples: Option<usize>,
    #[serde(default)]
    pub wavelength_shift: f64,
    #[serde(default)]
    pub population_level: PopulationLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    pub temperature: GridAxis,
    pub density: GridAxis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub element: ElementConfig,
    pub experimental: PathBuf,
    #[serde(default)]
    pub wavelength_range: Option<[f64; 2]>,
    pub stages: Vec<StageConfig>,
    #[serde(default)]
    pub broadening: BroadeningConfig,
    #[serde(default)]
    pub abundance_strategy: AbundanceStrategyKind,
    #[serde(default)]
    pub curve: CurveKind,
    #[serde(default)]
    pub similarity: SimilarityMethod,
    #[serde(default)]
    pub grid: Option<GridConfig>,
    #[serde(default)]
    pub workers: Option<usize>,
    /// Directory relative paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl ProjectConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProjectConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ProjectConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_json_str(&source, base_dir).map_err(|error| match error {
            ProjectConfigError::Parse { source, .. } => ProjectConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            ProjectConfigError::Invalid { reason, .. } => ProjectConfigError::Invalid {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    pub fn from_json_str(
        source: &str,
        base_dir: impl Into<PathBuf>,
    ) -> Result<Self, ProjectConfigError> {
        let base_dir = base_dir.into();
        let mut config: Self =
            serde_json::from_str(source).map_err(|source| ProjectConfigError::Parse {
                path: base_dir.clone(),
                source,
            })?;
        config.base_dir = base_dir;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ProjectConfigError> {
        let invalid = |reason: String| ProjectConfigError::Invalid {
            path: self.base_dir.clone(),
            reason,
        };
        if self.stages.is_empty() {
            return Err(invalid("at least one stage line list is required".to_string()));
        }
        let mut seen = std::collections::BTreeSet::new();
        for stage in &self.stages {
            if !seen.insert(stage.ion) {
                return Err(invalid(format!("stage {} is listed twice", stage.ion)));
            }
        }
        if let Some([min, max]) = self.wavelength_range {
            let window = WavelengthWindow::new(min, max);
            if !window.is_valid() {
                return Err(invalid(format!(
                    "wavelength_range must satisfy 0 < min < max, got [{min}, {max}]"
                )));
            }
            self.check_width(&window)?;
        }
        if let WidthModel::Constant { fwhm } = self.broadening.fwhm {
            if !fwhm.is_finite() || fwhm <= 0.0 {
                return Err(invalid(format!("broadening fwhm must be > 0, got {fwhm}")));
            }
        }
        if let Some(samples) = self.broadening.samples {
            if samples < 2 {
                return Err(invalid(format!(
                    "broadening samples must be at least 2, got {samples}"
                )));
            }
        }
        if self.workers == Some(0) {
            return Err(invalid("workers must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Rejects a width model that is not positive across `window`.
    pub fn check_width(&self, window: &WavelengthWindow) -> Result<(), ProjectConfigError> {
        self.broadening
            .fwhm
            .check_over(window)
            .map_err(|error| ProjectConfigError::Invalid {
                path: self.base_dir.clone(),
                reason: format!("broadening fwhm: {error}"),
            })
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn atomic_structure(&self) -> SynthResult<AtomicStructure> {
        let atomic_number = self.element.atomic_number;
        let atom = match &self.element.ionization_energies {
            Some(energies) => {
                AtomicStructure::with_ionization_energies(atomic_number, energies.clone())?
            }
            None => AtomicStructure::new(atomic_number)?,
        };
        Ok(atom)
    }

    /// The measured spectrum, clipped to `wavelength_range` when one is set.
    pub fn load_experimental(&self) -> SynthResult<ExperimentalSpectrum> {
        let spectrum = ExperimentalSpectrum::load(self.resolve(&self.experimental))?;
        match self.wavelength_range {
            Some([min, max]) => Ok(spectrum.restrict_to(min, max)?),
            None => Ok(spectrum),
        }
    }

    pub fn load_stage_lines(&self) -> SynthResult<BTreeMap<u32, LineList>> {
        self.stages
            .iter()
            .map(|stage| {
                LineList::load(self.resolve(&stage.line_list))
                    .map(|lines| (stage.ion, lines))
                    .map_err(SynthError::from)
            })
            .collect()
    }

    pub fn window(&self, experimental: &ExperimentalSpectrum) -> WavelengthWindow {
        match self.wavelength_range {
            Some([min, max]) => WavelengthWindow::new(min, max),
            None => {
                let (min, max) = experimental.wavelength_range();
                WavelengthWindow::new(min, max)
            }
        }
    }

    pub fn axis(&self, experimental: &ExperimentalSpectrum) -> AxisSpec {
        match self.broadening.samples {
            Some(samples) => AxisSpec::Samples(samples),
            None => AxisSpec::Wavelengths(experimental.wavelengths().to_vec()),
        }
    }

    pub fn engine(&self) -> BroadeningEngine {
        BroadeningEngine::new(self.broadening.fwhm)
            .with_population_level(self.broadening.population_level)
    }

    pub fn scan_grid(&self) -> SynthResult<ScanGrid> {
        let grid = self.grid.ok_or_else(|| {
            SynthError::input_validation(
                "INPUT.PROJECT_CONFIG",
                "project file has no 'grid' section to scan",
            )
        })?;
        Ok(ScanGrid::from_axes(&grid.temperature, &grid.density)?)
    }

    pub fn workers(&self) -> usize {
        self.workers.unwrap_or_else(default_workers)
    }
}
