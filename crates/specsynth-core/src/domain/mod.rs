pub mod errors;

pub use errors::{ComputeResult, SynthError, SynthErrorCategory, SynthResult};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

/// Selects one of the three broadened curves carried by a stage spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveKind {
    Gaussian,
    CrossUnweighted,
    #[default]
    CrossWeighted,
}

impl CurveKind {
    pub const ALL: [CurveKind; 3] = [
        CurveKind::Gaussian,
        CurveKind::CrossUnweighted,
        CurveKind::CrossWeighted,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gaussian => "gaussian",
            Self::CrossUnweighted => "cross_unweighted",
            Self::CrossWeighted => "cross_weighted",
        }
    }
}

impl Display for CurveKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

impl FromStr for CurveKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gaussian" | "gauss" => Ok(Self::Gaussian),
            "cross_unweighted" | "cross_np" | "cross-np" => Ok(Self::CrossUnweighted),
            "cross_weighted" | "cross_p" | "cross-p" => Ok(Self::CrossWeighted),
            other => Err(format!(
                "unknown curve '{other}', expected one of gaussian, cross_unweighted, cross_weighted"
            )),
        }
    }
}

/// Similarity metric used to compare a synthetic and an experimental spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMethod {
    NearestPoint,
    RSquared,
    DynamicTimeWarping,
    #[default]
    Pearson,
}

impl SimilarityMethod {
    pub const ALL: [SimilarityMethod; 4] = [
        SimilarityMethod::NearestPoint,
        SimilarityMethod::RSquared,
        SimilarityMethod::DynamicTimeWarping,
        SimilarityMethod::Pearson,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NearestPoint => "nearest_point",
            Self::RSquared => "r_squared",
            Self::DynamicTimeWarping => "dynamic_time_warping",
            Self::Pearson => "pearson",
        }
    }

    /// Distances improve downwards, correlations upwards.
    pub const fn higher_is_better(self) -> bool {
        matches!(self, Self::RSquared | Self::Pearson)
    }
}

impl Display for SimilarityMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

impl FromStr for SimilarityMethod {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "nearest_point" | "nearest" => Ok(Self::NearestPoint),
            "r_squared" | "r2" => Ok(Self::RSquared),
            "dynamic_time_warping" | "dtw" => Ok(Self::DynamicTimeWarping),
            "pearson" | "correlation" => Ok(Self::Pearson),
            other => Err(format!(
                "unknown similarity method '{other}', expected one of nearest_point, r_squared, dynamic_time_warping, pearson"
            )),
        }
    }
}

/// One (temperature, electron density) sample of the plasma parameter space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlasmaPoint {
    pub temperature: f64,
    pub electron_density: f64,
}

impl PlasmaPoint {
    pub const fn new(temperature: f64, electron_density: f64) -> Self {
        Self {
            temperature,
            electron_density,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComputeModule {
    Broaden,
    Abundance,
    Synthesize,
    Scan,
}

impl ComputeModule {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Broaden => "BROADEN",
            Self::Abundance => "ABUNDANCE",
            Self::Synthesize => "SYNTHESIZE",
            Self::Scan => "SCAN",
        }
    }
}

impl Display for ComputeModule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// A module run: which project to read, where artifacts go, and the plasma
/// parameters the single-point modules need.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputeRequest {
    pub module: ComputeModule,
    pub config_path: PathBuf,
    pub output_dir: PathBuf,
    pub temperature: Option<f64>,
    pub electron_density: Option<f64>,
    /// Overrides the project's worker count.
    pub workers: Option<usize>,
    /// Overrides the project's similarity metric.
    pub similarity: Option<SimilarityMethod>,
    /// Also write one broadened spectrum per transition group.
    pub transition_groups: bool,
}

impl ComputeRequest {
    pub fn new(
        module: ComputeModule,
        config_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            module,
            config_path: config_path.into(),
            output_dir: output_dir.into(),
            temperature: None,
            electron_density: None,
            workers: None,
            similarity: None,
            transition_groups: false,
        }
    }

    pub fn with_point(mut self, point: PlasmaPoint) -> Self {
        self.temperature = Some(point.temperature);
        self.electron_density = Some(point.electron_density);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_similarity(mut self, similarity: SimilarityMethod) -> Self {
        self.similarity = Some(similarity);
        self
    }

    pub fn with_transition_groups(mut self, enabled: bool) -> Self {
        self.transition_groups = enabled;
        self
    }

    pub fn require_temperature(&self) -> SynthResult<f64> {
        self.temperature.ok_or_else(|| {
            SynthError::input_validation(
                "INPUT.PLASMA_POINT",
                format!("{} needs a temperature", self.module),
            )
        })
    }

    pub fn require_point(&self) -> SynthResult<PlasmaPoint> {
        match (self.temperature, self.electron_density) {
            (Some(temperature), Some(electron_density)) => {
                Ok(PlasmaPoint::new(temperature, electron_density))
            }
            _ => Err(SynthError::input_validation(
                "INPUT.PLASMA_POINT",
                format!(
                    "{} needs a temperature and an electron density",
                    self.module
                ),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeArtifact {
    pub relative_path: PathBuf,
}

impl ComputeArtifact {
    pub fn new(relative_path: impl Into<PathBuf>) -> Self {
        Self {
            relative_path: relative_path.into(),
        }
    }
}
