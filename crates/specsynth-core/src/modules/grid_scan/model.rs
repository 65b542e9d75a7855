use super::ScanError;
use crate::domain::SimilarityMethod;
use crate::numerics::{logarithmic_grid, single_or_linear_grid};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridSpacing {
    #[default]
    Linear,
    Logarithmic,
}

/// `count` samples from `start` to `stop` inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridAxis {
    pub start: f64,
    pub stop: f64,
    pub count: usize,
    #[serde(default)]
    pub spacing: GridSpacing,
}

impl GridAxis {
    pub const fn linear(start: f64, stop: f64, count: usize) -> Self {
        Self {
            start,
            stop,
            count,
            spacing: GridSpacing::Linear,
        }
    }

    pub const fn logarithmic(start: f64, stop: f64, count: usize) -> Self {
        Self {
            start,
            stop,
            count,
            spacing: GridSpacing::Logarithmic,
        }
    }

    pub fn values(&self, name: &'static str) -> Result<Vec<f64>, ScanError> {
        let invalid = |reason: &str| ScanError::InvalidAxis {
            name,
            reason: reason.to_string(),
        };
        if !self.start.is_finite() || !self.stop.is_finite() {
            return Err(invalid("bounds must be finite"));
        }

        let values = match self.spacing {
            GridSpacing::Linear => single_or_linear_grid(self.start, self.stop, self.count),
            GridSpacing::Logarithmic if self.count == 1 => Some(vec![self.start]),
            GridSpacing::Logarithmic => logarithmic_grid(self.start, self.stop, self.count),
        };
        values.ok_or_else(|| match self.count {
            0 => invalid("count must be at least 1"),
            _ => invalid("logarithmic bounds must be positive"),
        })
    }
}

/// Ordered temperature (columns) and density (rows) samples of a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanGrid {
    temperatures: Vec<f64>,
    densities: Vec<f64>,
}

impl ScanGrid {
    pub fn new(temperatures: Vec<f64>, densities: Vec<f64>) -> Result<Self, ScanError> {
        if temperatures.is_empty() {
            return Err(ScanError::InvalidAxis {
                name: "temperature",
                reason: "no samples".to_string(),
            });
        }
        if densities.is_empty() {
            return Err(ScanError::InvalidAxis {
                name: "density",
                reason: "no samples".to_string(),
            });
        }
        Ok(Self {
            temperatures,
            densities,
        })
    }

    pub fn from_axes(temperature: &GridAxis, density: &GridAxis) -> Result<Self, ScanError> {
        Self::new(temperature.values("temperature")?, density.values("density")?)
    }

    pub fn temperatures(&self) -> &[f64] {
        &self.temperatures
    }

    pub fn densities(&self) -> &[f64] {
        &self.densities
    }

    pub fn rows(&self) -> usize {
        self.densities.len()
    }

    pub fn columns(&self) -> usize {
        self.temperatures.len()
    }

    pub fn len(&self) -> usize {
        self.rows() * self.columns()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(row, column)` of a row-major cell index.
    pub fn coordinates(&self, index: usize) -> (usize, usize) {
        (index / self.columns(), index % self.columns())
    }
}

/// A grid cell whose computation failed; its score is NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellFailure {
    pub row: usize,
    pub column: usize,
    pub temperature: f64,
    pub electron_density: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestCell {
    pub row: usize,
    pub column: usize,
    pub temperature: f64,
    pub electron_density: f64,
    pub score: f64,
}

/// Scores indexed `[density row][temperature column]`, stored row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreMatrix {
    pub method: SimilarityMethod,
    pub temperatures: Vec<f64>,
    pub densities: Vec<f64>,
    #[serde(with = "nan_as_null")]
    pub scores: Vec<f64>,
    pub failures: Vec<CellFailure>,
}

impl ScoreMatrix {
    pub fn rows(&self) -> usize {
        self.densities.len()
    }

    pub fn columns(&self) -> usize {
        self.temperatures.len()
    }

    pub fn get(&self, row: usize, column: usize) -> Option<f64> {
        if row >= self.rows() || column >= self.columns() {
            return None;
        }
        self.scores.get(row * self.columns() + column).copied()
    }

    pub fn row(&self, row: usize) -> Option<&[f64]> {
        let columns = self.columns();
        self.scores.get(row * columns..(row + 1) * columns)
    }

    /// Best finite cell for the matrix's metric; ties keep the first cell in
    /// row-major order.
    pub fn best_cell(&self) -> Option<BestCell> {
        let higher_is_better = self.method.higher_is_better();
        let mut best: Option<(usize, f64)> = None;
        for (index, score) in self.scores.iter().copied().enumerate() {
            if !score.is_finite() {
                continue;
            }
            let improves = match best {
                None => true,
                Some((_, current)) if higher_is_better => score > current,
                Some((_, current)) => score < current,
            };
            if improves {
                best = Some((index, score));
            }
        }

        best.map(|(index, score)| {
            let row = index / self.columns();
            let column = index % self.columns();
            BestCell {
                row,
                column,
                temperature: self.temperatures[column],
                electron_density: self.densities[row],
                score,
            }
        })
    }
}

/// NaN cells travel as `null` in JSON.
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let cells: Vec<Option<f64>> = values
            .iter()
            .map(|value| value.is_finite().then_some(*value))
            .collect();
        cells.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let cells = Vec::<Option<f64>>::deserialize(deserializer)?;
        Ok(cells
            .into_iter()
            .map(|cell| cell.unwrap_or(f64::NAN))
            .collect())
    }
}
