mod parser;

pub use parser::parse_line_list_source;

use crate::domain::SynthError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const LINE_LIST_COLUMN_COUNT: usize = 8;

/// One radiative transition between two levels of an ion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub energy_lower: f64,
    pub energy_upper: f64,
    /// Transition energy in eV.
    pub transition_energy: f64,
    /// Weighted oscillator strength `gf`; only its magnitude is used.
    pub strength: f64,
    pub index_lower: i64,
    pub index_upper: i64,
    pub j_lower: f64,
    pub j_upper: f64,
}

impl Transition {
    pub fn wavelength_nm(&self) -> f64 {
        crate::common::constants::energy_to_wavelength(self.transition_energy)
    }

    pub fn level_pair(&self) -> (i64, i64) {
        (self.index_lower, self.index_upper)
    }
}

/// Immutable transition table for one ionization stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineList {
    source: String,
    transitions: Vec<Transition>,
}

#[derive(Debug, thiserror::Error)]
pub enum LineListError {
    #[error("failed to read line list '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("expected 8 columns at line {line} of '{source_label}', found {found}")]
    ColumnCount {
        source_label: String,
        line: usize,
        found: usize,
    },
    #[error("column {column} at line {line} of '{source_label}' is not a number: '{value}'")]
    InvalidNumber {
        source_label: String,
        line: usize,
        column: usize,
        value: String,
    },
    #[error("level index in column {column} at line {line} of '{source_label}' is not an integer: {value}")]
    NonIntegralIndex {
        source_label: String,
        line: usize,
        column: usize,
        value: f64,
    },
}

impl LineList {
    pub fn new(source: impl Into<String>, transitions: Vec<Transition>) -> Self {
        Self {
            source: source.into(),
            transitions,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LineListError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| LineListError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let label = path.display().to_string();
        let transitions = parse_line_list_source(&label, &text)?;
        Ok(Self::new(label, transitions))
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transition> {
        self.transitions.iter()
    }
}

impl<'a> IntoIterator for &'a LineList {
    type Item = &'a Transition;
    type IntoIter = std::slice::Iter<'a, Transition>;

    fn into_iter(self) -> Self::IntoIter {
        self.transitions.iter()
    }
}

impl From<LineListError> for SynthError {
    fn from(error: LineListError) -> Self {
        match error {
            LineListError::Read { .. } => SynthError::io_system("IO.LINE_LIST", error.to_string()),
            _ => SynthError::input_validation("INPUT.LINE_LIST", error.to_string()),
        }
    }
}
