mod configuration;

pub use configuration::{ConfigurationError, ElectronConfiguration};

use crate::common::elements::{element_symbol, ionization_energies};
use crate::domain::SynthError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Largest principal quantum number consulted by the outer-shell count.
const OUTER_SHELL_SEARCH_LIMIT: u32 = 6;

/// Static per-element data consumed by the ionization balance: atomic number,
/// symbol and the ionization energy of every stage `0..Z-1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomicStructure {
    atomic_number: usize,
    symbol: Cow<'static, str>,
    ionization_energies: Cow<'static, [f64]>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AtomicStructureError {
    #[error("atomic number {atomic_number} is outside the supported range 1..=100")]
    UnknownElement { atomic_number: usize },
    #[error("no ionization energy table is available for Z={atomic_number} ({symbol})")]
    UnsupportedElement {
        atomic_number: usize,
        symbol: &'static str,
    },
    #[error("expected {expected} ionization energies for Z={atomic_number}, got {actual}")]
    IonizationTableLength {
        atomic_number: usize,
        expected: usize,
        actual: usize,
    },
}

impl AtomicStructure {
    /// Builds the structure from the static tables. Elements without a table are rejected.
    pub fn new(atomic_number: usize) -> Result<Self, AtomicStructureError> {
        let symbol = element_symbol(atomic_number)
            .ok_or(AtomicStructureError::UnknownElement { atomic_number })?;
        let energies = ionization_energies(atomic_number).ok_or(
            AtomicStructureError::UnsupportedElement {
                atomic_number,
                symbol,
            },
        )?;

        Ok(Self {
            atomic_number,
            symbol: Cow::Borrowed(symbol),
            ionization_energies: Cow::Borrowed(energies),
        })
    }

    /// Builds the structure from a caller-supplied table with exactly `Z` entries.
    pub fn with_ionization_energies(
        atomic_number: usize,
        energies: Vec<f64>,
    ) -> Result<Self, AtomicStructureError> {
        let symbol = element_symbol(atomic_number)
            .ok_or(AtomicStructureError::UnknownElement { atomic_number })?;
        if energies.len() != atomic_number {
            return Err(AtomicStructureError::IonizationTableLength {
                atomic_number,
                expected: atomic_number,
                actual: energies.len(),
            });
        }

        Ok(Self {
            atomic_number,
            symbol: Cow::Borrowed(symbol),
            ionization_energies: Cow::Owned(energies),
        })
    }

    pub fn atomic_number(&self) -> usize {
        self.atomic_number
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn ionization_energies(&self) -> &[f64] {
        &self.ionization_energies
    }

    /// Energy needed to remove one electron from the `stage`-times ionized atom.
    pub fn ionization_energy(&self, stage: usize) -> Option<f64> {
        self.ionization_energies.get(stage).copied()
    }

    /// Electrons in the outermost occupied shell of the `stage`-times ionized
    /// atom, found by peeling off full shells of `2n²` electrons.
    pub fn outermost_electron_count(&self, stage: usize) -> u32 {
        let mut remaining = self.atomic_number.saturating_sub(stage) as u32;
        for n in 1..=OUTER_SHELL_SEARCH_LIMIT {
            let capacity = 2 * n * n;
            if remaining > capacity {
                remaining -= capacity;
            } else {
                break;
            }
        }
        remaining
    }
}

impl From<AtomicStructureError> for SynthError {
    fn from(error: AtomicStructureError) -> Self {
        match error {
            AtomicStructureError::UnsupportedElement { .. } => {
                SynthError::input_validation("INPUT.UNSUPPORTED_ELEMENT", error.to_string())
            }
            _ => SynthError::input_validation("INPUT.ELEMENT", error.to_string()),
        }
    }
}
