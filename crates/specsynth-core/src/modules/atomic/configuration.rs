use crate::common::elements::{
    FILLING_ORDER, element_symbol, parse_subshell_label, subshell_capacity, subshell_label,
};
use crate::domain::SynthError;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

type Subshell = (u8, u8);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("atomic number {atomic_number} is outside the supported range 1..=100")]
    UnknownElement { atomic_number: usize },
    #[error("ionization stage {stage} exceeds atomic number {atomic_number}")]
    StageOutOfRange { atomic_number: usize, stage: usize },
    #[error("'{label}' is not a subshell of the filling sequence")]
    UnknownSubshell { label: String },
    #[error("no electron occupies subshell {label}")]
    EmptySubshell { label: String },
    #[error("subshell {label} is already full")]
    FullSubshell { label: String },
}

impl From<ConfigurationError> for SynthError {
    fn from(error: ConfigurationError) -> Self {
        SynthError::input_validation("INPUT.CONFIGURATION", error.to_string())
    }
}

/// Subshell occupation of one ion, starting from the ground state and
/// modified by single-electron excitations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectronConfiguration {
    atomic_number: usize,
    stage: usize,
    occupation: BTreeMap<Subshell, u32>,
}

impl ElectronConfiguration {
    pub fn ground_state(atomic_number: usize, stage: usize) -> Result<Self, ConfigurationError> {
        if element_symbol(atomic_number).is_none() {
            return Err(ConfigurationError::UnknownElement { atomic_number });
        }
        if stage > atomic_number {
            return Err(ConfigurationError::StageOutOfRange {
                atomic_number,
                stage,
            });
        }

        Ok(Self {
            atomic_number,
            stage,
            occupation: ground_occupation((atomic_number - stage) as u32),
        })
    }

    pub fn atomic_number(&self) -> usize {
        self.atomic_number
    }

    pub fn stage(&self) -> usize {
        self.stage
    }

    pub fn electron_count(&self) -> u32 {
        self.occupation.values().sum()
    }

    /// Occupied subshells in `(n, l)` order as `(label, electrons)`.
    pub fn arrangement(&self) -> Vec<(String, u32)> {
        self.occupation
            .iter()
            .filter_map(|(&(n, l), &count)| subshell_label(n, l).map(|label| (label, count)))
            .collect()
    }

    pub fn occupation(&self, label: &str) -> u32 {
        parse_subshell_label(label)
            .and_then(|subshell| self.occupation.get(&subshell).copied())
            .unwrap_or(0)
    }

    /// Compact configuration such as `3s02 3p01`: the open subshells plus the
    /// closed one preceding them. A closed-shell ion lists its last-filled
    /// subshell and its predecessor.
    pub fn configuration(&self) -> String {
        let occupied: Vec<(Subshell, u32)> = self
            .occupation
            .iter()
            .map(|(&subshell, &count)| (subshell, count))
            .collect();
        if occupied.is_empty() {
            return String::new();
        }

        let first_open = occupied
            .iter()
            .position(|&((_, l), count)| count != subshell_capacity(l));
        let anchor = match first_open {
            Some(index) => index,
            None => {
                let last_filled = self.last_filled_subshell();
                occupied
                    .iter()
                    .position(|(subshell, _)| Some(*subshell) == last_filled)
                    .unwrap_or(occupied.len() - 1)
            }
        };
        let start = anchor.saturating_sub(1);

        occupied[start..]
            .iter()
            .filter_map(|&((n, l), count)| {
                subshell_label(n, l).map(|label| format!("{label}{count:02}"))
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Moves one electron from `low` to `high`.
    pub fn excite(&mut self, low: &str, high: &str) -> Result<(), ConfigurationError> {
        let low_subshell = filling_subshell(low)?;
        let high_subshell = filling_subshell(high)?;

        let low_count = self.occupation.get(&low_subshell).copied().unwrap_or(0);
        if low_count == 0 {
            return Err(ConfigurationError::EmptySubshell {
                label: low.trim().to_string(),
            });
        }
        let high_count = self.occupation.get(&high_subshell).copied().unwrap_or(0);
        if high_count >= subshell_capacity(high_subshell.1) {
            return Err(ConfigurationError::FullSubshell {
                label: high.trim().to_string(),
            });
        }

        if low_count == 1 {
            self.occupation.remove(&low_subshell);
        } else {
            self.occupation.insert(low_subshell, low_count - 1);
        }
        self.occupation.insert(high_subshell, high_count + 1);
        Ok(())
    }

    pub fn revert_to_ground_state(&mut self) {
        self.occupation = ground_occupation((self.atomic_number - self.stage) as u32);
    }

    fn last_filled_subshell(&self) -> Option<Subshell> {
        FILLING_ORDER
            .iter()
            .rev()
            .find(|subshell| self.occupation.contains_key(subshell))
            .copied()
    }
}

impl Display for ElectronConfiguration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let symbol = element_symbol(self.atomic_number).unwrap_or("?");
        write!(
            f,
            "{:>3}  {:>2}  {}",
            self.atomic_number,
            symbol,
            self.configuration()
        )
    }
}

fn ground_occupation(electrons: u32) -> BTreeMap<Subshell, u32> {
    let mut occupation = BTreeMap::new();
    let mut remaining = electrons;
    for &(n, l) in &FILLING_ORDER {
        if remaining == 0 {
            break;
        }
        let placed = remaining.min(subshell_capacity(l));
        occupation.insert((n, l), placed);
        remaining -= placed;
    }
    occupation
}

fn filling_subshell(label: &str) -> Result<Subshell, ConfigurationError> {
    parse_subshell_label(label)
        .filter(|subshell| FILLING_ORDER.contains(subshell))
        .ok_or_else(|| ConfigurationError::UnknownSubshell {
            label: label.trim().to_string(),
        })
}
