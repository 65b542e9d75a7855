//! Ionization-stage abundances from a corona-type rate balance.
//!
//! Each stage `k` contributes a collisional ionization rate `S_k` and a
//! recombination rate `Ar_k + Ne·A3r_k`; their ratio links the populations of
//! neighbouring stages. Two strategies turn the ratio chain into fractions,
//! each with its own stage convention:
//!
//! * [`RatioTelescoping`] telescopes `a_k = a_{k-1}·ratio_{k-1}` over stages
//!   `0..=Z` (or the reduced `1..=Z-1` form);
//! * [`IterativeChain`] back-propagates populations over stages `0..Z` and also
//!   reports the mean ionization.

mod rates;

use crate::domain::SynthError;
use crate::modules::atomic::AtomicStructure;
use crate::numerics::stable_sum;
use rates::log_stage_ratios;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IonBalanceError {
    #[error("invalid plasma parameters: {reason}")]
    InvalidPlasmaParameters { reason: String },
    #[error("the reduced stage form needs at least two stages, Z={atomic_number}")]
    ReducedFormUnavailable { atomic_number: usize },
}

impl From<IonBalanceError> for SynthError {
    fn from(error: IonBalanceError) -> Self {
        SynthError::computation("RUN.ION_BALANCE", error.to_string())
    }
}

/// Fractional abundance per ionization stage, starting at `first_stage`.
/// Entries are non-negative and sum to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbundanceVector {
    first_stage: u32,
    fractions: Vec<f64>,
}

impl AbundanceVector {
    /// Normalizes log-weights into fractions; the maximum is subtracted before
    /// exponentiation so long chains stay finite.
    fn from_log_weights(first_stage: u32, log_weights: &[f64]) -> Result<Self, IonBalanceError> {
        let peak = log_weights
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        if !peak.is_finite() {
            return Err(IonBalanceError::InvalidPlasmaParameters {
                reason: "stage populations are not finite".to_string(),
            });
        }

        let weights: Vec<f64> = log_weights.iter().map(|w| (w - peak).exp()).collect();
        let total = stable_sum(&weights);
        Ok(Self {
            first_stage,
            fractions: weights.iter().map(|w| w / total).collect(),
        })
    }

    pub fn first_stage(&self) -> u32 {
        self.first_stage
    }

    pub fn last_stage(&self) -> u32 {
        self.first_stage + self.fractions.len().saturating_sub(1) as u32
    }

    pub fn fractions(&self) -> &[f64] {
        &self.fractions
    }

    pub fn len(&self) -> usize {
        self.fractions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fractions.is_empty()
    }

    /// Fraction of `stage`; zero for stages outside the vector.
    pub fn fraction(&self, stage: u32) -> f64 {
        stage
            .checked_sub(self.first_stage)
            .and_then(|offset| self.fractions.get(offset as usize))
            .copied()
            .unwrap_or(0.0)
    }

    /// `(stage, fraction)` pairs in stage order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.fractions
            .iter()
            .enumerate()
            .map(|(offset, fraction)| (self.first_stage + offset as u32, *fraction))
    }

    pub fn dominant_stage(&self) -> Option<u32> {
        self.iter()
            .max_by(|lhs, rhs| lhs.1.total_cmp(&rhs.1))
            .map(|(stage, _)| stage)
    }
}

pub trait AbundanceStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn abundances(
        &self,
        atom: &AtomicStructure,
        temperature: f64,
        electron_density: f64,
    ) -> Result<AbundanceVector, IonBalanceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageForm {
    /// Stages `0..=Z`.
    #[default]
    Full,
    /// Stages `1..=Z-1`.
    Reduced,
}

/// Closed-form telescoping of adjacent-stage ratios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RatioTelescoping {
    pub form: StageForm,
}

impl RatioTelescoping {
    pub const fn full() -> Self {
        Self {
            form: StageForm::Full,
        }
    }

    pub const fn reduced() -> Self {
        Self {
            form: StageForm::Reduced,
        }
    }
}

impl AbundanceStrategy for RatioTelescoping {
    fn name(&self) -> &'static str {
        match self.form {
            StageForm::Full => "ratio_telescoping",
            StageForm::Reduced => "ratio_telescoping_reduced",
        }
    }

    fn abundances(
        &self,
        atom: &AtomicStructure,
        temperature: f64,
        electron_density: f64,
    ) -> Result<AbundanceVector, IonBalanceError> {
        validate_plasma(temperature, electron_density)?;
        let z = atom.atomic_number();

        let (first_stage, log_ratios) = match self.form {
            StageForm::Full => (
                0,
                log_stage_ratios(atom, 0..=z - 1, temperature, electron_density)?,
            ),
            StageForm::Reduced => {
                if z < 2 {
                    return Err(IonBalanceError::ReducedFormUnavailable { atomic_number: z });
                }
                let ratios = if z == 2 {
                    Vec::new()
                } else {
                    log_stage_ratios(atom, 1..=z - 2, temperature, electron_density)?
                };
                (1, ratios)
            }
        };

        let mut log_weights = Vec::with_capacity(log_ratios.len() + 1);
        let mut accumulated = 0.0;
        log_weights.push(accumulated);
        for log_ratio in log_ratios {
            accumulated += log_ratio;
            log_weights.push(accumulated);
        }

        let vector = AbundanceVector::from_log_weights(first_stage, &log_weights)?;
        debug!(
            strategy = self.name(),
            temperature,
            electron_density,
            dominant = ?vector.dominant_stage(),
            "computed abundances"
        );
        Ok(vector)
    }
}

/// Iterative back-propagation of stage populations over stages `0..Z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IterativeChain;

/// Result of [`IterativeChain::solve`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSolution {
    pub abundances: AbundanceVector,
    /// `Ne / Σ Rat_k`.
    pub average_ionization: f64,
}

impl IterativeChain {
    pub fn solve(
        &self,
        atom: &AtomicStructure,
        temperature: f64,
        electron_density: f64,
    ) -> Result<ChainSolution, IonBalanceError> {
        validate_plasma(temperature, electron_density)?;
        let z = atom.atomic_number();
        let log_co = log_stage_ratios(atom, 0..=z - 1, temperature, electron_density)?;

        // log CoM_k = Σ_{j<=k} log Co_j
        let mut log_cumulative = Vec::with_capacity(z);
        let mut accumulated = 0.0;
        for log_ratio in &log_co {
            accumulated += log_ratio;
            log_cumulative.push(accumulated);
        }

        // Rat_0 = Ne / Σ (k+1)·CoM_k and Rat_k = Co_{k-1}·Rat_{k-1} = Rat_0·CoM_{k-1}.
        // Relative populations therefore follow [1, CoM_0, .., CoM_{Z-2}].
        let mut log_relative = Vec::with_capacity(z);
        log_relative.push(0.0);
        log_relative.extend(log_cumulative.iter().take(z.saturating_sub(1)).copied());
        let abundances = AbundanceVector::from_log_weights(0, &log_relative)?;

        let shift = log_cumulative
            .iter()
            .copied()
            .fold(0.0_f64, f64::max);
        let weighted_sum = stable_sum(
            &log_cumulative
                .iter()
                .enumerate()
                .map(|(k, log_value)| (k as f64 + 1.0) * (log_value - shift).exp())
                .collect::<Vec<_>>(),
        );
        let relative_sum = stable_sum(
            &log_relative
                .iter()
                .map(|log_value| (log_value - shift).exp())
                .collect::<Vec<_>>(),
        );
        // Ne / Σ Rat = Ne / (Rat_0 · Σ relative) = Σ (k+1)·CoM_k / Σ relative
        let average_ionization = weighted_sum / relative_sum;

        debug!(
            temperature,
            electron_density,
            average_ionization,
            dominant = ?abundances.dominant_stage(),
            "solved iterative chain"
        );
        Ok(ChainSolution {
            abundances,
            average_ionization,
        })
    }
}

impl AbundanceStrategy for IterativeChain {
    fn name(&self) -> &'static str {
        "iterative_chain"
    }

    fn abundances(
        &self,
        atom: &AtomicStructure,
        temperature: f64,
        electron_density: f64,
    ) -> Result<AbundanceVector, IonBalanceError> {
        self.solve(atom, temperature, electron_density)
            .map(|solution| solution.abundances)
    }
}

/// Strategy selector used by project files and the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbundanceStrategyKind {
    #[default]
    RatioTelescoping,
    RatioTelescopingReduced,
    IterativeChain,
}

impl AbundanceStrategyKind {
    pub fn strategy(self) -> Box<dyn AbundanceStrategy> {
        match self {
            Self::RatioTelescoping => Box::new(RatioTelescoping::full()),
            Self::RatioTelescopingReduced => Box::new(RatioTelescoping::reduced()),
            Self::IterativeChain => Box::new(IterativeChain),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RatioTelescoping => "ratio_telescoping",
            Self::RatioTelescopingReduced => "ratio_telescoping_reduced",
            Self::IterativeChain => "iterative_chain",
        }
    }
}

impl Display for AbundanceStrategyKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

impl std::str::FromStr for AbundanceStrategyKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ratio_telescoping" | "telescoping" => Ok(Self::RatioTelescoping),
            "ratio_telescoping_reduced" | "reduced" => Ok(Self::RatioTelescopingReduced),
            "iterative_chain" | "chain" => Ok(Self::IterativeChain),
            other => Err(format!(
                "unknown abundance strategy '{other}', expected one of ratio_telescoping, ratio_telescoping_reduced, iterative_chain"
            )),
        }
    }
}

fn validate_plasma(temperature: f64, electron_density: f64) -> Result<(), IonBalanceError> {
    if !temperature.is_finite() || temperature <= 0.0 {
        return Err(IonBalanceError::InvalidPlasmaParameters {
            reason: format!("temperature must be finite and > 0, got {temperature}"),
        });
    }
    if !electron_density.is_finite() || electron_density <= 0.0 {
        return Err(IonBalanceError::InvalidPlasmaParameters {
            reason: format!("electron density must be finite and > 0, got {electron_density}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        AbundanceStrategy, AbundanceStrategyKind, IonBalanceError, IterativeChain,
        RatioTelescoping,
    };
    use crate::modules::atomic::AtomicStructure;

    fn assert_normalized(fractions: &[f64]) {
        assert!(fractions.iter().all(|fraction| *fraction >= 0.0));
        let total: f64 = fractions.iter().sum();
        assert!((total - 1.0).abs() < 1.0e-9, "sum was {total}");
    }

    #[test]
    fn fractions_are_normalized_across_the_valid_plasma_range() {
        let strategies: [Box<dyn AbundanceStrategy>; 3] = [
            Box::new(RatioTelescoping::full()),
            Box::new(RatioTelescoping::reduced()),
            Box::new(IterativeChain),
        ];
        for atomic_number in [13, 32] {
            let atom = AtomicStructure::new(atomic_number).expect("tabulated");
            for temperature in [1.0, 5.0, 25.0, 80.0, 400.0] {
                for density in [1.0e14, 1.0e17, 1.0e20, 1.0e23] {
                    for strategy in &strategies {
                        let vector = strategy
                            .abundances(&atom, temperature, density)
                            .expect("valid plasma");
                        assert_normalized(vector.fractions());
                    }
                }
            }
        }
    }

    #[test]
    fn stage_conventions_differ_between_strategies() {
        let atom = AtomicStructure::new(13).expect("Al");

        let full = RatioTelescoping::full()
            .abundances(&atom, 25.0, 1.0e20)
            .expect("full form");
        assert_eq!(full.first_stage(), 0);
        assert_eq!(full.len(), 14);
        assert_eq!(full.last_stage(), 13);

        let reduced = RatioTelescoping::reduced()
            .abundances(&atom, 25.0, 1.0e20)
            .expect("reduced form");
        assert_eq!(reduced.first_stage(), 1);
        assert_eq!(reduced.len(), 12);
        assert_eq!(reduced.fraction(0), 0.0);
        assert_eq!(reduced.fraction(13), 0.0);

        let chain = IterativeChain
            .abundances(&atom, 25.0, 1.0e20)
            .expect("chain");
        assert_eq!(chain.first_stage(), 0);
        assert_eq!(chain.len(), 13);
    }

    #[test]
    fn chain_matches_telescoping_without_the_bare_nucleus() {
        let atom = AtomicStructure::new(13).expect("Al");
        let full = RatioTelescoping::full()
            .abundances(&atom, 30.0, 1.0e21)
            .expect("full form");
        let chain = IterativeChain
            .abundances(&atom, 30.0, 1.0e21)
            .expect("chain");

        let truncated_total: f64 = full.fractions()[..13].iter().sum();
        for stage in 0..13 {
            let expected = full.fraction(stage) / truncated_total;
            assert!((chain.fraction(stage) - expected).abs() < 1.0e-12);
        }
    }

    #[test]
    fn hotter_plasma_shifts_abundance_to_higher_stages() {
        let atom = AtomicStructure::new(13).expect("Al");
        let strategy = RatioTelescoping::full();
        let cold = strategy
            .abundances(&atom, 5.0, 1.0e20)
            .expect("cold")
            .dominant_stage()
            .expect("non-empty");
        let hot = strategy
            .abundances(&atom, 60.0, 1.0e20)
            .expect("hot")
            .dominant_stage()
            .expect("non-empty");
        assert!(hot > cold, "hot {hot} vs cold {cold}");
    }

    #[test]
    fn single_stage_element_keeps_everything_in_the_lowest_stage() {
        let hydrogen = AtomicStructure::with_ionization_energies(1, vec![13.6]).expect("H");
        let solution = IterativeChain.solve(&hydrogen, 25.0, 1.0e-6).expect("chain");
        assert_eq!(solution.abundances.fractions(), &[1.0]);
        assert!(solution.average_ionization.is_finite());

        assert_eq!(
            RatioTelescoping::reduced().abundances(&hydrogen, 25.0, 1.0e20),
            Err(IonBalanceError::ReducedFormUnavailable { atomic_number: 1 })
        );
    }

    #[test]
    fn vanishing_density_empties_the_neutral_stage_of_long_chains() {
        let germanium = AtomicStructure::new(32).expect("Ge");
        let strategies: [&dyn AbundanceStrategy; 2] = [&RatioTelescoping::full(), &IterativeChain];
        for strategy in strategies {
            let thin = strategy
                .abundances(&germanium, 25.0, 1.0e-6)
                .expect("thin plasma");
            let thinner = strategy
                .abundances(&germanium, 25.0, 1.0e-12)
                .expect("thinner plasma");

            assert_normalized(thin.fractions());
            // The neutral stage has no radiative recombination, only three-body.
            assert!(thin.fraction(0) < 1.0e-20, "{}", strategy.name());
            assert_ne!(thin.dominant_stage(), Some(0));
            assert_eq!(thin.dominant_stage(), thinner.dominant_stage());
            for stage in 1..=thin.last_stage() {
                assert!((thin.fraction(stage) - thinner.fraction(stage)).abs() < 1.0e-12);
            }
        }
    }

    #[test]
    fn thinner_plasma_is_at_least_as_ionized() {
        let atom = AtomicStructure::new(13).expect("Al");
        let dense = IterativeChain.abundances(&atom, 25.0, 1.0e22).expect("dense");
        let thin = IterativeChain.abundances(&atom, 25.0, 1.0e10).expect("thin");
        assert!(thin.dominant_stage() >= dense.dominant_stage());
    }

    #[test]
    fn long_chains_stay_finite() {
        let atom = AtomicStructure::new(32).expect("Ge");
        let vector = RatioTelescoping::full()
            .abundances(&atom, 0.5, 1.0e12)
            .expect("cold thin Ge");
        assert!(vector.fractions().iter().all(|fraction| fraction.is_finite()));
        assert_normalized(vector.fractions());
    }

    #[test]
    fn invalid_plasma_parameters_are_reported() {
        let atom = AtomicStructure::new(13).expect("Al");
        for (temperature, density) in [(0.0, 1.0e20), (-5.0, 1.0e20), (25.0, 0.0), (f64::NAN, 1.0)]
        {
            for kind in [
                AbundanceStrategyKind::RatioTelescoping,
                AbundanceStrategyKind::RatioTelescopingReduced,
                AbundanceStrategyKind::IterativeChain,
            ] {
                assert!(matches!(
                    kind.strategy().abundances(&atom, temperature, density),
                    Err(IonBalanceError::InvalidPlasmaParameters { .. })
                ));
            }
        }
    }

    #[test]
    fn strategy_kind_parses_from_project_names() {
        assert_eq!(
            "iterative_chain".parse::<AbundanceStrategyKind>(),
            Ok(AbundanceStrategyKind::IterativeChain)
        );
        let kind: AbundanceStrategyKind =
            serde_json::from_str("\"ratio_telescoping_reduced\"").expect("json");
        assert_eq!(kind.strategy().name(), "ratio_telescoping_reduced");
    }
}
