// src/endogenous.rs
//
// Endogenous state registry.
//
// Endogenous quantities are private, non-tradable attributes of a miner
// (scores, storage, energy, certificates). Internally they live in typed
// fields of `MinerState`; the `Endogenous` catalog and the by-name accessors
// exist only for the export boundary (observations, metrics, telemetry).

use serde::{Deserialize, Serialize};

use crate::rewards::blend_total_score;

/// Length of the green-score sliding window (one simulated day of ticks).
pub const DAY_WINDOW: usize = 24;

/// Name of the planner's endogenous weight field.
pub const GREEN_SCORE_IMPORTANCE: &str = "GreenScoreImportance";

/// Catalog of named endogenous quantities carried by every miner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Endogenous {
    /// Accumulated labor. Always present, unused by this economy.
    Labor,
    /// Bytes allocated to the miner during the current tick.
    NewData,
    /// Bytes the miner is storing in total.
    TotalData,
    /// Electricity price per kWh at the miner's location.
    EnergyPrice,
    /// Cost of the certificates bought during the current tick.
    RecsPrice,
    /// Current green score (window aggregate).
    GreenScore,
    /// Instantaneous green scores of the last day.
    GreenScoresLastDay,
    /// Renewable share of the miner's location, before certificates.
    InitialGreenScore,
    /// Fixed-per-episode operational dependability.
    ReliabilityScore,
    /// Blend of green and reliability score driving storage allocation.
    TotalScore,
    /// Energy consumed during the current tick (kWh).
    ConsumedEnergy,
}

impl Endogenous {
    pub const ALL: [Endogenous; 11] = [
        Endogenous::Labor,
        Endogenous::NewData,
        Endogenous::TotalData,
        Endogenous::EnergyPrice,
        Endogenous::RecsPrice,
        Endogenous::GreenScore,
        Endogenous::GreenScoresLastDay,
        Endogenous::InitialGreenScore,
        Endogenous::ReliabilityScore,
        Endogenous::TotalScore,
        Endogenous::ConsumedEnergy,
    ];

    /// Stable export name.
    pub fn name(&self) -> &'static str {
        match self {
            Endogenous::Labor => "Labor",
            Endogenous::NewData => "NewData",
            Endogenous::TotalData => "TotalData",
            Endogenous::EnergyPrice => "EnergyPrice",
            Endogenous::RecsPrice => "RECsPrice",
            Endogenous::GreenScore => "GreenScore",
            Endogenous::GreenScoresLastDay => "GreenScoresLastDay",
            Endogenous::InitialGreenScore => "InitialGreenScore",
            Endogenous::ReliabilityScore => "ReliabilityScore",
            Endogenous::TotalScore => "TotalScore",
            Endogenous::ConsumedEnergy => "ConsumedEnergy",
        }
    }

    /// Look a quantity up by its export name (exact match).
    pub fn parse(name: &str) -> Option<Endogenous> {
        Endogenous::ALL.iter().copied().find(|e| e.name() == name)
    }

    /// Whether the quantity is a single float (everything but the window).
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Endogenous::GreenScoresLastDay)
    }
}

/// Fixed-length FIFO of the last `DAY_WINDOW` samples, oldest first.
///
/// The length is part of the type, so the window can never grow or shrink.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWindow {
    values: [f64; DAY_WINDOW],
}

impl Default for ScoreWindow {
    fn default() -> Self {
        Self::filled(0.0)
    }
}

impl ScoreWindow {
    /// A window holding `value` in every slot.
    pub fn filled(value: f64) -> Self {
        Self {
            values: [value; DAY_WINDOW],
        }
    }

    /// Drop the oldest sample and append `value` as the newest.
    pub fn push(&mut self, value: f64) {
        self.values.rotate_left(1);
        self.values[DAY_WINDOW - 1] = value;
    }

    pub fn newest(&self) -> f64 {
        self.values[DAY_WINDOW - 1]
    }

    pub fn len(&self) -> usize {
        DAY_WINDOW
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Unweighted mean over the window.
    pub fn mean(&self) -> f64 {
        self.sum() / DAY_WINDOW as f64
    }

    /// Mean weighted slot-by-slot by `weights`.
    ///
    /// Falls back to the unweighted mean when the weights sum to zero.
    pub fn weighted_mean(&self, weights: &ScoreWindow) -> f64 {
        let total = weights.sum();
        if total > 0.0 {
            self.values
                .iter()
                .zip(weights.values.iter())
                .map(|(v, w)| v * w)
                .sum::<f64>()
                / total
        } else {
            self.mean()
        }
    }
}

/// Endogenous state of one miner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MinerState {
    pub labor: f64,
    pub new_data: f64,
    pub total_data: f64,
    pub energy_price: f64,
    pub recs_price: f64,
    pub green_score: f64,
    pub green_scores_last_day: ScoreWindow,
    pub initial_green_score: f64,
    pub reliability_score: f64,
    pub total_score: f64,
    pub consumed_energy: f64,
    /// Per-tick consumed energy of the last day, aligned with the green window.
    /// Not part of the exported catalog.
    pub energy_last_day: ScoreWindow,
}

impl MinerState {
    /// Scalar value of a catalog entry; `None` for the window.
    pub fn scalar(&self, key: Endogenous) -> Option<f64> {
        let v = match key {
            Endogenous::Labor => self.labor,
            Endogenous::NewData => self.new_data,
            Endogenous::TotalData => self.total_data,
            Endogenous::EnergyPrice => self.energy_price,
            Endogenous::RecsPrice => self.recs_price,
            Endogenous::GreenScore => self.green_score,
            Endogenous::GreenScoresLastDay => return None,
            Endogenous::InitialGreenScore => self.initial_green_score,
            Endogenous::ReliabilityScore => self.reliability_score,
            Endogenous::TotalScore => self.total_score,
            Endogenous::ConsumedEnergy => self.consumed_energy,
        };
        Some(v)
    }

    /// Scalar lookup by export name.
    pub fn get(&self, name: &str) -> Option<f64> {
        Endogenous::parse(name).and_then(|key| self.scalar(key))
    }

    /// All scalar quantities in catalog order, keyed by export name.
    pub fn scalars(&self) -> Vec<(&'static str, f64)> {
        Endogenous::ALL
            .iter()
            .filter_map(|key| self.scalar(*key).map(|v| (key.name(), v)))
            .collect()
    }

    /// Recompute `TotalScore` for the green-score weight `weight`.
    pub fn recompute_total_score(&mut self, weight: f64) {
        self.total_score = blend_total_score(weight, self.green_score, self.reliability_score);
    }
}

/// Endogenous state of the planner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlannerState {
    /// Weight `w` of the green score in every miner's TotalScore, in [0, 1].
    pub green_score_importance: f64,
}

impl PlannerState {
    pub fn get(&self, name: &str) -> Option<f64> {
        (name == GREEN_SCORE_IMPORTANCE).then_some(self.green_score_importance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip_through_parse() {
        for key in Endogenous::ALL {
            assert_eq!(Endogenous::parse(key.name()), Some(key));
        }
        assert_eq!(Endogenous::parse("RecsPrice"), None);
        assert_eq!(Endogenous::RecsPrice.name(), "RECsPrice");
    }

    #[test]
    fn test_window_push_is_fifo() {
        let mut w = ScoreWindow::filled(0.5);
        w.push(1.0);
        assert_eq!(w.len(), DAY_WINDOW);
        assert_eq!(w.newest(), 1.0);
        assert_eq!(w.as_slice()[0], 0.5);
        assert_eq!(w.as_slice()[DAY_WINDOW - 2], 0.5);

        for i in 0..DAY_WINDOW {
            w.push(i as f64);
        }
        // The 1.0 sample has been shifted out entirely.
        assert_eq!(w.as_slice()[0], 0.0);
        assert_eq!(w.newest(), (DAY_WINDOW - 1) as f64);
    }

    #[test]
    fn test_weighted_mean_falls_back_on_zero_energy() {
        let mut scores = ScoreWindow::filled(0.2);
        scores.push(0.8);
        let zero = ScoreWindow::default();
        assert!((scores.weighted_mean(&zero) - scores.mean()).abs() < 1e-12);

        let mut energy = ScoreWindow::default();
        energy.push(5.0);
        // All weight sits on the newest slot.
        assert!((scores.weighted_mean(&energy) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_scalars_skip_window_and_follow_catalog_order() {
        let state = MinerState {
            total_data: 64e9,
            reliability_score: 0.9,
            ..MinerState::default()
        };
        let scalars = state.scalars();
        assert_eq!(scalars.len(), Endogenous::ALL.len() - 1);
        assert_eq!(scalars[0].0, "Labor");
        assert_eq!(state.get("TotalData"), Some(64e9));
        assert_eq!(state.get("GreenScoresLastDay"), None);
        assert_eq!(state.get("Unknown"), None);
    }

    #[test]
    fn test_recompute_total_score_blends() {
        let mut state = MinerState {
            green_score: 1.0,
            reliability_score: 0.5,
            ..MinerState::default()
        };
        state.recompute_total_score(0.25);
        assert!((state.total_score - 0.625).abs() < 1e-12);
    }

    #[test]
    fn test_planner_lookup() {
        let planner = PlannerState {
            green_score_importance: 0.35,
        };
        assert_eq!(planner.get(GREEN_SCORE_IMPORTANCE), Some(0.35));
        assert_eq!(planner.get("TotalScore"), None);
    }
}
