// src/rewards.rs
//
// Pure reward / metric functions.
//
// - blend_total_score: w * green + (1 - w) * reliability
// - energy_consumption: kWh for sealing new data plus keeping total data
// - miner_utility: storage revenue minus energy cost minus certificate cost
// - green_aggregate / reliability_aggregate: storage-share weighted means
// - planner_welfare: green + reliability aggregates
//
// Nothing in here touches state or randomness.

use crate::config::{EnergyModel, RevenueModel};

/// Bytes per (decimal) gigabyte.
pub const BYTES_PER_GB: f64 = 1e9;

/// TotalScore for green-score weight `weight`.
#[inline]
pub fn blend_total_score(weight: f64, green: f64, reliability: f64) -> f64 {
    weight * green + (1.0 - weight) * reliability
}

/// Energy (kWh) consumed in one tick by a miner that received `new_data`
/// bytes and now stores `total_data` bytes.
///
/// Monotonic non-decreasing in both arguments for non-negative coefficients.
pub fn energy_consumption(new_data: f64, total_data: f64, model: &EnergyModel) -> f64 {
    let sealing = model.sealing_kwh_per_gb * (new_data / BYTES_PER_GB);
    let storage = model.storage_kwh_per_gb_tick * (total_data / BYTES_PER_GB);
    (sealing + storage).max(0.0)
}

/// Optimization metric of a miner.
pub fn miner_utility(
    new_data: f64,
    total_data: f64,
    energy_price: f64,
    recs_price: f64,
    energy: &EnergyModel,
    revenue: &RevenueModel,
) -> f64 {
    let income = revenue.revenue_per_gb * (new_data / BYTES_PER_GB);
    let energy_cost = energy_price * energy_consumption(new_data, total_data, energy);
    income - energy_cost - recs_price
}

/// Share of total stored data held by each miner.
///
/// Uniform shares when nothing is stored yet.
pub fn storage_shares(storage: &[f64]) -> Vec<f64> {
    if storage.is_empty() {
        return Vec::new();
    }
    let total: f64 = storage.iter().sum();
    if total > 0.0 {
        storage.iter().map(|s| s / total).collect()
    } else {
        vec![1.0 / storage.len() as f64; storage.len()]
    }
}

fn share_weighted_mean(scores: &[f64], storage: &[f64]) -> f64 {
    debug_assert_eq!(scores.len(), storage.len());
    storage_shares(storage)
        .iter()
        .zip(scores)
        .map(|(share, score)| share * score)
        .sum()
}

/// System greenness: green scores weighted by storage share.
pub fn green_aggregate(green_scores: &[f64], storage: &[f64]) -> f64 {
    share_weighted_mean(green_scores, storage)
}

/// System reliability: reliability scores weighted by storage share.
pub fn reliability_aggregate(reliability_scores: &[f64], storage: &[f64]) -> f64 {
    share_weighted_mean(reliability_scores, storage)
}

/// Optimization metric of the planner.
pub fn planner_welfare(green_scores: &[f64], reliability_scores: &[f64], storage: &[f64]) -> f64 {
    green_aggregate(green_scores, storage) + reliability_aggregate(reliability_scores, storage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_endpoints() {
        assert_eq!(blend_total_score(0.0, 0.3, 0.9), 0.9);
        assert_eq!(blend_total_score(1.0, 0.3, 0.9), 0.3);
        assert!((blend_total_score(0.5, 0.2, 0.6) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_energy_is_monotonic() {
        let model = EnergyModel::default();
        let base = energy_consumption(0.0, 32e9, &model);
        assert!(energy_consumption(32e9, 32e9, &model) > base);
        assert!(energy_consumption(0.0, 64e9, &model) > base);
        assert_eq!(energy_consumption(0.0, 0.0, &model), 0.0);
    }

    #[test]
    fn test_miner_utility_components() {
        let energy = EnergyModel {
            sealing_kwh_per_gb: 1.0,
            storage_kwh_per_gb_tick: 0.0,
        };
        let revenue = RevenueModel { revenue_per_gb: 2.0 };
        // 1 GB new: income 2.0, energy 1 kWh at 0.5 => 0.5, certificates 0.25.
        let u = miner_utility(1e9, 1e9, 0.5, 0.25, &energy, &revenue);
        assert!((u - 1.25).abs() < 1e-12);

        // Idle miner with no storage earns and spends nothing.
        assert_eq!(miner_utility(0.0, 0.0, 0.5, 0.0, &energy, &revenue), 0.0);
    }

    #[test]
    fn test_shares_uniform_without_storage() {
        assert_eq!(storage_shares(&[0.0, 0.0]), vec![0.5, 0.5]);
        assert_eq!(storage_shares(&[1.0, 3.0]), vec![0.25, 0.75]);
        assert!(storage_shares(&[]).is_empty());
    }

    #[test]
    fn test_planner_welfare_weights_by_storage() {
        let green = [1.0, 0.0];
        let rel = [0.0, 1.0];
        // Only the second miner stores data.
        let w = planner_welfare(&green, &rel, &[0.0, 10.0]);
        assert!((w - 1.0).abs() < 1e-12);
        assert!((green_aggregate(&green, &[0.0, 10.0]) - 0.0).abs() < 1e-12);
        assert!((reliability_aggregate(&rel, &[1.0, 1.0]) - 0.5).abs() < 1e-12);
    }
}
