// src/config.rs
//
// Central configuration for the storage-economy simulation.
//
// A `SimConfig` is immutable for the lifetime of an environment. It holds
// the population size and episode horizon, the scenario constants (selection,
// energy, revenue), the ordered list of policy components, and the
// initialization tables. Components are resolved from this list once, at
// environment construction.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{SimError, SimResult};
use crate::tables::InitTables;

/// What the scenario does when every selection weight is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroWeightPolicy {
    /// Draw uniformly among all miners and log a warning.
    #[default]
    Uniform,
    /// Abort the tick with `SimError::NumericDegeneracy`.
    Fail,
}

/// How a planner weight change reaches the miners' TotalScore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightPropagation {
    /// The planner only stores `w`; agent-side components blend it in.
    /// Action 0 is the no-op, `1..=levels` set `w = a / levels`.
    #[default]
    Deferred,
    /// The planner recomputes every miner's TotalScore at once.
    /// Every action `0..=levels` sets `w = a / levels`, so 0 means `w = 0`.
    Immediate,
}

/// How certificate purchases turn into a green score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecPurchaseMode {
    /// `pct = a * 0.05`; green score is the plain window mean.
    #[default]
    Flat,
    /// `pct = (a - 1) * 0.05` (actions 0 and 1 both buy nothing); green score is
    /// the window mean weighted by per-tick consumed energy.
    EnergyWeighted,
}

/// Planner-side component: sets the green-score weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GreenScoreImportanceConfig {
    /// Number of discrete weight levels; the weight step is `1 / levels`.
    pub levels: usize,
    /// Ticks between permitted weight changes.
    pub policy_interval: u64,
    pub propagation: WeightPropagation,
}

impl Default for GreenScoreImportanceConfig {
    fn default() -> Self {
        Self {
            levels: 20,
            policy_interval: 24,
            propagation: WeightPropagation::Deferred,
        }
    }
}

/// Agent-side component: buys renewable energy certificates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecPurchaseConfig {
    /// Number of purchasable packages (each 5% of consumed energy).
    pub packages: usize,
    /// Price per kWh per 100% coverage.
    pub rec_price: f64,
    pub mode: RecPurchaseMode,
    /// When set, blend TotalScore with this fixed weight instead of the
    /// planner's live weight.
    pub static_importance: Option<f64>,
}

impl Default for RecPurchaseConfig {
    fn default() -> Self {
        Self {
            packages: 20,
            rec_price: 0.007,
            mode: RecPurchaseMode::Flat,
            static_importance: None,
        }
    }
}

/// One entry of the ordered component list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComponentConfig {
    GreenScoreImportance(GreenScoreImportanceConfig),
    RecPurchase(RecPurchaseConfig),
}

impl ComponentConfig {
    fn is_planner_side(&self) -> bool {
        matches!(self, ComponentConfig::GreenScoreImportance(_))
    }
}

/// Which miners receive new data each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// `num_selected = max(1, num_agents / divisor)`.
    pub divisor: usize,
    /// Bytes allocated to a selected miner (one 32 GB sector).
    pub allocation_bytes: f64,
    pub zero_weight_policy: ZeroWeightPolicy,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            divisor: 10,
            allocation_bytes: 32e9,
            zero_weight_policy: ZeroWeightPolicy::Uniform,
        }
    }
}

/// Energy cost curve coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyModel {
    /// kWh to seal one GB of newly allocated data.
    pub sealing_kwh_per_gb: f64,
    /// kWh to keep one GB stored for one tick.
    pub storage_kwh_per_gb_tick: f64,
}

impl Default for EnergyModel {
    fn default() -> Self {
        Self {
            sealing_kwh_per_gb: 0.06,
            storage_kwh_per_gb_tick: 0.0005,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevenueModel {
    /// Income per GB of newly stored data.
    pub revenue_per_gb: f64,
}

impl Default for RevenueModel {
    fn default() -> Self {
        Self {
            revenue_per_gb: 0.02,
        }
    }
}

/// Coarse preset selecting one coherent model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelPreset {
    /// Deferred weight propagation, flat certificate mapping (20 packages).
    Deferred,
    /// Immediate weight propagation, energy-weighted green score (21 packages).
    Immediate,
}

impl ModelPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelPreset::Deferred => "deferred",
            ModelPreset::Immediate => "immediate",
        }
    }

    /// Parse a preset name (case-insensitive). Returns None if unrecognized.
    pub fn parse(s: &str) -> Option<ModelPreset> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deferred" | "d" | "" => Some(ModelPreset::Deferred),
            "immediate" | "i" => Some(ModelPreset::Immediate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of miners.
    pub num_agents: usize,
    /// Ticks per episode.
    pub episode_length: u64,
    pub selection: SelectionConfig,
    pub energy: EnergyModel,
    pub revenue: RevenueModel,
    /// Policy components in execution order.
    pub components: Vec<ComponentConfig>,
    pub tables: InitTables,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::for_preset(ModelPreset::Deferred)
    }
}

impl SimConfig {
    pub fn for_preset(preset: ModelPreset) -> Self {
        let (planner, recs) = match preset {
            ModelPreset::Deferred => (
                GreenScoreImportanceConfig::default(),
                RecPurchaseConfig::default(),
            ),
            ModelPreset::Immediate => (
                GreenScoreImportanceConfig {
                    propagation: WeightPropagation::Immediate,
                    ..GreenScoreImportanceConfig::default()
                },
                RecPurchaseConfig {
                    packages: 21,
                    mode: RecPurchaseMode::EnergyWeighted,
                    ..RecPurchaseConfig::default()
                },
            ),
        };

        Self {
            num_agents: 10,
            episode_length: 24 * 30,
            selection: SelectionConfig::default(),
            energy: EnergyModel::default(),
            revenue: RevenueModel::default(),
            components: vec![
                ComponentConfig::GreenScoreImportance(planner),
                ComponentConfig::RecPurchase(recs),
            ],
            tables: InitTables::default(),
        }
    }

    /// Parse a YAML document. Missing fields take their defaults.
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let cfg: SimConfig =
            serde_yaml::from_str(yaml).context("Failed to parse simulation config YAML")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load and validate a YAML config file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml_str(&raw).with_context(|| format!("Invalid config: {}", path.display()))
    }

    /// Build from the preset named by `GREENFIL_PRESET`, then apply the
    /// remaining environment overrides.
    ///
    /// Recognised variables:
    ///   - GREENFIL_PRESET           (deferred | immediate)
    ///   - GREENFIL_NUM_AGENTS       (usize)
    ///   - GREENFIL_EPISODE_LENGTH   (u64, ticks)
    ///   - GREENFIL_REC_PRICE        (f64)
    ///   - GREENFIL_POLICY_INTERVAL  (u64, ticks)
    ///
    /// Any variable that fails to parse is ignored with a warning.
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env_or_default`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let preset = match lookup("GREENFIL_PRESET") {
            Some(raw) => ModelPreset::parse(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "unknown GREENFIL_PRESET; using deferred");
                ModelPreset::Deferred
            }),
            None => ModelPreset::Deferred,
        };
        let mut cfg = Self::for_preset(preset);

        if let Some(v) = parse_override::<usize>(&lookup, "GREENFIL_NUM_AGENTS") {
            cfg.num_agents = v;
        }
        if let Some(v) = parse_override::<u64>(&lookup, "GREENFIL_EPISODE_LENGTH") {
            cfg.episode_length = v;
        }
        if let Some(v) = parse_override::<f64>(&lookup, "GREENFIL_REC_PRICE") {
            for c in &mut cfg.components {
                if let ComponentConfig::RecPurchase(rec) = c {
                    rec.rec_price = v.max(0.0);
                }
            }
        }
        if let Some(v) = parse_override::<u64>(&lookup, "GREENFIL_POLICY_INTERVAL") {
            for c in &mut cfg.components {
                if let ComponentConfig::GreenScoreImportance(gsi) = c {
                    gsi.policy_interval = v.max(1);
                }
            }
        }

        cfg
    }

    /// Check every invariant the environment relies on.
    pub fn validate(&self) -> SimResult<()> {
        if self.num_agents == 0 {
            return Err(SimError::config("num_agents", "must be at least 1"));
        }
        if self.selection.divisor == 0 {
            return Err(SimError::config("selection.divisor", "must be at least 1"));
        }
        if !self.selection.allocation_bytes.is_finite() || self.selection.allocation_bytes < 0.0 {
            return Err(SimError::config(
                "selection.allocation_bytes",
                "must be finite and non-negative",
            ));
        }
        for (field, v) in [
            ("energy.sealing_kwh_per_gb", self.energy.sealing_kwh_per_gb),
            ("energy.storage_kwh_per_gb_tick", self.energy.storage_kwh_per_gb_tick),
            ("revenue.revenue_per_gb", self.revenue.revenue_per_gb),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(SimError::config(field, "must be finite and non-negative"));
            }
        }

        let mut seen_agent_side = false;
        let mut seen_planner = false;
        let mut deferred = false;
        let mut seen_recs = false;
        for c in &self.components {
            if c.is_planner_side() && seen_agent_side {
                return Err(SimError::config(
                    "components",
                    "planner-side components must run before agent-side components",
                ));
            }
            match c {
                ComponentConfig::GreenScoreImportance(gsi) => {
                    if seen_planner {
                        return Err(SimError::config(
                            "components",
                            "green_score_importance listed twice",
                        ));
                    }
                    seen_planner = true;
                    deferred = gsi.propagation == WeightPropagation::Deferred;
                    if gsi.levels == 0 {
                        return Err(SimError::config(
                            "green_score_importance.levels",
                            "must be at least 1",
                        ));
                    }
                    if gsi.policy_interval == 0 {
                        return Err(SimError::config(
                            "green_score_importance.policy_interval",
                            "must be at least 1",
                        ));
                    }
                }
                ComponentConfig::RecPurchase(rec) => {
                    if seen_recs {
                        return Err(SimError::config("components", "rec_purchase listed twice"));
                    }
                    seen_recs = true;
                    seen_agent_side = true;
                    if rec.packages == 0 {
                        return Err(SimError::config(
                            "rec_purchase.packages",
                            "must be at least 1",
                        ));
                    }
                    if !rec.rec_price.is_finite() || rec.rec_price < 0.0 {
                        return Err(SimError::config(
                            "rec_purchase.rec_price",
                            "must be finite and non-negative",
                        ));
                    }
                    if let Some(w) = rec.static_importance {
                        if !(0.0..=1.0).contains(&w) {
                            return Err(SimError::config(
                                "rec_purchase.static_importance",
                                format!("{w} outside [0, 1]"),
                            ));
                        }
                    }
                }
            }
        }
        // Deferred weights reach TotalScore only through rec_purchase.
        if deferred && !seen_recs {
            return Err(SimError::config(
                "components",
                "deferred green_score_importance requires a rec_purchase component",
            ));
        }

        self.tables.validate()
    }
}

fn parse_override<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: std::str::FromStr + std::fmt::Display,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => {
            info!(key, value = %v, "config override from environment");
            Some(v)
        }
        Err(_) => {
            warn!(key, value = %raw, "could not parse config override; using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_validates() {
        let cfg = SimConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.num_agents, 10);
        assert_eq!(cfg.components.len(), 2);
    }

    #[test]
    fn test_immediate_preset() {
        let cfg = SimConfig::for_preset(ModelPreset::Immediate);
        cfg.validate().unwrap();
        match &cfg.components[1] {
            ComponentConfig::RecPurchase(rec) => {
                assert_eq!(rec.packages, 21);
                assert_eq!(rec.mode, RecPurchaseMode::EnergyWeighted);
            }
            other => panic!("unexpected component {other:?}"),
        }
    }

    #[test]
    fn test_preset_parse() {
        assert_eq!(ModelPreset::parse(" Immediate "), Some(ModelPreset::Immediate));
        assert_eq!(ModelPreset::parse("d"), Some(ModelPreset::Deferred));
        assert_eq!(ModelPreset::parse("bogus"), None);
        assert_eq!(ModelPreset::Immediate.as_str(), "immediate");
    }

    #[test]
    fn test_rejects_agent_component_before_planner() {
        let mut cfg = SimConfig::default();
        cfg.components.reverse();
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, SimError::Config { ref field, .. } if field == "components"));
    }

    #[test]
    fn test_rejects_duplicate_components() {
        let mut cfg = SimConfig::default();
        cfg.components
            .push(ComponentConfig::RecPurchase(RecPurchaseConfig::default()));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_static_importance_out_of_range() {
        let mut cfg = SimConfig::default();
        cfg.components[1] = ComponentConfig::RecPurchase(RecPurchaseConfig {
            static_importance: Some(1.5),
            ..RecPurchaseConfig::default()
        });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_deferred_planner_requires_rec_purchase() {
        let mut cfg = SimConfig::default();
        cfg.components.truncate(1);
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, SimError::Config { ref field, .. } if field == "components"));

        let yaml = "components:\n  - type: green_score_importance\n";
        assert!(SimConfig::from_yaml_str(yaml).is_err());

        // Immediate propagation re-blends TotalScore on its own.
        let mut cfg = SimConfig::for_preset(ModelPreset::Immediate);
        cfg.components.truncate(1);
        cfg.validate().unwrap();
    }

    #[test]
    fn test_rejects_non_finite_cost_coefficients() {
        let mut cfg = SimConfig::default();
        cfg.energy.storage_kwh_per_gb_tick = f64::INFINITY;
        let err = cfg.validate().unwrap_err();
        assert!(
            matches!(err, SimError::Config { ref field, .. } if field == "energy.storage_kwh_per_gb_tick")
        );

        let mut cfg = SimConfig::default();
        cfg.energy.sealing_kwh_per_gb = f64::NAN;
        assert!(cfg.validate().is_err());

        let mut cfg = SimConfig::default();
        cfg.revenue.revenue_per_gb = f64::NAN;
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, SimError::Config { ref field, .. } if field == "revenue.revenue_per_gb"));

        let mut cfg = SimConfig::default();
        cfg.revenue.revenue_per_gb = -1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_agents() {
        let cfg = SimConfig {
            num_agents: 0,
            ..SimConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_yaml_partial_override() {
        let yaml = r#"
num_agents: 25
episode_length: 48
selection:
  zero_weight_policy: fail
components:
  - type: green_score_importance
    policy_interval: 12
  - type: rec_purchase
    rec_price: 0.01
    static_importance: 0.3
"#;
        let cfg = SimConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.num_agents, 25);
        assert_eq!(cfg.episode_length, 48);
        assert_eq!(cfg.selection.zero_weight_policy, ZeroWeightPolicy::Fail);
        assert_eq!(cfg.selection.divisor, 10);
        match &cfg.components[0] {
            ComponentConfig::GreenScoreImportance(gsi) => {
                assert_eq!(gsi.policy_interval, 12);
                assert_eq!(gsi.levels, 20);
            }
            other => panic!("unexpected component {other:?}"),
        }
        match &cfg.components[1] {
            ComponentConfig::RecPurchase(rec) => {
                assert_eq!(rec.rec_price, 0.01);
                assert_eq!(rec.static_importance, Some(0.3));
                assert_eq!(rec.packages, 20);
            }
            other => panic!("unexpected component {other:?}"),
        }
    }

    #[test]
    fn test_yaml_invalid_config_rejected() {
        assert!(SimConfig::from_yaml_str("num_agents: 0\n").is_err());
        assert!(SimConfig::from_yaml_str("num_agents: [1, 2]\n").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("GREENFIL_PRESET", "immediate"),
            ("GREENFIL_NUM_AGENTS", "40"),
            ("GREENFIL_EPISODE_LENGTH", "not-a-number"),
            ("GREENFIL_REC_PRICE", "0.02"),
            ("GREENFIL_POLICY_INTERVAL", "6"),
        ]
        .into_iter()
        .collect();
        let cfg = SimConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.num_agents, 40);
        assert_eq!(cfg.episode_length, 24 * 30);
        match (&cfg.components[0], &cfg.components[1]) {
            (ComponentConfig::GreenScoreImportance(gsi), ComponentConfig::RecPurchase(rec)) => {
                assert_eq!(gsi.policy_interval, 6);
                assert_eq!(gsi.propagation, WeightPropagation::Immediate);
                assert_eq!(rec.rec_price, 0.02);
            }
            other => panic!("unexpected components {other:?}"),
        }
    }
}
