// src/components/green_score_importance.rs
//
// Planner-side component: chooses how much the green score counts in every
// miner's TotalScore.
//
// The planner may only change the weight on ticks that are a multiple of
// `policy_interval`; on every other tick its mask allows the no-op alone.

use tracing::info;

use crate::config::{GreenScoreImportanceConfig, WeightPropagation};
use crate::error::SimResult;
use crate::world::{AgentClass, AgentId, World};

use super::{check_action, ActionMasks, ActionSet, ComponentKind};

#[derive(Debug, Clone, PartialEq)]
pub struct GreenScoreImportance {
    cfg: GreenScoreImportanceConfig,
}

impl GreenScoreImportance {
    pub fn new(cfg: GreenScoreImportanceConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &GreenScoreImportanceConfig {
        &self.cfg
    }

    pub fn n_actions(&self, class: AgentClass) -> Option<usize> {
        match class {
            AgentClass::Planner => Some(self.cfg.levels),
            AgentClass::Miner => None,
        }
    }

    /// Weight selected by action `a` (0.05 steps for 20 levels).
    pub fn weight_for_action(&self, action: usize) -> f64 {
        action as f64 * (1.0 / self.cfg.levels as f64)
    }

    /// Whether the weight may change at `tick`.
    pub fn is_policy_tick(&self, tick: u64) -> bool {
        tick % self.cfg.policy_interval == 0
    }

    pub fn reset(&mut self, world: &mut World) {
        world.planner.green_score_importance = 0.0;
    }

    pub fn generate_masks(&self, world: &World) -> ActionMasks {
        let n = self.cfg.levels + 1;
        let mask = if self.is_policy_tick(world.tick) {
            vec![true; n]
        } else {
            let mut m = vec![false; n];
            m[0] = true;
            m
        };
        let mut masks = ActionMasks::new();
        masks.insert(AgentId::Planner, mask);
        masks
    }

    pub fn component_step(&mut self, world: &mut World, actions: &ActionSet) -> SimResult<()> {
        let action = actions.get(AgentId::Planner, ComponentKind::GreenScoreImportance);
        check_action(
            ComponentKind::GreenScoreImportance,
            AgentId::Planner,
            action,
            self.cfg.levels,
        )?;

        if !self.is_policy_tick(world.tick) {
            return Ok(());
        }

        match self.cfg.propagation {
            WeightPropagation::Deferred => {
                if action == 0 {
                    return Ok(());
                }
                self.publish(world, action);
            }
            WeightPropagation::Immediate => {
                self.publish(world, action);
                let w = world.planner.green_score_importance;
                for miner in world.miners.iter_mut() {
                    miner.recompute_total_score(w);
                }
            }
        }
        Ok(())
    }

    fn publish(&self, world: &mut World, action: usize) {
        let w = self.weight_for_action(action);
        if w != world.planner.green_score_importance {
            info!(
                tick = world.tick,
                from = world.planner.green_score_importance,
                to = w,
                "planner changed green score importance"
            );
        }
        world.planner.green_score_importance = w;
    }

    pub fn metrics(&self, world: &World) -> Vec<(String, f64)> {
        vec![(
            "green_score_importance/weight".to_string(),
            world.planner.green_score_importance,
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;

    fn world_with_scores() -> World {
        let mut world = World::new(2);
        world.miners[0].green_score = 1.0;
        world.miners[0].reliability_score = 0.5;
        world.miners[1].green_score = 0.2;
        world.miners[1].reliability_score = 0.8;
        for m in world.miners.iter_mut() {
            m.recompute_total_score(0.0);
        }
        world
    }

    fn planner_action(a: usize) -> ActionSet {
        ActionSet::new().with(AgentId::Planner, ComponentKind::GreenScoreImportance, a)
    }

    #[test]
    fn test_masks_gate_on_policy_interval() {
        let c = GreenScoreImportance::new(GreenScoreImportanceConfig::default());
        let mut world = World::new(1);

        let open = c.generate_masks(&world);
        assert_eq!(open[&AgentId::Planner], vec![true; 21]);

        world.tick = 5;
        let closed = &c.generate_masks(&world)[&AgentId::Planner];
        assert_eq!(closed.len(), 21);
        assert!(closed[0]);
        assert!(closed[1..].iter().all(|allowed| !allowed));

        world.tick = 48;
        assert!(c.generate_masks(&world)[&AgentId::Planner].iter().all(|a| *a));
    }

    #[test]
    fn test_deferred_sets_weight_only() {
        let mut c = GreenScoreImportance::new(GreenScoreImportanceConfig::default());
        let mut world = world_with_scores();

        c.component_step(&mut world, &planner_action(7)).unwrap();
        assert!((world.planner.green_score_importance - 0.35).abs() < 1e-12);
        // TotalScore is left for the agent-side component.
        assert_eq!(world.miners[0].total_score, 0.5);

        // Action 0 keeps the current weight.
        c.component_step(&mut world, &planner_action(0)).unwrap();
        assert!((world.planner.green_score_importance - 0.35).abs() < 1e-12);

        c.component_step(&mut world, &planner_action(20)).unwrap();
        assert_eq!(world.planner.green_score_importance, 1.0);
    }

    #[test]
    fn test_immediate_recomputes_every_miner() {
        let mut c = GreenScoreImportance::new(GreenScoreImportanceConfig {
            propagation: WeightPropagation::Immediate,
            ..GreenScoreImportanceConfig::default()
        });
        let mut world = world_with_scores();
        world.planner.green_score_importance = 0.5;

        c.component_step(&mut world, &planner_action(10)).unwrap();
        assert!((world.miners[0].total_score - 0.75).abs() < 1e-12);
        assert!((world.miners[1].total_score - 0.5).abs() < 1e-12);

        // In this mode 0 means weight 0, not "keep".
        c.component_step(&mut world, &planner_action(0)).unwrap();
        assert_eq!(world.planner.green_score_importance, 0.0);
        assert_eq!(world.miners[0].total_score, 0.5);
    }

    #[test]
    fn test_off_interval_tick_changes_nothing() {
        for propagation in [WeightPropagation::Deferred, WeightPropagation::Immediate] {
            let mut c = GreenScoreImportance::new(GreenScoreImportanceConfig {
                propagation,
                ..GreenScoreImportanceConfig::default()
            });
            let mut world = world_with_scores();
            world.planner.green_score_importance = 0.4;
            world.tick = 3;
            let before = world.clone();

            c.component_step(&mut world, &planner_action(0)).unwrap();
            c.component_step(&mut world, &planner_action(12)).unwrap();
            assert_eq!(world, before);
        }
    }

    #[test]
    fn test_out_of_range_action_rejected() {
        let mut c = GreenScoreImportance::new(GreenScoreImportanceConfig::default());
        let mut world = world_with_scores();
        let before = world.clone();

        let err = c.component_step(&mut world, &planner_action(21)).unwrap_err();
        assert!(matches!(err, SimError::InvalidAction { action: 21, max: 20, .. }));
        assert_eq!(world, before);
    }

    #[test]
    fn test_reset_clears_weight() {
        let mut c = GreenScoreImportance::new(GreenScoreImportanceConfig::default());
        let mut world = World::new(1);
        world.planner.green_score_importance = 0.9;
        c.reset(&mut world);
        assert_eq!(world.planner.green_score_importance, 0.0);
        assert_eq!(c.n_actions(AgentClass::Planner), Some(20));
        assert_eq!(c.n_actions(AgentClass::Miner), None);
    }
}
