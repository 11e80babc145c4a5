// src/sampling.rs
//
// Weighted selection of miners for new storage work.
//
// Draws are independent and with replacement, so one miner can be drawn more
// than once per tick. A miner with weight 0 is never drawn unless every
// weight is 0, in which case the configured `ZeroWeightPolicy` decides.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use tracing::warn;

use crate::config::ZeroWeightPolicy;
use crate::error::{SimError, SimResult};

/// Outcome of one round of weighted draws.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Drawn miner indices in draw order (duplicates possible).
    pub draws: Vec<usize>,
    /// True when all weights were zero and draws were made uniformly.
    pub uniform_fallback: bool,
}

impl Selection {
    /// Whether miner `idx` was drawn at least once.
    pub fn contains(&self, idx: usize) -> bool {
        self.draws.contains(&idx)
    }
}

/// Number of draws per tick: a tenth of the miners (for divisor 10),
/// rounded down, but never fewer than one.
pub fn num_selected(num_miners: usize, divisor: usize) -> usize {
    if num_miners == 0 {
        return 0;
    }
    (num_miners / divisor.max(1)).max(1)
}

/// Draw `k` indices with replacement, proportional to `weights`.
pub fn draw_with_replacement<R: Rng + ?Sized>(
    weights: &[f64],
    k: usize,
    policy: ZeroWeightPolicy,
    rng: &mut R,
) -> SimResult<Selection> {
    if weights.is_empty() || k == 0 {
        return Ok(Selection {
            draws: Vec::new(),
            uniform_fallback: false,
        });
    }

    for (miner, &weight) in weights.iter().enumerate() {
        if !weight.is_finite() || weight < 0.0 {
            return Err(SimError::InvalidWeight { miner, weight });
        }
    }

    if weights.iter().all(|&w| w == 0.0) {
        return match policy {
            ZeroWeightPolicy::Fail => Err(SimError::NumericDegeneracy {
                num_agents: weights.len(),
            }),
            ZeroWeightPolicy::Uniform => {
                warn!(
                    num_agents = weights.len(),
                    draws = k,
                    "all selection weights are zero, drawing uniformly"
                );
                let draws = (0..k).map(|_| rng.gen_range(0..weights.len())).collect();
                Ok(Selection {
                    draws,
                    uniform_fallback: true,
                })
            }
        };
    }

    let dist = WeightedIndex::new(weights).map_err(|_| SimError::NumericDegeneracy {
        num_agents: weights.len(),
    })?;
    let draws = (0..k).map(|_| dist.sample(rng)).collect();

    Ok(Selection {
        draws,
        uniform_fallback: false,
    })
}
