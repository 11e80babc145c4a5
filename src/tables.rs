// src/tables.rs
//
// Initialization tables consulted only at reset:
// - where a miner is located (energy price per kWh, renewable share)
// - how reliable a miner is (discrete score distribution)
//
// Built-in defaults are provided; custom tables come in through `SimConfig`.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// One location a miner can be placed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryProfile {
    pub name: String,
    /// Relative probability of a miner being located here.
    pub prob: f64,
    pub energy_price_per_kwh: f64,
    /// Renewable share of the local energy mix, in [0, 1].
    pub renewables_share: f64,
}

/// One bucket of the reliability-score distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityBucket {
    pub score: f64,
    pub prob: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitTables {
    pub countries: Vec<CountryProfile>,
    pub reliability: Vec<ReliabilityBucket>,
}

fn country(name: &str, prob: f64, price: f64, renewables: f64) -> CountryProfile {
    CountryProfile {
        name: name.to_string(),
        prob,
        energy_price_per_kwh: price,
        renewables_share: renewables,
    }
}

impl Default for InitTables {
    fn default() -> Self {
        Self {
            countries: vec![
                country("China", 0.40, 0.09, 0.29),
                country("United States", 0.20, 0.15, 0.21),
                country("Germany", 0.08, 0.33, 0.46),
                country("Canada", 0.08, 0.10, 0.68),
                country("Norway", 0.04, 0.12, 0.98),
                country("South Korea", 0.07, 0.11, 0.09),
                country("Netherlands", 0.06, 0.26, 0.40),
                country("Singapore", 0.07, 0.20, 0.04),
            ],
            reliability: vec![
                ReliabilityBucket { score: 0.5, prob: 0.05 },
                ReliabilityBucket { score: 0.6, prob: 0.10 },
                ReliabilityBucket { score: 0.7, prob: 0.20 },
                ReliabilityBucket { score: 0.8, prob: 0.30 },
                ReliabilityBucket { score: 0.9, prob: 0.25 },
                ReliabilityBucket { score: 1.0, prob: 0.10 },
            ],
        }
    }
}

fn validate_probs<I: IntoIterator<Item = f64>>(field: &str, probs: I) -> SimResult<()> {
    let mut sum = 0.0;
    let mut n = 0;
    for p in probs {
        if !p.is_finite() || p < 0.0 {
            return Err(SimError::config(field, format!("invalid probability {p}")));
        }
        sum += p;
        n += 1;
    }
    if n == 0 {
        return Err(SimError::config(field, "table is empty"));
    }
    if sum <= 0.0 {
        return Err(SimError::config(field, "probabilities sum to zero"));
    }
    Ok(())
}

impl InitTables {
    pub fn validate(&self) -> SimResult<()> {
        validate_probs("tables.countries", self.countries.iter().map(|c| c.prob))?;
        validate_probs("tables.reliability", self.reliability.iter().map(|b| b.prob))?;

        for c in &self.countries {
            if !(0.0..=1.0).contains(&c.renewables_share) {
                return Err(SimError::config(
                    "tables.countries",
                    format!("{}: renewables share {} outside [0, 1]", c.name, c.renewables_share),
                ));
            }
            if !c.energy_price_per_kwh.is_finite() || c.energy_price_per_kwh < 0.0 {
                return Err(SimError::config(
                    "tables.countries",
                    format!("{}: invalid energy price {}", c.name, c.energy_price_per_kwh),
                ));
            }
        }
        for b in &self.reliability {
            if !b.score.is_finite() || b.score < 0.0 {
                return Err(SimError::config(
                    "tables.reliability",
                    format!("invalid reliability score {}", b.score),
                ));
            }
        }
        Ok(())
    }

    /// Draw a location for one miner.
    pub fn sample_country<R: Rng + ?Sized>(&self, rng: &mut R) -> SimResult<&CountryProfile> {
        let dist = WeightedIndex::new(self.countries.iter().map(|c| c.prob))
            .map_err(|e| SimError::config("tables.countries", e.to_string()))?;
        Ok(&self.countries[dist.sample(rng)])
    }

    /// Draw a reliability score for one miner.
    pub fn sample_reliability<R: Rng + ?Sized>(&self, rng: &mut R) -> SimResult<f64> {
        let dist = WeightedIndex::new(self.reliability.iter().map(|b| b.prob))
            .map_err(|e| SimError::config("tables.reliability", e.to_string()))?;
        Ok(self.reliability[dist.sample(rng)].score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_defaults_validate() {
        InitTables::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_bad_probabilities() {
        let mut tables = InitTables::default();
        tables.reliability[0].prob = -0.1;
        assert!(tables.validate().is_err());

        let mut tables = InitTables::default();
        tables.countries.iter_mut().for_each(|c| c.prob = 0.0);
        assert!(tables.validate().is_err());

        let mut tables = InitTables::default();
        tables.countries.clear();
        assert!(tables.validate().is_err());
    }

    #[test]
    fn test_rejects_renewables_out_of_range() {
        let mut tables = InitTables::default();
        tables.countries[0].renewables_share = 1.2;
        assert!(tables.validate().is_err());
    }

    #[test]
    fn test_single_entry_tables_are_deterministic() {
        let tables = InitTables {
            countries: vec![country("Only", 1.0, 0.2, 0.5)],
            reliability: vec![ReliabilityBucket { score: 0.8, prob: 1.0 }],
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(tables.sample_country(&mut rng).unwrap().name, "Only");
        assert_eq!(tables.sample_reliability(&mut rng).unwrap(), 0.8);
    }
}
