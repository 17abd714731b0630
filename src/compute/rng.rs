//! Explicit random source for rule synthesis.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Beta, StandardNormal};

use crate::error::{Error, Result};

/// ChaCha stream used for draws that must not disturb the main sequence.
const SIDE_STREAM: u64 = 1;

/// Seedable random source threaded through every stochastic choice of the
/// generator. One instance per unit of work; never shared across threads.
#[derive(Debug, Clone)]
pub struct RuleRng {
    rng: ChaCha8Rng,
    seed: Option<u64>,
}

impl RuleRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed: Some(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
            seed: None,
        }
    }

    /// Seed this source was created from, if explicit.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Draw from Beta(1, `beta`), in `[0, 1]`. Larger `beta` pulls toward 0.
    pub fn beta(&mut self, beta: f64) -> Result<f64> {
        let dist = Beta::new(1.0, beta)
            .map_err(|e| Error::invalid(format!("Beta(1, {beta}): {e}")))?;
        Ok(self.rng.sample(dist))
    }

    /// Fisher-Yates shuffle in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }

    /// Gaussian draw with the given mean and standard deviation.
    pub fn gaussian(&mut self, mean: f64, std: f64) -> f64 {
        let z: f64 = self.rng.sample(StandardNormal);
        mean + z * std
    }

    /// Independent source for auxiliary draws. This source's own sequence is
    /// left untouched; a seeded source derives the side stream from its seed.
    pub fn side_stream(&self) -> Self {
        let mut rng = match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => self.rng.clone(),
        };
        rng.set_stream(SIDE_STREAM);
        Self { rng, seed: None }
    }

    /// Generate next u64 for seeding child RNGs.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.r#gen()
    }
}
