//! Random source for trial ordering and interval jitter.
//!
//! Every random decision the controller makes goes through [`RandomSource`],
//! so a seeded [`PccRng`] replays the exact same trial batches and monitoring
//! interval lengths run after run.

use rand::{rngs::SmallRng, Rng, SeedableRng};

/// Random decisions needed by the rate controller.
pub trait RandomSource: Send + 'static {
    /// Whether the increase trial leads each pair in the next trial batch.
    fn increase_first(&mut self) -> bool;

    /// Uniform draw from the inclusive range `[low, high]`.
    fn uniform(&mut self, low: f64, high: f64) -> f64;
}

/// Default [`RandomSource`], optionally seeded for deterministic replay.
#[derive(Clone)]
pub struct PccRng {
    inner: SmallRng,
    seed: Option<u64>,
}

impl PccRng {
    /// Creates an RNG seeded from system entropy.
    pub fn from_entropy() -> Self {
        Self {
            inner: SmallRng::from_entropy(),
            seed: None,
        }
    }

    /// Creates an RNG with the given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: SmallRng::seed_from_u64(seed),
            seed: Some(seed),
        }
    }

    /// Returns the seed, if this RNG was created with one.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}

impl Default for PccRng {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl RandomSource for PccRng {
    fn increase_first(&mut self) -> bool {
        self.inner.gen_bool(0.5)
    }

    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        if high <= low {
            return low;
        }
        self.inner.gen_range(low..=high)
    }
}

impl std::fmt::Debug for PccRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PccRng").field("seed", &self.seed).finish()
    }
}

/// Replays fixed answers, cycling through each sequence.
#[cfg(test)]
#[derive(Debug, Clone)]
pub(crate) struct ScriptedRandom {
    orders: Vec<bool>,
    fractions: Vec<f64>,
    order_idx: usize,
    fraction_idx: usize,
}

#[cfg(test)]
impl ScriptedRandom {
    /// `orders` feed `increase_first`; `fractions` in `[0, 1]` pick a point in each uniform range.
    pub(crate) fn new(orders: Vec<bool>, fractions: Vec<f64>) -> Self {
        assert!(!orders.is_empty() && !fractions.is_empty());
        Self {
            orders,
            fractions,
            order_idx: 0,
            fraction_idx: 0,
        }
    }

    pub(crate) fn increase_first_always() -> Self {
        Self::new(vec![true], vec![0.0])
    }
}

#[cfg(test)]
impl RandomSource for ScriptedRandom {
    fn increase_first(&mut self) -> bool {
        let value = self.orders[self.order_idx % self.orders.len()];
        self.order_idx += 1;
        value
    }

    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        let fraction = self.fractions[self.fraction_idx % self.fractions.len()];
        self.fraction_idx += 1;
        low + (high - low) * fraction
    }
}
