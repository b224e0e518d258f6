//! Probability gates.
//!
//! Kidnapping, escaping and conceiving each succeed with a fixed probability
//! (0.10 by default). The engine draws those Bernoulli trials from a
//! [`Chance`] so tests can seed or script the outcome.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A source of Bernoulli trials.
pub trait Chance: Send {
    /// Return `true` with the given probability. Values outside `[0, 1]`
    /// are clamped; NaN never succeeds.
    fn roll(&mut self, probability: f64) -> bool;
}

/// Trials drawn from a [`StdRng`].
#[derive(Debug, Clone)]
pub struct RngChance {
    rng: StdRng,
}

impl RngChance {
    /// Seed from OS entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic sequence for a given seed.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Chance for RngChance {
    fn roll(&mut self, probability: f64) -> bool {
        if probability.is_nan() {
            return false;
        }
        self.rng.gen_bool(probability.clamp(0.0, 1.0))
    }
}

/// Every trial has the same predetermined outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedChance(pub bool);

impl FixedChance {
    /// Every trial succeeds.
    pub const ALWAYS: Self = Self(true);
    /// Every trial fails.
    pub const NEVER: Self = Self(false);
}

impl Chance for FixedChance {
    fn roll(&mut self, _probability: f64) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_rate_converges_to_probability() {
        let mut chance = RngChance::seeded(0x5EED);
        let trials = 100_000;
        let hits = (0..trials).filter(|_| chance.roll(0.10)).count();
        let rate = hits as f64 / f64::from(trials);
        assert!((rate - 0.10).abs() < 0.01, "rate was {rate}");
    }

    #[test]
    fn seeded_sequences_repeat() {
        let mut a = RngChance::seeded(42);
        let mut b = RngChance::seeded(42);
        let xs: Vec<bool> = (0..64).map(|_| a.roll(0.5)).collect();
        let ys: Vec<bool> = (0..64).map(|_| b.roll(0.5)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn out_of_range_probabilities_are_clamped() {
        let mut chance = RngChance::seeded(1);
        assert!(chance.roll(7.0));
        assert!(!chance.roll(-1.0));
    }

    #[test]
    fn nan_probability_never_succeeds() {
        let mut chance = RngChance::seeded(1);
        assert!((0..16).all(|_| !chance.roll(f64::NAN)));
    }

    #[test]
    fn fixed_chance_ignores_probability() {
        assert!(FixedChance::ALWAYS.roll(0.0));
        assert!(!FixedChance::NEVER.roll(1.0));
    }
}
