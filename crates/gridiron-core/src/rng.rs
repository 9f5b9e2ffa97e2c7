//! Randomness helpers shared by every layer of the engine.
//!
//! Nothing in the engine touches a global RNG. Callers hand a `rand::Rng`
//! down from the top and these helpers are available on it through the
//! blanket [`GameRng`] impl.

use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const TRUNC_GAUSS_ATTEMPTS: usize = 25;

/// Deterministic RNG for a game seed.
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Sampling primitives used by the simulation.
pub trait GameRng: Rng {
    /// Uniform draw in [0, 1).
    fn uniform(&mut self) -> f64 {
        self.gen::<f64>()
    }

    /// True with probability `p`.
    fn chance(&mut self, p: f64) -> bool {
        self.uniform() < p
    }

    /// Uniform integer between `a` and `b` inclusive, in either order.
    fn rand_int(&mut self, a: i32, b: i32) -> i32 {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        self.gen_range(lo..=hi)
    }

    /// Normal draw via Box-Muller.
    fn gauss(&mut self, mu: f64, sigma: f64) -> f64 {
        let u1 = 1.0 - self.uniform();
        let u2 = self.uniform();
        let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
        mu + sigma * z
    }

    /// Normal draw restricted to `[lo, hi]`. Rejection sampling gives up
    /// after a fixed number of attempts and clamps the last draw.
    fn trunc_gauss(&mut self, mu: f64, sigma: f64, lo: f64, hi: f64) -> f64 {
        let mut x = mu;
        for _ in 0..TRUNC_GAUSS_ATTEMPTS {
            x = self.gauss(mu, sigma);
            if (lo..=hi).contains(&x) {
                return x;
            }
        }
        x.clamp(lo, hi)
    }

    /// Index drawn proportionally to `weights`. Falls back to a uniform pick
    /// when no weight is positive. `None` only for an empty slice.
    fn choose_weighted_index(&mut self, weights: &[f64]) -> Option<usize> {
        if weights.is_empty() {
            return None;
        }
        match WeightedIndex::new(weights.iter().map(|w| w.max(0.0))) {
            Ok(dist) => Some(dist.sample(self)),
            Err(_) => Some(self.gen_range(0..weights.len())),
        }
    }

    /// Shuffle in place.
    fn shuffle_slice<T>(&mut self, items: &mut [T]) {
        items.shuffle(self);
    }
}

impl<R: Rng + ?Sized> GameRng for R {}
