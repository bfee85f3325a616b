//! Seeded random source shared by everything that runs inside one world.
//!
//! A world owns exactly one `RandomSource` and lends it out as `&mut` to the
//! scheduler, the reproduction pipeline and the deme manager. Two worlds built
//! from the same configuration and seed therefore draw identical sequences.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Poisson, StandardNormal};
use tracing::info;

pub struct RandomSource {
    rng: ChaCha8Rng,
    seed: u64,
}

impl RandomSource {
    /// Create a source from `seed`. A seed of 0 picks one from the wall clock.
    pub fn new(seed: u64) -> Self {
        let seed = effective_seed(seed);
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    pub fn reseed(&mut self, seed: u64) {
        let seed = effective_seed(seed);
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self.seed = seed;
    }

    /// The seed actually in use (never 0).
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform draw in `[0, 1)`.
    pub fn next_uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Uniform draw in `[0, n)`. Returns 0 without drawing when `n` is 0.
    pub fn next_int(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        self.rng.gen_range(0..n)
    }

    pub fn next_gaussian(&mut self, mean: f64, std_dev: f64) -> f64 {
        let z: f64 = StandardNormal.sample(&mut self.rng);
        mean + z * std_dev
    }

    /// Bernoulli trial. Probabilities at or below 0 return false without
    /// consuming a draw, so disabled operators leave the stream untouched.
    pub fn p(&mut self, prob: f64) -> bool {
        if prob <= 0.0 {
            return false;
        }
        self.next_uniform() < prob
    }

    /// Poisson draw with the given mean; non-positive means yield 0.
    pub fn next_poisson(&mut self, mean: f64) -> u32 {
        if mean <= 0.0 || !mean.is_finite() {
            return 0;
        }
        match Poisson::new(mean) {
            Ok(dist) => {
                let draw: f64 = dist.sample(&mut self.rng);
                draw as u32
            }
            Err(_) => 0,
        }
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }
}

fn effective_seed(seed: u64) -> u64 {
    if seed != 0 {
        return seed;
    }
    let now = chrono::Utc::now();
    let nanos = now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp()) as u64;
    let seed = nanos.max(1);
    info!(seed, "Using time-based random seed");
    seed
}
