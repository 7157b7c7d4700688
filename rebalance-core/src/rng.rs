//! Deterministic RNG hierarchy.
//!
//! A master seed generates deterministic sub-seeds for each
//! `(request_id, stream, iteration)` tuple. Sub-seeds are derived via BLAKE3
//! hashing, independently of call order, so a replayed request draws the same
//! numbers regardless of thread scheduling.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::RequestId;

#[derive(Debug, Clone)]
pub struct RngHierarchy {
    master_seed: u64,
}

impl RngHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Derive a deterministic sub-seed for `(request, stream, iteration)`.
    pub fn sub_seed(&self, request: &RequestId, stream: &str, iteration: u64) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(request.as_bytes());
        hasher.update(stream.as_bytes());
        hasher.update(&iteration.to_le_bytes());
        let hash = hasher.finalize();
        let mut first = [0u8; 8];
        first.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(first)
    }

    pub fn rng_for(&self, request: &RequestId, stream: &str, iteration: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(request, stream, iteration))
    }

    /// Multiplicative factor in `[1 - jitter, 1 + jitter]` for one relaxation pass.
    ///
    /// `jitter` is clamped to `[0, 1)`; zero always yields exactly 1.0.
    pub fn jitter_factor(&self, request: &RequestId, pass: u64, jitter: f64) -> f64 {
        let jitter = if jitter.is_finite() { jitter.clamp(0.0, 0.99) } else { 0.0 };
        if jitter == 0.0 {
            return 1.0;
        }
        let mut rng = self.rng_for(request, "relaxation", pass);
        rng.gen_range(1.0 - jitter..=1.0 + jitter)
    }
}
