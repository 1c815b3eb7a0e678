//! Deterministic simulation RNG resource.
//!
//! `SimRng` is a SplitMix64 generator whose entire state is one `u64`.
//! That scalar is what the replay log captures once per frame and restores
//! before re-applying the frame, so the same state always yields the same
//! stream on every platform.

use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

/// Default seed used when no explicit seed is provided.
pub const DEFAULT_SEED: u64 = 42;

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// Deterministic RNG resource for all simulation randomness.
///
/// Implements `rand::RngCore`, so the full `rand::Rng` API is available.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimRng {
    state: u64,
}

impl SimRng {
    /// Rebuild a generator from a captured state.
    #[must_use]
    pub const fn from_state(state: u64) -> Self {
        Self { state }
    }

    /// Current scalar state.
    #[must_use]
    pub const fn state(&self) -> u64 {
        self.state
    }

    /// Overwrite the scalar state.
    pub fn set_state(&mut self, state: u64) {
        self.state = state;
    }
}

impl Default for SimRng {
    fn default() -> Self {
        Self::from_state(DEFAULT_SEED)
    }
}

impl std::fmt::Debug for SimRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimRng({:#018x})", self.state)
    }
}

impl RngCore for SimRng {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(GOLDEN_GAMMA);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for SimRng {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::from_state(u64::from_le_bytes(seed))
    }

    fn seed_from_u64(state: u64) -> Self {
        Self::from_state(state)
    }
}
