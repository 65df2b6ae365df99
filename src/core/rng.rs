//! Deterministic Random Number Generator
//!
//! Uses Xorshift128+ algorithm for fast, high-quality, deterministic randomness.
//! Given the same seed, board generation, shuffles and obstacle rolls replay
//! identically on all platforms.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

use crate::game::config::Difficulty;

/// Deterministic PRNG using Xorshift128+ algorithm.
///
/// # Example
///
/// ```
/// use matching_animals::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::new(12345);
/// let mut b = DeterministicRng::new(12345);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring
    /// good distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Ensure state is never all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Create RNG for a match from its id and difficulty.
    pub fn for_match(match_id: &[u8; 16], difficulty: Difficulty) -> Self {
        Self::new(derive_match_seed(match_id, difficulty))
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Generate a random integer in range [0, max).
    #[inline]
    pub fn next_int(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        // Simple modulo - slight bias for very large max, but acceptable
        (self.next_u64() % max as u64) as u32
    }

    /// Generate a random integer in range [min, max].
    #[inline]
    pub fn next_int_range(&mut self, min: u32, max: u32) -> u32 {
        if min >= max {
            return min;
        }
        min + self.next_int(max - min + 1)
    }

    /// Generate a random index in range [0, len).
    #[inline]
    pub fn next_index(&mut self, len: usize) -> usize {
        self.next_int(len as u32) as usize
    }

    /// Generate a float in [0, 1) from the upper 53 bits.
    #[inline]
    pub fn next_unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Generate a float uniformly in [min, max].
    #[inline]
    pub fn next_f64_range(&mut self, min: f64, max: f64) -> f64 {
        if min >= max {
            return min;
        }
        min + (max - min) * self.next_unit()
    }

    /// Shuffle a slice in place using Fisher-Yates algorithm.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        let len = slice.len();
        for i in (1..len).rev() {
            let j = self.next_int((i + 1) as u32) as usize;
            slice.swap(i, j);
        }
    }

    /// Select a random element from a slice.
    pub fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        if slice.is_empty() {
            None
        } else {
            let idx = self.next_index(slice.len());
            Some(&slice[idx])
        }
    }

    /// Pick `count` distinct elements (partial Fisher-Yates).
    ///
    /// Returns fewer than `count` elements if the slice is shorter.
    pub fn sample<T: Clone>(&mut self, slice: &[T], count: usize) -> Vec<T> {
        let mut pool: Vec<T> = slice.to_vec();
        let take = count.min(pool.len());
        for i in 0..take {
            let j = i + self.next_index(pool.len() - i);
            pool.swap(i, j);
        }
        pool.truncate(take);
        pool
    }

    /// Get current state (recorded in match reports).
    pub fn state(&self) -> [u64; 2] {
        self.state
    }
}

/// SplitMix64 for seed initialization.
/// Produces well-distributed values from sequential seeds.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive a match seed from the match id and difficulty.
///
/// Two matches with the same id but different difficulty get unrelated boards.
pub fn derive_match_seed(match_id: &[u8; 16], difficulty: Difficulty) -> u64 {
    let mut hasher = Sha256::new();

    // Domain separator
    hasher.update(b"MATCHING_ANIMALS_SEED_V1");
    hasher.update(match_id);
    hasher.update([difficulty as u8]);

    let hash = hasher.finalize();

    let mut seed = [0u8; 8];
    seed.copy_from_slice(&hash[0..8]);
    u64::from_le_bytes(seed)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_determinism() {
        let mut rng1 = DeterministicRng::new(12345);
        let mut rng2 = DeterministicRng::new(12345);

        for _ in 0..1000 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_rng_different_seeds() {
        let mut rng1 = DeterministicRng::new(12345);
        let mut rng2 = DeterministicRng::new(54321);

        // Very unlikely to match
        assert_ne!(rng1.next_u64(), rng2.next_u64());
    }

    #[test]
    fn test_next_int_range() {
        let mut rng = DeterministicRng::new(5678);

        for _ in 0..1000 {
            let val = rng.next_int_range(3, 5);
            assert!((3..=5).contains(&val));
        }

        // Edge case: min = max
        assert_eq!(rng.next_int_range(5, 5), 5);
        assert_eq!(rng.next_int(0), 0);
    }

    #[test]
    fn test_next_f64_range() {
        let mut rng = DeterministicRng::new(9999);

        for _ in 0..1000 {
            let val = rng.next_f64_range(0.9, 1.1);
            assert!((0.9..=1.1).contains(&val));
        }
    }

    #[test]
    fn test_sample_is_distinct() {
        let mut rng = DeterministicRng::new(4242);
        let items: Vec<u32> = (0..20).collect();

        let mut picked = rng.sample(&items, 7);
        assert_eq!(picked.len(), 7);
        picked.sort_unstable();
        picked.dedup();
        assert_eq!(picked.len(), 7);

        // Asking for more than available returns everything
        assert_eq!(rng.sample(&items[..3], 10).len(), 3);
    }

    #[test]
    fn test_shuffle_determinism() {
        let mut rng1 = DeterministicRng::new(1111);
        let mut rng2 = DeterministicRng::new(1111);

        let mut arr1 = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        let mut arr2 = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];

        rng1.shuffle(&mut arr1);
        rng2.shuffle(&mut arr2);

        assert_eq!(arr1, arr2);
    }

    #[test]
    fn test_derive_match_seed() {
        let match_id = [1u8; 16];

        let seed1 = derive_match_seed(&match_id, Difficulty::Normal);
        let seed2 = derive_match_seed(&match_id, Difficulty::Normal);
        assert_eq!(seed1, seed2);

        let seed3 = derive_match_seed(&match_id, Difficulty::Lunatic);
        assert_ne!(seed1, seed3);
    }

    #[test]
    fn test_state_tracks_draws() {
        let mut rng1 = DeterministicRng::new(5555);
        let mut rng2 = DeterministicRng::new(5555);

        for _ in 0..50 {
            rng1.next_u64();
            rng2.next_u64();
        }
        assert_eq!(rng1.state(), rng2.state());

        rng1.next_u64();
        assert_ne!(rng1.state(), rng2.state());
    }
}
