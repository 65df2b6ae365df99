//! Board Fingerprints
//!
//! Deterministic SHA-256 hashing of board layouts and tile flags, used to
//! compare snapshots and to check that timed effects restore what they touched.

use sha2::{Sha256, Digest};

/// Hash output type (256 bits / 32 bytes)
pub type StateHash = [u8; 32];

/// Deterministic hasher for board state.
///
/// Order of updates is critical for determinism.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for a board layout.
    pub fn for_board() -> Self {
        Self::new(b"MATCHING_ANIMALS_BOARD_V1")
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u16 value (little-endian).
    #[inline]
    pub fn update_u16(&mut self, value: u16) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

/// Compute a board fingerprint.
///
/// Called by `Board::compute_hash()`; the closure adds the per-tile data.
pub fn compute_board_hash<F>(cols: usize, rows: usize, add_tiles: F) -> StateHash
where
    F: FnOnce(&mut StateHasher),
{
    let mut hasher = StateHasher::for_board();

    // Dimensions first so equal tile streams on different shapes differ
    hasher.update_u32(cols as u32);
    hasher.update_u32(rows as u32);

    add_tiles(&mut hasher);

    hasher.finalize()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_hasher_determinism() {
        let make_hash = || {
            let mut hasher = StateHasher::for_board();
            hasher.update_u32(100);
            hasher.update_u16(7);
            hasher.update_bool(true);
            hasher.finalize()
        };

        assert_eq!(make_hash(), make_hash());
    }

    #[test]
    fn test_hash_order_matters() {
        let hash1 = {
            let mut h = StateHasher::new(b"test");
            h.update_u32(1);
            h.update_u32(2);
            h.finalize()
        };

        let hash2 = {
            let mut h = StateHasher::new(b"test");
            h.update_u32(2);
            h.update_u32(1);
            h.finalize()
        };

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_domain_separation() {
        let hash = |domain: &[u8]| {
            let mut h = StateHasher::new(domain);
            h.update_u32(1234);
            h.finalize()
        };
        assert_ne!(hash(b"DOMAIN_A"), hash(b"DOMAIN_B"));
    }

    #[test]
    fn test_board_hash_includes_shape() {
        let tiles = |h: &mut StateHasher| {
            for kind in [1u16, 1, 2, 2] {
                h.update_u16(kind);
            }
        };

        assert_ne!(compute_board_hash(4, 1, tiles), compute_board_hash(2, 2, tiles));
        assert_eq!(compute_board_hash(2, 2, tiles), compute_board_hash(2, 2, tiles));
    }
}
