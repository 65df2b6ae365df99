//! Core deterministic primitives.
//!
//! Seeded randomness and state fingerprints. Everything the rules consume
//! that could otherwise differ between runs lives here.

pub mod rng;
pub mod hash;

// Re-export core types
pub use rng::DeterministicRng;
pub use hash::{StateHash, StateHasher, compute_board_hash};
