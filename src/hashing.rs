//! Fast non-cryptographic hashing used for lookup tables and for deriving per-stream seeds.
//!
//! Lookup tables keyed by external ids use `FxHashMap`. Iteration order of these maps is never
//! relied upon; anything iterated during a simulation step is stored in insertion order.

use std::hash::Hasher;

pub use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

/// Hashes a string with `FxHasher`. The result is stable across runs and platforms of the same
/// pointer width, which is what makes named random streams reproducible.
pub fn hash_str(data: &str) -> u64 {
    let mut hasher = rustc_hash::FxHasher::default();
    hasher.write(data.as_bytes());
    hasher.finish()
}
