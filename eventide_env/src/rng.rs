//! Seeded randomness.
//!
//! Every stochastic entity owns its own ChaCha8 stream, so a run is a pure
//! function of its master seed.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Generator type used by every sandbox.
pub type SimRng = ChaCha8Rng;

/// Creates a generator from a 64-bit seed.
pub fn seeded(seed: u64) -> SimRng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Derives an independent sub-stream seed from a master seed.
///
/// Distinct `stream` values give unrelated seeds; the same pair always gives
/// the same seed.
pub fn derive_seed(master: u64, stream: u64) -> u64 {
    let mut z = master
        .wrapping_mul(0x9e3779b97f4a7c15)
        .wrapping_add(stream.wrapping_mul(0x517cc1b727220a95));
    // splitmix64 finalizer
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}
