//! Deterministic bucketing for `PERCENTAGE` rules.
//!
//! Buckets must be identical across processes and across runtimes evaluating the same flag, so the
//! hash is pinned to XXH32 over the UTF-8 bytes of the value.
use xxhash_rust::xxh32::xxh32;

/// Map `input` to a point in `[0, 1)` using a seeded 32-bit hash.
pub fn bucket(input: impl AsRef<[u8]>, seed: u32) -> f64 {
    let hash = xxh32(input.as_ref(), seed);
    let value = f64::from(hash) / f64::from(u32::MAX);
    if value == 1.0 {
        // Keep the upper bound exclusive.
        value - f64::EPSILON
    } else {
        value
    }
}
