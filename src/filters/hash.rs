//! Hash Family for Probabilistic Filters
//!
//! Derives the k "independent" hash functions used by the Bloom filter
//! and count-min sketch from a single 128-bit MurmurHash3 digest via
//! double hashing (Kirsch-Mitzenmacher): `h_i = h1 + i * h2`.

use std::io::Cursor;

/// Computes the `(h1, h2)` base pair for double hashing.
pub fn hash_pair(item: &[u8]) -> (u64, u64) {
    let mut cursor = Cursor::new(item);
    // Reading from an in-memory cursor cannot fail.
    let hash = murmur3::murmur3_x64_128(&mut cursor, 0).unwrap_or(0);
    let h1 = hash as u64;
    // Force h2 odd so the probe sequence cannot collapse onto one slot.
    let h2 = ((hash >> 64) as u64) | 1;
    (h1, h2)
}

/// Returns the i-th probe position in `[0, m)`.
pub fn position(h1: u64, h2: u64, i: u32, m: u64) -> u64 {
    debug_assert!(m > 0);
    h1.wrapping_add(u64::from(i).wrapping_mul(h2)) % m
}

// =============================================================================
// Tests
// =============================================================================
