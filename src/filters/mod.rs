//! Probabilistic Filters Module
//!
//! Fixed-size probabilistic set and frequency structures with exact
//! binary serialization. These guard the per-source content indexes so
//! queries can skip sources that definitely do not contain an entity.

pub mod hash;

mod bloom;
pub use bloom::BloomFilter;

mod sketch;
pub use sketch::CountMinSketch;

/// Binary format version shared by all filter codecs
pub const FORMAT_VERSION: u32 = 1;

/// Fixed header length for all filter codecs (six little-endian u32 fields)
pub const HEADER_LEN: usize = 24;
