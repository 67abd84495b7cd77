//! Bloom Filter
//!
//! Fixed-size probabilistic membership set with exact binary
//! serialization. Returns no false negatives: `might_contain` answering
//! `false` proves the item was never added.

use crate::filters::hash;
use crate::filters::{FORMAT_VERSION, HEADER_LEN};
use crate::{CoreError, CoreResult};

/// Magic number identifying a serialized Bloom filter ("BLOM")
pub const BLOOM_MAGIC: u32 = 0x424C_4F4D;

// =============================================================================
// Bloom Filter
// =============================================================================

/// Probabilistic membership set over byte-string items
#[derive(Clone, Debug, PartialEq)]
pub struct BloomFilter {
    /// Number of addressable bits
    size_bits: u32,
    /// Number of hash probes per item
    num_hashes: u32,
    /// Approximate load counter (additive across merges)
    item_count: u32,
    /// Bit array, LSB-first within each byte
    bits: Vec<u8>,
}

impl BloomFilter {
    /// Creates a filter sized for `expected_items` at the target
    /// false-positive rate.
    ///
    /// Uses the standard sizing formulas `m = ceil(-n ln p / (ln 2)^2)`
    /// and `k = max(1, ceil((m / n) ln 2))`.
    pub fn new(expected_items: usize, false_positive_rate: f64) -> CoreResult<Self> {
        if expected_items == 0 {
            return Err(CoreError::InvalidFilterParams(
                "expected_items must be > 0".to_string(),
            ));
        }
        if !(false_positive_rate > 0.0 && false_positive_rate < 1.0) {
            return Err(CoreError::InvalidFilterParams(format!(
                "false_positive_rate must be in (0, 1), got {}",
                false_positive_rate
            )));
        }

        let n = expected_items as f64;
        let ln2 = std::f64::consts::LN_2;
        let m = (-(n * false_positive_rate.ln()) / (ln2 * ln2)).ceil() as u32;
        let m = m.max(8);
        let k = ((m as f64 / n) * ln2).ceil() as u32;
        let k = k.max(1);

        Self::with_dimensions(m, k)
    }

    /// Creates a filter with explicit dimensions (used by the codec and
    /// by merges).
    pub fn with_dimensions(size_bits: u32, num_hashes: u32) -> CoreResult<Self> {
        if size_bits == 0 || num_hashes == 0 {
            return Err(CoreError::InvalidFilterParams(format!(
                "dimensions must be > 0, got size_bits={} num_hashes={}",
                size_bits, num_hashes
            )));
        }
        let byte_len = (size_bits as usize).div_ceil(8);
        Ok(Self {
            size_bits,
            num_hashes,
            item_count: 0,
            bits: vec![0u8; byte_len],
        })
    }

    /// Adds an item to the set.
    pub fn add(&mut self, item: &[u8]) {
        let (h1, h2) = hash::hash_pair(item);
        for i in 0..self.num_hashes {
            let pos = hash::position(h1, h2, i, u64::from(self.size_bits));
            self.bits[(pos / 8) as usize] |= 1 << (pos % 8);
        }
        self.item_count = self.item_count.saturating_add(1);
    }

    /// Checks membership.
    ///
    /// `false` is definitive; `true` may be a false positive at a rate
    /// converging to the configured target as load approaches capacity.
    pub fn might_contain(&self, item: &[u8]) -> bool {
        let (h1, h2) = hash::hash_pair(item);
        (0..self.num_hashes).all(|i| {
            let pos = hash::position(h1, h2, i, u64::from(self.size_bits));
            self.bits[(pos / 8) as usize] & (1 << (pos % 8)) != 0
        })
    }

    /// Merges two filters of identical dimensions into their union.
    ///
    /// `item_count` is the sum of both inputs: an approximate load
    /// counter, not an exact post-union cardinality.
    pub fn merge(&self, other: &Self) -> CoreResult<Self> {
        if self.size_bits != other.size_bits || self.num_hashes != other.num_hashes {
            return Err(CoreError::FilterMismatch(format!(
                "cannot merge ({} bits, {} hashes) with ({} bits, {} hashes)",
                self.size_bits, self.num_hashes, other.size_bits, other.num_hashes
            )));
        }

        let bits = self
            .bits
            .iter()
            .zip(&other.bits)
            .map(|(a, b)| a | b)
            .collect();

        Ok(Self {
            size_bits: self.size_bits,
            num_hashes: self.num_hashes,
            item_count: self.item_count.saturating_add(other.item_count),
            bits,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn size_bits(&self) -> u32 {
        self.size_bits
    }

    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    pub fn item_count(&self) -> u32 {
        self.item_count
    }

    /// Fraction of bits currently set
    pub fn fill_ratio(&self) -> f64 {
        let set: u32 = self.bits.iter().map(|b| b.count_ones()).sum();
        f64::from(set) / f64::from(self.size_bits)
    }

    /// Estimated false-positive rate at the current load:
    /// `(1 - e^(-k*n/m))^k`
    pub fn estimated_fp_rate(&self) -> f64 {
        let k = f64::from(self.num_hashes);
        let n = f64::from(self.item_count);
        let m = f64::from(self.size_bits);
        (1.0 - (-k * n / m).exp()).powf(k)
    }

    // =========================================================================
    // Binary Codec
    // =========================================================================

    /// Serializes to the exact binary format: a 24-byte little-endian
    /// header (magic, version, size_bits, num_hashes, item_count,
    /// reserved) followed by the bit array.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.bits.len());
        buf.extend_from_slice(&BLOOM_MAGIC.to_le_bytes());
        buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        buf.extend_from_slice(&self.size_bits.to_le_bytes());
        buf.extend_from_slice(&self.num_hashes.to_le_bytes());
        buf.extend_from_slice(&self.item_count.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes()); // reserved
        buf.extend_from_slice(&self.bits);
        buf
    }

    /// Deserializes from the binary format, failing fast on magic or
    /// version mismatch and on truncated payloads.
    pub fn from_bytes(data: &[u8]) -> CoreResult<Self> {
        if data.len() < HEADER_LEN {
            return Err(CoreError::CorruptData(format!(
                "bloom filter header truncated: {} bytes",
                data.len()
            )));
        }

        let magic = read_u32(data, 0);
        if magic != BLOOM_MAGIC {
            return Err(CoreError::CorruptData(format!(
                "bad bloom filter magic: {:#010x}",
                magic
            )));
        }
        let version = read_u32(data, 4);
        if version != FORMAT_VERSION {
            return Err(CoreError::CorruptData(format!(
                "unsupported bloom filter version: {}",
                version
            )));
        }

        let size_bits = read_u32(data, 8);
        let num_hashes = read_u32(data, 12);
        let item_count = read_u32(data, 16);

        let mut filter = Self::with_dimensions(size_bits, num_hashes).map_err(|_| {
            CoreError::CorruptData(format!(
                "invalid bloom filter dimensions: size_bits={} num_hashes={}",
                size_bits, num_hashes
            ))
        })?;

        let expected_len = HEADER_LEN + filter.bits.len();
        if data.len() != expected_len {
            return Err(CoreError::CorruptData(format!(
                "bloom filter payload length {} does not match header (expected {})",
                data.len(),
                expected_len
            )));
        }

        filter.bits.copy_from_slice(&data[HEADER_LEN..]);
        filter.item_count = item_count;
        Ok(filter)
    }
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

// =============================================================================
// Tests
// =============================================================================
