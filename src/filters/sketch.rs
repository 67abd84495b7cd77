//! Count-Min Sketch
//!
//! Fixed-size probabilistic frequency table with exact binary
//! serialization. Estimates never undercount the true frequency; they
//! may overcount due to hash collisions, bounded by `total_count / width`
//! with confidence tied to `depth`.

use crate::filters::hash;
use crate::filters::{FORMAT_VERSION, HEADER_LEN};
use crate::{CoreError, CoreResult};

/// Magic number identifying a serialized count-min sketch ("CMSH")
pub const SKETCH_MAGIC: u32 = 0x434D_5348;

// =============================================================================
// Count-Min Sketch
// =============================================================================

/// Probabilistic frequency table over byte-string items
#[derive(Clone, Debug, PartialEq)]
pub struct CountMinSketch {
    /// Columns per row
    width: u32,
    /// Number of rows (independent hash functions)
    depth: u32,
    /// Row-major counter table, `width * depth` cells
    table: Vec<u32>,
    /// Total of all added counts
    total_count: u64,
}

impl CountMinSketch {
    /// Creates a sketch with the given table dimensions.
    pub fn new(width: u32, depth: u32) -> CoreResult<Self> {
        if width == 0 || depth == 0 {
            return Err(CoreError::InvalidFilterParams(format!(
                "dimensions must be > 0, got width={} depth={}",
                width, depth
            )));
        }
        let cells = (width as usize)
            .checked_mul(depth as usize)
            .ok_or_else(|| {
                CoreError::InvalidFilterParams(format!(
                    "table too large: width={} depth={}",
                    width, depth
                ))
            })?;
        Ok(Self {
            width,
            depth,
            table: vec![0u32; cells],
            total_count: 0,
        })
    }

    /// Adds `count` occurrences of an item.
    ///
    /// Each row cell saturates at `u32::MAX` instead of wrapping.
    pub fn add(&mut self, item: &[u8], count: u32) {
        let (h1, h2) = hash::hash_pair(item);
        for row in 0..self.depth {
            let col = hash::position(h1, h2, row, u64::from(self.width));
            let cell = (row as usize) * (self.width as usize) + col as usize;
            self.table[cell] = self.table[cell].saturating_add(count);
        }
        self.total_count = self.total_count.saturating_add(u64::from(count));
    }

    /// Estimates the frequency of an item: the minimum across all rows.
    pub fn estimate(&self, item: &[u8]) -> u64 {
        let (h1, h2) = hash::hash_pair(item);
        (0..self.depth)
            .map(|row| {
                let col = hash::position(h1, h2, row, u64::from(self.width));
                self.table[(row as usize) * (self.width as usize) + col as usize]
            })
            .min()
            .map(u64::from)
            .unwrap_or(0)
    }

    /// Merges two sketches of identical dimensions by element-wise
    /// saturating sum.
    pub fn merge(&self, other: &Self) -> CoreResult<Self> {
        if self.width != other.width || self.depth != other.depth {
            return Err(CoreError::FilterMismatch(format!(
                "cannot merge {}x{} sketch with {}x{}",
                self.width, self.depth, other.width, other.depth
            )));
        }

        let table = self
            .table
            .iter()
            .zip(&other.table)
            .map(|(a, b)| a.saturating_add(*b))
            .collect();

        Ok(Self {
            width: self.width,
            depth: self.depth,
            table,
            total_count: self.total_count.saturating_add(other.total_count),
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Worst-case additive overcount at the current load:
    /// `total_count / width`
    pub fn error_bound(&self) -> f64 {
        self.total_count as f64 / f64::from(self.width)
    }

    // =========================================================================
    // Binary Codec
    // =========================================================================

    /// Serializes to the exact binary format: a 24-byte little-endian
    /// header (magic, version, width, depth, total_count, reserved)
    /// followed by the flat u32 counter table.
    ///
    /// The header count field is 32-bit; totals beyond `u32::MAX`
    /// saturate on serialization.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.table.len() * 4);
        buf.extend_from_slice(&SKETCH_MAGIC.to_le_bytes());
        buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        buf.extend_from_slice(&self.width.to_le_bytes());
        buf.extend_from_slice(&self.depth.to_le_bytes());
        let count = u32::try_from(self.total_count).unwrap_or(u32::MAX);
        buf.extend_from_slice(&count.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes()); // reserved
        for cell in &self.table {
            buf.extend_from_slice(&cell.to_le_bytes());
        }
        buf
    }

    /// Deserializes from the binary format, failing fast on magic or
    /// version mismatch and on truncated payloads.
    pub fn from_bytes(data: &[u8]) -> CoreResult<Self> {
        if data.len() < HEADER_LEN {
            return Err(CoreError::CorruptData(format!(
                "sketch header truncated: {} bytes",
                data.len()
            )));
        }

        let magic = read_u32(data, 0);
        if magic != SKETCH_MAGIC {
            return Err(CoreError::CorruptData(format!(
                "bad sketch magic: {:#010x}",
                magic
            )));
        }
        let version = read_u32(data, 4);
        if version != FORMAT_VERSION {
            return Err(CoreError::CorruptData(format!(
                "unsupported sketch version: {}",
                version
            )));
        }

        let width = read_u32(data, 8);
        let depth = read_u32(data, 12);
        let total_count = read_u32(data, 16);

        let mut sketch = Self::new(width, depth).map_err(|_| {
            CoreError::CorruptData(format!(
                "invalid sketch dimensions: width={} depth={}",
                width, depth
            ))
        })?;

        let expected_len = HEADER_LEN + sketch.table.len() * 4;
        if data.len() != expected_len {
            return Err(CoreError::CorruptData(format!(
                "sketch payload length {} does not match header (expected {})",
                data.len(),
                expected_len
            )));
        }

        for (i, cell) in sketch.table.iter_mut().enumerate() {
            *cell = read_u32(data, HEADER_LEN + i * 4);
        }
        sketch.total_count = u64::from(total_count);
        Ok(sketch)
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
