/*!
Chunk and region coordinate math
*/

use std::fmt;

use serde::{Deserialize, Serialize};

/// Chunks along one edge of a region
pub const CHUNKS_PER_REGION_SIDE: i32 = 32;

/// Chunks held by a single region file
pub const CHUNKS_PER_REGION: usize = 1024;

/// Absolute chunk coordinates
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Region containing this chunk
    pub fn region(&self) -> RegionPos {
        RegionPos {
            x: self.x.div_euclid(CHUNKS_PER_REGION_SIDE),
            z: self.z.div_euclid(CHUNKS_PER_REGION_SIDE),
        }
    }

    /// Position within the containing region, each axis in `0..32`
    pub fn local(&self) -> (i32, i32) {
        (
            self.x.rem_euclid(CHUNKS_PER_REGION_SIDE),
            self.z.rem_euclid(CHUNKS_PER_REGION_SIDE),
        )
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.x, self.z)
    }
}

/// Region coordinates as they appear in a region file name
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct RegionPos {
    pub x: i32,
    pub z: i32,
}

impl RegionPos {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Parse `r.<x>.<z>.<ext>`, e.g. `r.0.-1.mca`.
    ///
    /// Regions whose origin chunk would not fit in an `i32` are rejected.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let mut parts = name.split('.');
        let (Some("r"), Some(x), Some(z), Some(ext), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return None;
        };

        if ext.is_empty() || !ext.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return None;
        }

        let pos = Self {
            x: parse_coordinate(x)?,
            z: parse_coordinate(z)?,
        };
        pos.x.checked_mul(CHUNKS_PER_REGION_SIDE)?;
        pos.z.checked_mul(CHUNKS_PER_REGION_SIDE)?;
        Some(pos)
    }

    /// First chunk of the region, `(x << 5, z << 5)`
    pub fn origin(&self) -> ChunkPos {
        ChunkPos {
            x: self.x * CHUNKS_PER_REGION_SIDE,
            z: self.z * CHUNKS_PER_REGION_SIDE,
        }
    }
}

impl fmt::Display for RegionPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r.{}.{}", self.x, self.z)
    }
}

/// Only an optional minus sign followed by digits, no `+` and no whitespace.
fn parse_coordinate(raw: &str) -> Option<i32> {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// Byte offset of a chunk's entry in the pointer table of the region whose
/// origin is `origin`.
pub fn pointer_offset(origin: ChunkPos, chunk: ChunkPos) -> usize {
    let dx = chunk.x - origin.x;
    let dz = chunk.z - origin.z;
    debug_assert!((0..CHUNKS_PER_REGION_SIDE).contains(&dx));
    debug_assert!((0..CHUNKS_PER_REGION_SIDE).contains(&dz));
    4 * (dx + dz * CHUNKS_PER_REGION_SIDE) as usize
}
