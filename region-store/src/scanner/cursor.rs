/*!
Position of a scan within a world: which region, and which chunk of it
*/

use crate::region::{CHUNKS_PER_REGION, CHUNKS_PER_REGION_SIDE, ChunkPos};

/// Scan progress for one world and one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCursor {
    /// Index of the region being swept
    pub region_index: usize,
    /// Offset of the next chunk to check, `0..32`
    pub dx: i32,
    /// Row of the next chunk to check; `32` once the region is swept
    pub dz: i32,
    /// Chunks of the current region found eligible, in check order
    pub pending: Vec<ChunkPos>,
    pub regions_deleted: usize,
    pub chunks_deleted: usize,
}

impl ScanCursor {
    pub fn new() -> Self {
        Self {
            region_index: 0,
            dx: 0,
            dz: 0,
            pending: Vec::with_capacity(CHUNKS_PER_REGION),
            regions_deleted: 0,
            chunks_deleted: 0,
        }
    }

    /// No chunk of the current region has been checked yet
    pub fn at_region_boundary(&self) -> bool {
        self.dx == 0 && self.dz == 0
    }

    /// Every chunk of the current region has been checked
    pub fn region_swept(&self) -> bool {
        self.dz >= CHUNKS_PER_REGION_SIDE
    }

    pub fn current_chunk(&self, origin: ChunkPos) -> ChunkPos {
        ChunkPos::new(origin.x + self.dx, origin.z + self.dz)
    }

    /// Raster order: x fastest, then z
    pub fn advance_chunk(&mut self) {
        self.dx += 1;
        if self.dx >= CHUNKS_PER_REGION_SIDE {
            self.dx = 0;
            self.dz += 1;
        }
    }

    pub fn next_region(&mut self) {
        self.pending.clear();
        self.dx = 0;
        self.dz = 0;
        self.region_index += 1;
    }
}

impl Default for ScanCursor {
    fn default() -> Self {
        Self::new()
    }
}
