/*!
Interfaces to the host that owns the world being scanned
*/

use std::path::Path;

use serde::{Deserialize, Serialize};

/// A world whose region files are being scanned. Borrowed for each poll and
/// only ever queried, never cached.
pub trait World {
    fn name(&self) -> &str;

    /// Root folder containing `region`, `DIM-1/region` or `DIM1/region`
    fn storage_root(&self) -> &Path;

    /// Whether the host currently has this chunk loaded
    fn is_chunk_active(&self, x: i32, z: i32) -> bool;
}

/// Emitted once for every chunk whose data was removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDeletion {
    pub world: String,
    pub chunk_x: i32,
    pub chunk_z: i32,
}

/// Receiver of chunk deletion notifications
pub trait DeletionSink {
    fn chunk_deleted(&mut self, deletion: ChunkDeletion);
}

/// Buffers notifications for delivery after the poll returns
impl DeletionSink for Vec<ChunkDeletion> {
    fn chunk_deleted(&mut self, deletion: ChunkDeletion) {
        self.push(deletion);
    }
}
