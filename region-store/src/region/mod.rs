/*!
The fixed 32x32 region layout: coordinates, the pointer table header, and
region folder discovery
*/

pub mod coords;
pub mod enumerator;
pub mod pointer_table;

pub use coords::{CHUNKS_PER_REGION, CHUNKS_PER_REGION_SIDE, ChunkPos, RegionPos, pointer_offset};
pub use enumerator::{REGION_FOLDERS, RegionDirectory, RegionFile};
pub use pointer_table::{POINTER_TABLE_SIZE, PointerTable};
