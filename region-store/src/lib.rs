/*!
Region file surgery and resumable stale-chunk deletion.

A world is stored as a set of region files, each covering a 32x32 block of
chunks behind a 4096-byte pointer table. The [`scanner::DeletionScanner`]
walks every region of a world a bounded number of chunks at a time, asks a
[`flags::VisitOracle`] which chunks have gone stale, and either deletes a
whole region file or zeroes the pointer entries of the stale chunks.
*/

pub mod error;
pub mod flags;
pub mod region;
pub mod scanner;
pub mod settings;
pub mod world;

pub use error::{FlagError, RegionError, SettingsError};
pub use flags::{VisitOracle, VisitStatus, sqlite::SqliteFlagger};
pub use region::{ChunkPos, PointerTable, RegionDirectory, RegionFile, RegionPos};
pub use scanner::{CycleReport, DeletionScanner, ScanEnv, ScanPoll};
pub use settings::ScanSettings;
pub use world::{ChunkDeletion, DeletionSink, World};
