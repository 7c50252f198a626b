/*!
Visit status classification and the oracle that supplies it
*/

pub mod sqlite;

use crate::error::FlagError;

/// How recently a chunk was used, from most to least deletable.
///
/// Chunks strictly below [`VisitStatus::Generated`] are always eligible for
/// deletion; `Generated` chunks are eligible only when generate-only deletion
/// is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VisitStatus {
    /// Flagged, but the chunk's region data is already gone
    Orphaned,
    /// Visit flag has expired
    Unvisited,
    /// Generated but never visited, and the generation flag has expired
    Generated,
    /// Visit flag is still live
    Visited,
    /// Never deleted
    Permanent,
    /// No flag recorded
    Unknown,
}

impl VisitStatus {
    pub fn is_deletion_eligible(self, generate_only_enabled: bool) -> bool {
        self < VisitStatus::Generated || (generate_only_enabled && self == VisitStatus::Generated)
    }
}

/// Source of visit status, and owner of the persisted flags behind it
pub trait VisitOracle {
    fn status(&self, world: &str, x: i32, z: i32) -> Result<VisitStatus, FlagError>;

    /// Forget the flag of a single chunk
    fn unflag_chunk(&mut self, world: &str, x: i32, z: i32) -> Result<(), FlagError>;

    /// Forget every flag in the region whose origin chunk is given
    fn unflag_region(&mut self, world: &str, origin_x: i32, origin_z: i32)
    -> Result<(), FlagError>;
}
