/*!
The resumable deletion scanner.

[`DeletionScanner::poll`] performs a bounded amount of work and returns, so an
embedding scheduler can drive it from any loop without stalling. All state
lives in a [`cursor::ScanCursor`]; region files are only touched once a
region's full 32x32 sweep has finished.
*/

pub mod completion;
pub mod cursor;
pub mod deletion_scanner;

pub use completion::RegionOutcome;
pub use cursor::ScanCursor;
pub use deletion_scanner::{CycleReport, DeletionScanner, ScanEnv, ScanPoll};
