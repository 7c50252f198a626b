/*!
Errors raised while locating, reading, or rewriting region data
*/

use std::{io, path::PathBuf};

use thiserror::Error;

/// Failures touching region folders and region files
#[derive(Debug, Error)]
pub enum RegionError {
    /// None of the known region folders exist under the world root
    #[error("world {world} has no generated terrain under {root}")]
    NoRegionFolder { world: String, root: PathBuf },
    /// The region folder could not be listed
    #[error("unable to list {path}: {source}")]
    ListFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Whole-file deletion failed or the file is already gone
    #[error("unable to delete {path}: {reason}")]
    DeleteFailed { path: PathBuf, reason: String },
    /// The file is read-only and could not be made writable
    #[error("unable to set {path} writable")]
    NotWritable { path: PathBuf },
    /// Reading or writing the pointer table failed
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failures raised by a visit-status oracle
#[derive(Debug, Error)]
pub enum FlagError {
    #[error("flag store error: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("flag store unavailable: {0}")]
    Unavailable(String),
}

/// Invalid scan configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("chunks_per_check must be at least 1, got {0}")]
    InvalidChunksPerCheck(usize),
    #[error("cycle_delay_ms must not be negative, got {0}")]
    NegativeCycleDelay(i64),
}
