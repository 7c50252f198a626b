/*!
Region folder discovery and region file listing
*/

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{error::RegionError, region::coords::RegionPos};

/// Region folders relative to the world root, in preference order
pub const REGION_FOLDERS: [&str; 3] = ["region", "DIM-1/region", "DIM1/region"];

/// A region file discovered on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionFile {
    pub pos: RegionPos,
    pub file_name: String,
    pub path: PathBuf,
}

/// The region folder of one world
#[derive(Debug, Clone)]
pub struct RegionDirectory {
    path: PathBuf,
}

impl RegionDirectory {
    /// Find the first existing region folder under `world_root`
    pub fn locate(world_name: &str, world_root: &Path) -> Result<Self, RegionError> {
        REGION_FOLDERS
            .iter()
            .map(|folder| world_root.join(folder))
            .find(|path| path.is_dir())
            .map(|path| {
                debug!("Using region folder {:?} for {}", path, world_name);
                Self { path }
            })
            .ok_or_else(|| RegionError::NoRegionFolder {
                world: world_name.to_string(),
                root: world_root.to_path_buf(),
            })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// List region files sorted by file name. Anything that is not a regular
    /// file named `r.<x>.<z>.<ext>` is ignored.
    pub fn list(&self) -> Result<Vec<RegionFile>, RegionError> {
        let list_failed = |source| RegionError::ListFailed {
            path: self.path.clone(),
            source,
        };

        let mut regions = Vec::new();
        for entry in fs::read_dir(&self.path).map_err(list_failed)? {
            let entry = entry.map_err(list_failed)?;
            let Ok(file_name) = entry.file_name().into_string() else {
                continue;
            };
            let Some(pos) = RegionPos::from_file_name(&file_name) else {
                continue;
            };
            if !entry.file_type().map_err(list_failed)?.is_file() {
                continue;
            }
            regions.push(RegionFile {
                pos,
                path: entry.path(),
                file_name,
            });
        }

        regions.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(regions)
    }
}
