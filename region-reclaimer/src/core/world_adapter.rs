/*!
On-disk world folders exposed to the scanner
*/

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use region_store::World;
use tracing::debug;

use crate::core::config::WorldConfig;

/// A world folder whose loaded chunks are published by the host in a JSON
/// sidecar file of `[x, z]` pairs
pub struct DirectoryWorld {
    name: String,
    root: PathBuf,
    active_chunks_file: Option<PathBuf>,
    active: HashSet<(i32, i32)>,
}

impl DirectoryWorld {
    pub fn new(config: &WorldConfig) -> Self {
        let active_chunks_file = config.active_chunks_file.as_ref().map(|file| {
            if file.is_absolute() {
                file.clone()
            } else {
                config.path.join(file)
            }
        });

        Self {
            name: config.name.clone(),
            root: config.path.clone(),
            active_chunks_file,
            active: HashSet::new(),
        }
    }

    /// Reload the host's loaded chunk list. A missing sidecar means nothing
    /// is loaded; an unreadable one is an error and the caller must not scan.
    pub fn refresh_active_chunks(&mut self) -> Result<usize, Box<dyn std::error::Error>> {
        let Some(path) = &self.active_chunks_file else {
            return Ok(0);
        };

        if !path.exists() {
            self.active.clear();
            return Ok(0);
        }

        let content = std::fs::read_to_string(path)?;
        let chunks: Vec<[i32; 2]> = if content.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&content)
                .map_err(|e| format!("malformed active chunk list {:?}: {}", path, e))?
        };

        self.active = chunks.into_iter().map(|[x, z]| (x, z)).collect();
        debug!("{} has {} active chunks", self.name, self.active.len());
        Ok(self.active.len())
    }
}

impl World for DirectoryWorld {
    fn name(&self) -> &str {
        &self.name
    }

    fn storage_root(&self) -> &Path {
        &self.root
    }

    fn is_chunk_active(&self, x: i32, z: i32) -> bool {
        self.active.contains(&(x, z))
    }
}
