/*!
Region completion: runs once a region's sweep has finished and decides
between deleting the whole file and wiping individual pointer entries
*/

use std::{
    fs::{self, OpenOptions, Permissions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::Path,
};

use tracing::{debug, trace, warn};

use crate::{
    error::RegionError,
    region::{CHUNKS_PER_REGION, ChunkPos, PointerTable, RegionFile, pointer_offset},
    scanner::ScanEnv,
    world::ChunkDeletion,
};

/// What happened to a region once its sweep completed
#[derive(Debug)]
pub enum RegionOutcome {
    /// Nothing eligible, or everything eligible is in use
    Untouched,
    /// The region file was removed
    FileDeleted { notified: usize },
    /// Pointer entries were zeroed; `orphaned` entries were already zero
    ChunksWiped { wiped: usize, orphaned: usize },
    /// The region was left as it was and will be retried next cycle
    Failed(RegionError),
}

/// Apply the deletions accumulated for `region`.
///
/// Chunks the world currently has loaded are removed from `pending` first
/// and are never touched. Notifications for both the file and the pointer
/// paths are emitted in reverse check order.
pub fn complete_region(
    env: &mut ScanEnv<'_>,
    region: &RegionFile,
    pending: &mut Vec<ChunkPos>,
) -> RegionOutcome {
    let before = pending.len();
    pending.retain(|chunk| !env.world.is_chunk_active(chunk.x, chunk.z));
    if pending.len() < before {
        debug!(
            "{} eligible chunks of {} in {} are in use, skipping them",
            before - pending.len(),
            region.file_name,
            env.world.name()
        );
    }

    if pending.len() == CHUNKS_PER_REGION {
        delete_region_file(env, region, pending)
    } else if !pending.is_empty() {
        match wipe_chunks(env, region, pending) {
            Ok(outcome) => outcome,
            Err(err) => RegionOutcome::Failed(err),
        }
    } else {
        RegionOutcome::Untouched
    }
}

fn delete_region_file(
    env: &mut ScanEnv<'_>,
    region: &RegionFile,
    pending: &[ChunkPos],
) -> RegionOutcome {
    let world = env.world.name().to_string();

    if let Err(err) = fs::remove_file(&region.path) {
        let reason = if err.kind() == io::ErrorKind::NotFound {
            "file no longer exists".to_string()
        } else {
            err.to_string()
        };
        return RegionOutcome::Failed(RegionError::DeleteFailed {
            path: region.path.clone(),
            reason,
        });
    }
    debug!("{} deleted from {}", region.file_name, world);

    let origin = region.pos.origin();
    if let Err(err) = env.oracle.unflag_region(&world, origin.x, origin.z) {
        warn!("Unable to clear flags for {} in {}: {}", region.file_name, world, err);
    }

    for chunk in pending.iter().rev() {
        env.sink.chunk_deleted(ChunkDeletion {
            world: world.clone(),
            chunk_x: chunk.x,
            chunk_z: chunk.z,
        });
    }

    RegionOutcome::FileDeleted {
        notified: pending.len(),
    }
}

fn wipe_chunks(
    env: &mut ScanEnv<'_>,
    region: &RegionFile,
    pending: &[ChunkPos],
) -> Result<RegionOutcome, RegionError> {
    ensure_writable(&region.path)?;

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&region.path)
        .map_err(|source| RegionError::Io {
            path: region.path.clone(),
            source,
        })?;

    rewrite_table(env, region, pending, &mut file, |file| file.sync_data()).map_err(|source| {
        RegionError::Io {
            path: region.path.clone(),
            source,
        }
    })
}

/// Zero the pointer entries of `pending` in `file` and write the table back
/// in one piece. Chunks are only reported once `sync` has succeeded.
fn rewrite_table<F, S>(
    env: &mut ScanEnv<'_>,
    region: &RegionFile,
    pending: &[ChunkPos],
    file: &mut F,
    sync: S,
) -> io::Result<RegionOutcome>
where
    F: Read + Write + Seek,
    S: FnOnce(&mut F) -> io::Result<()>,
{
    let world = env.world.name().to_string();
    let mut table = PointerTable::read_from(file)?;

    let origin = region.pos.origin();
    let mut wiped = Vec::with_capacity(pending.len());
    let mut orphaned = 0;
    for &chunk in pending.iter().rev() {
        // Eligible regardless of whether the write below succeeds
        if let Err(err) = env.oracle.unflag_chunk(&world, chunk.x, chunk.z) {
            warn!("Unable to clear flag for chunk {} in {}: {}", chunk, world, err);
        }

        let offset = pointer_offset(origin, chunk);
        if !table.clear(offset) {
            orphaned += 1;
            continue;
        }

        trace!(
            "Wiping chunk {} from {} in {} of {}",
            chunk, offset, region.file_name, world
        );
        wiped.push(chunk);
    }

    if !wiped.is_empty() {
        // One bulk overwrite, never a seek per entry
        file.seek(SeekFrom::Start(0))?;
        table.write_to(file)?;
        sync(file)?;
        debug!(
            "{} chunks deleted from {} of {}",
            wiped.len(),
            region.file_name,
            world
        );
    }

    for chunk in &wiped {
        env.sink.chunk_deleted(ChunkDeletion {
            world: world.clone(),
            chunk_x: chunk.x,
            chunk_z: chunk.z,
        });
    }

    Ok(RegionOutcome::ChunksWiped {
        wiped: wiped.len(),
        orphaned,
    })
}

/// Give the owner write access if it lacks it
fn ensure_writable(path: &Path) -> Result<(), RegionError> {
    let metadata = fs::metadata(path).map_err(|source| RegionError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut permissions = metadata.permissions();
    if !grant_owner_write(&mut permissions) {
        return Ok(());
    }

    fs::set_permissions(path, permissions).map_err(|_| RegionError::NotWritable {
        path: path.to_path_buf(),
    })
}

/// Returns `false` if the owner could already write
#[cfg(unix)]
fn grant_owner_write(permissions: &mut Permissions) -> bool {
    use std::os::unix::fs::PermissionsExt;

    let mode = permissions.mode();
    if mode & 0o200 != 0 {
        return false;
    }
    permissions.set_mode(mode | 0o200);
    true
}

#[cfg(not(unix))]
fn grant_owner_write(permissions: &mut Permissions) -> bool {
    if !permissions.readonly() {
        return false;
    }
    permissions.set_readonly(false);
    true
}
