/*!
Drives a [`ScanCursor`] across every region of a world, a bounded number of
chunk checks per poll
*/

use tracing::{debug, info, trace, warn};

use crate::{
    error::RegionError,
    flags::{VisitOracle, VisitStatus},
    region::{RegionDirectory, RegionFile},
    scanner::{
        completion::{RegionOutcome, complete_region},
        cursor::ScanCursor,
    },
    settings::ScanSettings,
    world::{DeletionSink, World},
};

/// Regions between progress lines
const PROGRESS_INTERVAL: usize = 20;

/// Collaborators borrowed for the duration of a single poll
pub struct ScanEnv<'a> {
    pub world: &'a dyn World,
    pub oracle: &'a mut dyn VisitOracle,
    pub sink: &'a mut dyn DeletionSink,
    /// Externally toggled; only honoured between regions
    pub paused: bool,
    /// Milliseconds since the Unix epoch
    pub now_ms: i64,
}

/// Result of a single poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanPoll {
    /// Work was done and more remains
    Progress,
    /// Stopped at a region boundary because the scan is paused
    Paused,
    /// Every region has been handled; the scanner should be dropped
    CycleComplete(CycleReport),
}

/// Summary handed back to the scheduler when a cycle ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub stats: String,
    pub regions_deleted: usize,
    pub chunks_deleted: usize,
    /// The next cycle must not start before this instant
    pub next_run_ms: i64,
}

/// One deletion cycle over one world
pub struct DeletionScanner {
    world_name: String,
    regions: Vec<RegionFile>,
    settings: ScanSettings,
    cursor: ScanCursor,
    report: Option<CycleReport>,
}

impl DeletionScanner {
    /// Locate and list the world's region files. Fails if the world has no
    /// region folder at all.
    pub fn new(world: &dyn World, settings: ScanSettings) -> Result<Self, RegionError> {
        let directory = RegionDirectory::locate(world.name(), world.storage_root())?;
        let regions = directory.list()?;
        debug!(
            "Starting deletion cycle for {} with {} regions",
            world.name(),
            regions.len()
        );
        Ok(Self::with_regions(world.name(), regions, settings))
    }

    pub fn with_regions(world_name: &str, regions: Vec<RegionFile>, settings: ScanSettings) -> Self {
        let scanner = Self {
            world_name: world_name.to_string(),
            regions,
            settings,
            cursor: ScanCursor::new(),
            report: None,
        };
        scanner.trace_current_region();
        scanner
    }

    pub fn cursor(&self) -> &ScanCursor {
        &self.cursor
    }

    pub fn regions(&self) -> &[RegionFile] {
        &self.regions
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor.region_index >= self.regions.len()
    }

    /// `<world> - Checked <n>/<total>, deleted <r> regions and <c> chunks`
    pub fn stats(&self) -> String {
        format!(
            "{} - Checked {}/{}, deleted {} regions and {} chunks",
            self.world_name,
            self.cursor.region_index.min(self.regions.len()),
            self.regions.len(),
            self.cursor.regions_deleted,
            self.cursor.chunks_deleted
        )
    }

    /// Perform up to `chunks_per_check` steps.
    ///
    /// With a budget of at most one region, a poll either checks chunks or
    /// completes a region, never both.
    pub fn poll(&mut self, env: &mut ScanEnv<'_>) -> ScanPoll {
        if self.is_exhausted() {
            return ScanPoll::CycleComplete(self.finish(env.now_ms));
        }

        let isolate = self.settings.isolates_region_completion();
        for step in 0..self.settings.chunks_per_check {
            if self.is_exhausted() {
                break;
            }
            if env.paused && self.cursor.at_region_boundary() {
                return ScanPoll::Paused;
            }
            if self.cursor.region_swept() {
                if isolate && step > 0 {
                    break;
                }
                self.complete_current_region(env);
                if isolate {
                    break;
                }
                continue;
            }
            self.check_next_chunk(env);
        }

        if self.is_exhausted() {
            ScanPoll::CycleComplete(self.finish(env.now_ms))
        } else {
            ScanPoll::Progress
        }
    }

    fn check_next_chunk(&mut self, env: &mut ScanEnv<'_>) {
        let origin = self.regions[self.cursor.region_index].pos.origin();
        let chunk = self.cursor.current_chunk(origin);

        let status = env
            .oracle
            .status(&self.world_name, chunk.x, chunk.z)
            .unwrap_or_else(|err| {
                warn!("Unable to read flag for chunk {} in {}: {}", chunk, self.world_name, err);
                VisitStatus::Unknown
            });
        if status.is_deletion_eligible(self.settings.generate_only_enabled) {
            self.cursor.pending.push(chunk);
        }

        self.cursor.advance_chunk();
    }

    fn complete_current_region(&mut self, env: &mut ScanEnv<'_>) {
        let region = &self.regions[self.cursor.region_index];
        match complete_region(env, region, &mut self.cursor.pending) {
            RegionOutcome::Untouched => {}
            RegionOutcome::FileDeleted { notified } => {
                debug!("Removed {} of {} ({} chunks)", region.file_name, self.world_name, notified);
                self.cursor.regions_deleted += 1;
            }
            RegionOutcome::ChunksWiped { wiped, orphaned } => {
                if orphaned > 0 {
                    debug!(
                        "{} eligible chunks of {} in {} were already empty",
                        orphaned, region.file_name, self.world_name
                    );
                }
                self.cursor.chunks_deleted += wiped;
            }
            RegionOutcome::Failed(err) => {
                debug!("Skipping {} of {} this cycle: {}", region.file_name, self.world_name, err);
            }
        }

        self.cursor.next_region();
        if self.cursor.region_index % PROGRESS_INTERVAL == 0 {
            debug!("{}", self.stats());
        }
        self.trace_current_region();
    }

    fn trace_current_region(&self) {
        if let Some(region) = self.regions.get(self.cursor.region_index) {
            trace!(
                "Checking {}:{} ({}/{})",
                self.world_name,
                region.file_name,
                self.cursor.region_index,
                self.regions.len()
            );
        }
    }

    fn finish(&mut self, now_ms: i64) -> CycleReport {
        if let Some(report) = &self.report {
            return report.clone();
        }

        let stats = self.stats();
        info!("Deletion cycle complete for {}", stats);
        let report = CycleReport {
            stats,
            regions_deleted: self.cursor.regions_deleted,
            chunks_deleted: self.cursor.chunks_deleted,
            next_run_ms: now_ms.saturating_add(self.settings.cycle_delay_ms),
        };
        self.report = Some(report.clone());
        report
    }
}
