/*!
Tick-driven scheduling of deletion cycles across every configured world
*/

use std::{path::PathBuf, time::Duration};

use region_store::{
    ChunkDeletion, DeletionScanner, ScanEnv, ScanPoll, ScanSettings, SqliteFlagger, VisitOracle,
    World,
};
use tokio_stream::{Stream, StreamExt, wrappers::IntervalStream};
use tracing::{info, warn};

use crate::core::world_adapter::DirectoryWorld;

/// Events emitted by the scheduler
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// Chunks removed during one poll, in notification order
    ChunksDeleted(Vec<ChunkDeletion>),
    /// A world finished a full cycle
    CycleComplete {
        world: String,
        stats: String,
        next_run_ms: i64,
    },
    /// A world could not be scanned this time around
    WorldUnavailable { world: String, reason: String },
}

/// One world and the scanner currently walking it, if any
pub struct WorldSession {
    world: DirectoryWorld,
    scanner: Option<DeletionScanner>,
    next_run_ms: i64,
}

impl WorldSession {
    pub fn new(world: DirectoryWorld) -> Self {
        Self {
            world,
            scanner: None,
            next_run_ms: 0,
        }
    }

    pub fn world(&self) -> &DirectoryWorld {
        &self.world
    }

    pub fn next_run_ms(&self) -> i64 {
        self.next_run_ms
    }

    pub fn is_scanning(&self) -> bool {
        self.scanner.is_some()
    }

    /// Start a cycle if one is due, then poll the scanner once
    pub fn tick(
        &mut self,
        oracle: &mut dyn VisitOracle,
        settings: &ScanSettings,
        paused: bool,
        now_ms: i64,
    ) -> Vec<SchedulerEvent> {
        let mut events = Vec::new();

        if self.scanner.is_none() {
            if now_ms < self.next_run_ms {
                return events;
            }
            match DeletionScanner::new(&self.world, settings.clone()) {
                Ok(scanner) => {
                    info!(
                        "Starting deletion cycle for {} ({} regions)",
                        self.world.name(),
                        scanner.regions().len()
                    );
                    self.scanner = Some(scanner);
                }
                Err(e) => {
                    self.next_run_ms = now_ms.saturating_add(settings.cycle_delay_ms);
                    events.push(SchedulerEvent::WorldUnavailable {
                        world: self.world.name().to_string(),
                        reason: e.to_string(),
                    });
                    return events;
                }
            }
        }

        if let Err(e) = self.world.refresh_active_chunks() {
            // Without the host's view of loaded chunks nothing may be deleted
            events.push(SchedulerEvent::WorldUnavailable {
                world: self.world.name().to_string(),
                reason: e.to_string(),
            });
            return events;
        }

        let Some(scanner) = self.scanner.as_mut() else {
            return events;
        };

        let mut deleted: Vec<ChunkDeletion> = Vec::new();
        let result = scanner.poll(&mut ScanEnv {
            world: &self.world,
            oracle,
            sink: &mut deleted,
            paused,
            now_ms,
        });

        if !deleted.is_empty() {
            events.push(SchedulerEvent::ChunksDeleted(deleted));
        }

        if let ScanPoll::CycleComplete(report) = result {
            self.scanner = None;
            self.next_run_ms = report.next_run_ms;
            events.push(SchedulerEvent::CycleComplete {
                world: self.world.name().to_string(),
                stats: report.stats,
                next_run_ms: report.next_run_ms,
            });
        }

        events
    }
}

/// Polls every world session on a fixed interval
pub struct Scheduler {
    sessions: Vec<WorldSession>,
    flagger: SqliteFlagger,
    settings: ScanSettings,
    tick_interval: Duration,
    pause_file: Option<PathBuf>,
}

impl Scheduler {
    pub fn new(
        sessions: Vec<WorldSession>,
        flagger: SqliteFlagger,
        settings: ScanSettings,
        tick_interval: Duration,
        pause_file: Option<PathBuf>,
    ) -> Self {
        Self {
            sessions,
            flagger,
            settings,
            tick_interval,
            pause_file,
        }
    }

    pub fn flagger_mut(&mut self) -> &mut SqliteFlagger {
        &mut self.flagger
    }

    fn is_paused(&self) -> bool {
        self.pause_file.as_ref().is_some_and(|path| path.exists())
    }

    /// Run one tick for every world
    pub fn tick(&mut self, now_ms: i64) -> Vec<SchedulerEvent> {
        let paused = self.is_paused();
        let mut events = Vec::new();
        for session in &mut self.sessions {
            events.extend(session.tick(&mut self.flagger, &self.settings, paused, now_ms));
        }
        events
    }

    /// Start ticking. The stream never ends on its own.
    pub fn start(&mut self) -> impl Stream<Item = SchedulerEvent> + '_ {
        info!(
            "Scheduling {} worlds every {:?}",
            self.sessions.len(),
            self.tick_interval
        );
        let mut interval_stream = IntervalStream::new(tokio::time::interval(self.tick_interval));

        async_stream::stream! {
            while interval_stream.next().await.is_some() {
                let now_ms = chrono::Utc::now().timestamp_millis();
                for event in self.tick(now_ms) {
                    if let SchedulerEvent::WorldUnavailable { world, reason } = &event {
                        warn!("Skipping {}: {}", world, reason);
                    }
                    yield event;
                }
            }
        }
    }
}
