/*!
Main async coordinator that wires the flag store, world sessions, and
outputs together
*/

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use region_store::{ChunkDeletion, DeletionScanner, ScanEnv, ScanPoll, SqliteFlagger};
use tokio_stream::StreamExt;
use tracing::{error, info};

use crate::core::{
    config::ReclaimerConfig,
    event_system::{Scheduler, SchedulerEvent, WorldSession},
    output_plugins::OutputManager,
    world_adapter::DirectoryWorld,
};

/// Main service that coordinates all components
pub struct Reclaimer {
    config: ReclaimerConfig,
    scheduler: Scheduler,
    output_manager: OutputManager,
}

impl Reclaimer {
    /// Create a new reclaimer
    pub async fn new(config: ReclaimerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Initializing region reclaimer...");
        config.validate()?;

        let flagger = SqliteFlagger::open(&config.flags.flag_db_path)?;
        let sessions = config
            .worlds
            .iter()
            .map(|world| WorldSession::new(DirectoryWorld::new(world)))
            .collect();
        let scheduler = Scheduler::new(
            sessions,
            flagger,
            config.scheduler.scan.clone(),
            Duration::from_millis(config.scheduler.tick_interval_ms),
            config.scheduler.pause_file.clone(),
        );

        let mut output_manager = OutputManager::new(&config.outputs);
        output_manager.initialize().await?;

        Ok(Self {
            config,
            scheduler,
            output_manager,
        })
    }

    /// Run the scheduling loop. Only returns if the tick stream ends.
    pub async fn start(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🚀 Starting region reclaimer...");
        for world in &self.config.worlds {
            info!("🌍 World {}: {:?}", world.name, world.path);
        }
        info!("💾 Flag DB: {:?}", self.config.flags.flag_db_path);
        info!(
            "🔍 {} chunks per check, next cycle {} ms after the last",
            self.config.scheduler.scan.chunks_per_check, self.config.scheduler.scan.cycle_delay_ms
        );

        let mut event_stream = Box::pin(self.scheduler.start());
        while let Some(event) = event_stream.next().await {
            handle_event(&mut self.output_manager, event).await;
        }

        Ok(())
    }

    /// Run one full cycle over a single world right away, ignoring the
    /// cycle delay and the pause file
    pub async fn sweep(&mut self, world_name: &str) -> Result<String, Box<dyn std::error::Error>> {
        let world_config = self
            .config
            .world(world_name)
            .ok_or_else(|| format!("world {} is not configured", world_name))?;
        let mut world = DirectoryWorld::new(world_config);
        let mut scanner = DeletionScanner::new(&world, self.config.scheduler.scan.clone())?;

        let progress = ProgressBar::new(scanner.regions().len() as u64);
        progress.set_style(
            ProgressStyle::with_template("{spinner} {msg} [{bar:40}] {pos}/{len} regions ({eta})")?
                .progress_chars("=> "),
        );
        progress.set_message(world_name.to_string());

        let report = loop {
            world.refresh_active_chunks()?;

            let mut deleted: Vec<ChunkDeletion> = Vec::new();
            let result = scanner.poll(&mut ScanEnv {
                world: &world,
                oracle: self.scheduler.flagger_mut(),
                sink: &mut deleted,
                paused: false,
                now_ms: chrono::Utc::now().timestamp_millis(),
            });

            progress.set_position(scanner.cursor().region_index as u64);
            if !deleted.is_empty() {
                self.output_manager.handle_deletions(&deleted).await;
            }

            match result {
                ScanPoll::CycleComplete(report) => break report,
                ScanPoll::Progress | ScanPoll::Paused => tokio::task::yield_now().await,
            }
        };

        progress.finish_with_message(format!("{} done", world_name));
        self.output_manager.handle_cycle(&report.stats).await;
        Ok(report.stats)
    }

    /// Flush and close every output
    pub async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🛑 Initiating graceful shutdown...");
        self.output_manager.finalize().await?;
        info!("✅ Shutdown completed successfully");
        Ok(())
    }
}

/// Deliver one scheduler event to the outputs
async fn handle_event(output_manager: &mut OutputManager, event: SchedulerEvent) {
    match event {
        SchedulerEvent::ChunksDeleted(deleted) => {
            output_manager.handle_deletions(&deleted).await;
        }
        SchedulerEvent::CycleComplete {
            world,
            stats,
            next_run_ms,
        } => {
            let next_run = chrono::DateTime::from_timestamp_millis(next_run_ms)
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "never".to_string());
            info!("📈 Cycle complete for {}, next cycle at {}", world, next_run);
            output_manager.handle_cycle(&stats).await;
        }
        SchedulerEvent::WorldUnavailable { world, reason } => {
            error!("⚠️ {} unavailable: {}", world, reason);
        }
    }
}

/// Helper function to create a reclaimer from a config file
pub async fn create_reclaimer_from_config_file<P: AsRef<std::path::Path>>(
    config_path: P,
) -> Result<Reclaimer, Box<dyn std::error::Error>> {
    let config = crate::core::config::load_config(config_path)?;
    Reclaimer::new(config).await
}
