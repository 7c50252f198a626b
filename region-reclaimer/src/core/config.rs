/*!
Configuration management for the region reclaimer
*/

use std::{collections::HashSet, path::{Path, PathBuf}};

use region_store::ScanSettings;
use serde::{Deserialize, Serialize};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReclaimerConfig {
    /// Polling cadence and scan tuning
    pub scheduler: SchedulerConfig,
    /// Visit flag persistence settings
    pub flags: FlagConfig,
    /// Worlds to reclaim space from
    pub worlds: Vec<WorldConfig>,
    /// Where chunk deletion notifications go
    pub outputs: Vec<OutputConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Delay between polls in milliseconds
    pub tick_interval_ms: u64,
    /// Scanning pauses at the next region boundary while this file exists
    pub pause_file: Option<PathBuf>,
    /// Per-poll budget and cycle cooldown
    #[serde(default)]
    pub scan: ScanSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FlagConfig {
    /// Path to the flag database
    pub flag_db_path: PathBuf,
    /// How long a visit protects a chunk (in days)
    pub flag_duration_days: u32,
    /// How long a freshly generated chunk is protected (in days)
    pub generate_duration_days: u32,
}

impl FlagConfig {
    pub fn flag_duration_ms(&self) -> i64 {
        i64::from(self.flag_duration_days) * DAY_MS
    }

    pub fn generate_duration_ms(&self) -> i64 {
        i64::from(self.generate_duration_days) * DAY_MS
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorldConfig {
    /// Name used for flags and notifications
    pub name: String,
    /// World root containing `region` or a dimension folder
    pub path: PathBuf,
    /// JSON list of `[x, z]` chunks the host has loaded, relative to `path`
    /// unless absolute
    pub active_chunks_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Output plugin type
    pub plugin: OutputPlugin,
    /// Whether this output is enabled
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub enum OutputPlugin {
    Json { path: PathBuf, pretty: bool },
    Sqlite { path: PathBuf, table_name: String },
    Webhook { url: String, auth_token: Option<String> },
    Terminal { format: TerminalFormat },
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub enum TerminalFormat {
    Plain,
    Colored,
    Json,
}

impl ReclaimerConfig {
    /// Reject settings the scheduler cannot run with
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.scheduler.scan.validate()?;
        if self.scheduler.tick_interval_ms == 0 {
            return Err("tick_interval_ms must be at least 1".into());
        }

        let mut names = HashSet::new();
        for world in &self.worlds {
            if !names.insert(world.name.as_str()) {
                return Err(format!("world {} is configured twice", world.name).into());
            }
        }
        Ok(())
    }

    pub fn world(&self, name: &str) -> Option<&WorldConfig> {
        self.worlds.iter().find(|world| world.name == name)
    }
}

impl Default for ReclaimerConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig {
                tick_interval_ms: 50,
                pause_file: None,
                scan: ScanSettings::default(),
            },
            flags: FlagConfig {
                flag_db_path: PathBuf::from("./region_flags.db"),
                flag_duration_days: 90,
                generate_duration_days: 7,
            },
            worlds: vec![WorldConfig {
                name: "world".to_string(),
                path: PathBuf::from("./world"),
                active_chunks_file: None,
            }],
            outputs: vec![
                OutputConfig {
                    plugin: OutputPlugin::Terminal {
                        format: TerminalFormat::Colored,
                    },
                    enabled: true,
                },
                OutputConfig {
                    plugin: OutputPlugin::Json {
                        path: PathBuf::from("./deleted_chunks.json"),
                        pretty: false,
                    },
                    enabled: true,
                },
            ],
        }
    }
}

/// `<config dir>/region-reclaimer/config.toml`, falling back to the
/// working directory
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("region-reclaimer"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("config.toml")
}

/// Read and validate a TOML config file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ReclaimerConfig, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path.as_ref())
        .map_err(|e| format!("unable to read {:?}: {}", path.as_ref(), e))?;
    let config: ReclaimerConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
