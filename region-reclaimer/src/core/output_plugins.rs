/*!
Modular output system for chunk deletion notifications
*/

use std::fs::OpenOptions;
use std::io::Write;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use region_store::{ChunkDeletion, ChunkPos};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::core::config::{OutputConfig, OutputPlugin, TerminalFormat};

/// A deleted chunk as delivered to outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletionRecord {
    pub world: String,
    pub chunk_x: i32,
    pub chunk_z: i32,
    pub region_x: i32,
    pub region_z: i32,
    pub deleted_at: DateTime<Utc>,
}

impl DeletionRecord {
    pub fn new(deletion: &ChunkDeletion, deleted_at: DateTime<Utc>) -> Self {
        let region = ChunkPos::new(deletion.chunk_x, deletion.chunk_z).region();
        Self {
            world: deletion.world.clone(),
            chunk_x: deletion.chunk_x,
            chunk_z: deletion.chunk_z,
            region_x: region.x,
            region_z: region.z,
            deleted_at,
        }
    }
}

/// Trait for output plugins
#[async_trait]
pub trait OutputHandler: Send {
    /// Name of the output handler
    fn name(&self) -> &'static str;

    /// Initialize the output handler (create files, connections, etc.)
    async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error>>;

    /// Handle a deleted chunk
    async fn handle_deletion(&mut self, record: &DeletionRecord) -> Result<(), Box<dyn std::error::Error>>;

    /// Cycle summaries; most outputs ignore them
    async fn handle_cycle(&mut self, _stats: &str) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }

    /// Cleanup/finalize the output handler
    async fn finalize(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}

/// Manages multiple output handlers
pub struct OutputManager {
    handlers: Vec<Box<dyn OutputHandler>>,
}

impl OutputManager {
    pub fn new(configs: &[OutputConfig]) -> Self {
        let mut handlers: Vec<Box<dyn OutputHandler>> = Vec::new();

        for config in configs {
            if !config.enabled {
                continue;
            }

            let handler: Box<dyn OutputHandler> = match &config.plugin {
                OutputPlugin::Json { path, pretty } => {
                    Box::new(JsonOutputHandler::new(path.clone(), *pretty))
                }
                OutputPlugin::Sqlite { path, table_name } => {
                    Box::new(SqliteOutputHandler::new(path.clone(), table_name.clone()))
                }
                OutputPlugin::Webhook { url, auth_token } => {
                    Box::new(WebhookOutputHandler::new(url.clone(), auth_token.clone()))
                }
                OutputPlugin::Terminal { format } => {
                    Box::new(TerminalOutputHandler::new(*format))
                }
            };

            handlers.push(handler);
        }

        info!("Initialized output manager with {} handlers", handlers.len());
        Self { handlers }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Initialize all handlers
    pub async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        for handler in &mut self.handlers {
            handler.initialize().await?;
            info!("Initialized output handler: {}", handler.name());
        }
        Ok(())
    }

    /// Send deletions to all enabled handlers, preserving their order
    pub async fn handle_deletions(&mut self, deletions: &[ChunkDeletion]) {
        let now = Utc::now();
        for deletion in deletions {
            let record = DeletionRecord::new(deletion, now);
            for handler in &mut self.handlers {
                if let Err(e) = handler.handle_deletion(&record).await {
                    error!(
                        "Handler {} failed to process deletion of {}, {} in {}: {}",
                        handler.name(),
                        record.chunk_x,
                        record.chunk_z,
                        record.world,
                        e
                    );
                }
            }
        }
    }

    pub async fn handle_cycle(&mut self, stats: &str) {
        for handler in &mut self.handlers {
            if let Err(e) = handler.handle_cycle(stats).await {
                error!("Handler {} failed to process cycle summary: {}", handler.name(), e);
            }
        }
    }

    /// Finalize all handlers
    pub async fn finalize(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        for handler in &mut self.handlers {
            handler.finalize().await?;
        }
        Ok(())
    }
}

/// JSON lines output handler
pub struct JsonOutputHandler {
    file_path: std::path::PathBuf,
    pretty: bool,
    file: Option<std::fs::File>,
}

impl JsonOutputHandler {
    pub fn new(file_path: std::path::PathBuf, pretty: bool) -> Self {
        Self {
            file_path,
            pretty,
            file: None,
        }
    }
}

#[async_trait]
impl OutputHandler for JsonOutputHandler {
    fn name(&self) -> &'static str {
        "JSON"
    }

    async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        self.file = Some(OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?);
        Ok(())
    }

    async fn handle_deletion(&mut self, record: &DeletionRecord) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(ref mut file) = self.file {
            let json_str = if self.pretty {
                serde_json::to_string_pretty(record)?
            } else {
                serde_json::to_string(record)?
            };

            writeln!(file, "{}", json_str)?;
        }
        Ok(())
    }

    async fn handle_cycle(&mut self, _stats: &str) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(ref mut file) = self.file {
            file.flush()?;
        }
        Ok(())
    }

    async fn finalize(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(ref mut file) = self.file {
            file.flush()?;
        }
        Ok(())
    }
}

/// SQLite database output handler
pub struct SqliteOutputHandler {
    file_path: std::path::PathBuf,
    table_name: String,
    conn: Option<Connection>,
}

impl SqliteOutputHandler {
    pub fn new(file_path: std::path::PathBuf, table_name: String) -> Self {
        Self {
            file_path,
            table_name,
            conn: None,
        }
    }

    fn valid_table_name(name: &str) -> bool {
        !name.is_empty()
            && !name.starts_with(|c: char| c.is_ascii_digit())
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    }
}

#[async_trait]
impl OutputHandler for SqliteOutputHandler {
    fn name(&self) -> &'static str {
        "SQLite"
    }

    async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if !Self::valid_table_name(&self.table_name) {
            return Err(format!("invalid table name: {:?}", self.table_name).into());
        }

        let conn = Connection::open(&self.file_path)?;

        // Create the output table
        conn.execute(&format!(r#"
            CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY,
                world TEXT NOT NULL,
                chunk_x INTEGER NOT NULL,
                chunk_z INTEGER NOT NULL,
                region_x INTEGER NOT NULL,
                region_z INTEGER NOT NULL,
                deleted_at INTEGER NOT NULL,
                created_at INTEGER DEFAULT (strftime('%s', 'now'))
            )
        "#, self.table_name), [])?;

        self.conn = Some(conn);
        Ok(())
    }

    async fn handle_deletion(&mut self, record: &DeletionRecord) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(ref conn) = self.conn {
            conn.execute(&format!(
                "INSERT INTO {} (world, chunk_x, chunk_z, region_x, region_z, deleted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                self.table_name
            ), (
                &record.world,
                record.chunk_x,
                record.chunk_z,
                record.region_x,
                record.region_z,
                record.deleted_at.timestamp_millis(),
            ))?;
        }
        Ok(())
    }

    async fn finalize(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // SQLite auto-commits, no special finalization needed
        Ok(())
    }
}

/// Webhook output handler
pub struct WebhookOutputHandler {
    url: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl WebhookOutputHandler {
    pub fn new(url: String, auth_token: Option<String>) -> Self {
        Self {
            url,
            auth_token,
            client: reqwest::Client::new(),
        }
    }

    async fn post<T: Serialize + ?Sized>(&self, payload: &T) -> Result<(), Box<dyn std::error::Error>> {
        let mut request = self.client.post(&self.url);

        if let Some(ref token) = self.auth_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.json(payload).send().await?;

        if !response.status().is_success() {
            return Err(format!("Webhook delivery failed: {}", response.status()).into());
        }

        Ok(())
    }
}

#[async_trait]
impl OutputHandler for WebhookOutputHandler {
    fn name(&self) -> &'static str {
        "Webhook"
    }

    async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Test the webhook endpoint
        self.post(&serde_json::json!({
            "test": true,
            "timestamp": Utc::now().timestamp()
        }))
        .await
        .map_err(|e| format!("Webhook test failed: {}", e).into())
    }

    async fn handle_deletion(&mut self, record: &DeletionRecord) -> Result<(), Box<dyn std::error::Error>> {
        self.post(record).await
    }

    async fn handle_cycle(&mut self, stats: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.post(&serde_json::json!({ "cycle_complete": stats })).await
    }

    async fn finalize(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}

/// Terminal output handler
pub struct TerminalOutputHandler {
    format: TerminalFormat,
}

impl TerminalOutputHandler {
    pub fn new(format: TerminalFormat) -> Self {
        Self { format }
    }

    fn format_deletion(&self, record: &DeletionRecord) -> String {
        let timestamp = record.deleted_at.format("%Y-%m-%d %H:%M:%S");
        match self.format {
            TerminalFormat::Plain => {
                format!(
                    "CHUNK DELETED: {}, {} (r.{}.{}) in {} at {}",
                    record.chunk_x, record.chunk_z, record.region_x, record.region_z, record.world, timestamp
                )
            }
            TerminalFormat::Colored => {
                format!(
                    "\x1b[31m🗑  CHUNK DELETED\x1b[0m \
                     \x1b[36m{}\x1b[0m {}, {} \
                     \x1b[90m(r.{}.{}, {})\x1b[0m",
                    record.world, record.chunk_x, record.chunk_z, record.region_x, record.region_z, timestamp
                )
            }
            TerminalFormat::Json => {
                serde_json::to_string(record).unwrap_or_else(|_| "JSON serialization failed".to_string())
            }
        }
    }
}

#[async_trait]
impl OutputHandler for TerminalOutputHandler {
    fn name(&self) -> &'static str {
        "Terminal"
    }

    async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        match self.format {
            TerminalFormat::Colored => {
                println!("\x1b[32m🚀 Region Reclaimer Started\x1b[0m");
            }
            TerminalFormat::Plain => {
                println!("🚀 Region Reclaimer Started");
            }
            TerminalFormat::Json => {}
        }
        Ok(())
    }

    async fn handle_deletion(&mut self, record: &DeletionRecord) -> Result<(), Box<dyn std::error::Error>> {
        println!("{}", self.format_deletion(record));
        Ok(())
    }

    async fn handle_cycle(&mut self, stats: &str) -> Result<(), Box<dyn std::error::Error>> {
        match self.format {
            TerminalFormat::Colored => println!("\x1b[33m✅ Cycle complete: {}\x1b[0m", stats),
            TerminalFormat::Plain => println!("Cycle complete: {}", stats),
            TerminalFormat::Json => println!("{}", serde_json::json!({ "cycle_complete": stats })),
        }
        Ok(())
    }

    async fn finalize(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        match self.format {
            TerminalFormat::Colored => {
                println!("\x1b[33m🏁 Region Reclaimer Stopped\x1b[0m");
            }
            TerminalFormat::Plain => {
                println!("🏁 Region Reclaimer Stopped");
            }
            TerminalFormat::Json => {}
        }
        Ok(())
    }
}
