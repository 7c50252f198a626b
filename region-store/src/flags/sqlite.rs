/*!
SQLite-backed visit flags.

Each flag row records when a chunk stops being protected. A visit pushes the
expiry forward; once it passes the chunk becomes [`VisitStatus::Unvisited`]
and therefore deletable.
*/

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::{
    error::FlagError,
    flags::{VisitOracle, VisitStatus},
    region::CHUNKS_PER_REGION_SIDE,
};

/// Expiry stored for chunks that must never be deleted
pub const PERMANENT_FLAG: i64 = i64::MAX;

/// Wall-clock source in milliseconds since the Unix epoch
pub trait Clock: Send {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

impl<F> Clock for F
where
    F: Fn() -> i64 + Send,
{
    fn now_ms(&self) -> i64 {
        self()
    }
}

pub struct SqliteFlagger {
    conn: Connection,
    clock: Box<dyn Clock>,
}

impl SqliteFlagger {
    /// Open (or create) a flag database on disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FlagError> {
        let conn = Connection::open(path.as_ref())?;
        let flagger = Self::with_connection(conn, Box::new(SystemClock))?;
        info!("Flag store opened at {:?}", path.as_ref());
        Ok(flagger)
    }

    pub fn open_in_memory() -> Result<Self, FlagError> {
        Self::with_connection(Connection::open_in_memory()?, Box::new(SystemClock))
    }

    pub fn with_connection(conn: Connection, clock: Box<dyn Clock>) -> Result<Self, FlagError> {
        let flagger = Self { conn, clock };
        flagger.initialize_schema()?;
        Ok(flagger)
    }

    /// Replace the clock, mostly useful for tests
    pub fn set_clock(&mut self, clock: Box<dyn Clock>) {
        self.clock = clock;
    }

    fn initialize_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS chunk_flags (
                world TEXT NOT NULL,
                chunk_x INTEGER NOT NULL,
                chunk_z INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                generated_only INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (world, chunk_x, chunk_z)
            );
        "#,
        )
    }

    /// Record a visit to every chunk within `radius` of `(x, z)`, protecting
    /// them for `duration_ms` from now.
    pub fn flag_visited(
        &mut self,
        world: &str,
        x: i32,
        z: i32,
        radius: i32,
        duration_ms: i64,
    ) -> Result<usize, FlagError> {
        let expires_at = self.clock.now_ms().saturating_add(duration_ms);
        let tx = self.conn.transaction()?;
        let mut flagged = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO chunk_flags (world, chunk_x, chunk_z, expires_at, generated_only)
                 VALUES (?1, ?2, ?3, ?4, 0)
                 ON CONFLICT (world, chunk_x, chunk_z) DO UPDATE SET
                    expires_at = MAX(expires_at, excluded.expires_at),
                    generated_only = 0",
            )?;
            for chunk_x in x.saturating_sub(radius)..=x.saturating_add(radius) {
                for chunk_z in z.saturating_sub(radius)..=z.saturating_add(radius) {
                    flagged += stmt.execute(params![world, chunk_x, chunk_z, expires_at])?;
                }
            }
        }
        tx.commit()?;

        debug!("Flagged {} chunks around {}, {} in {}", flagged, x, z, world);
        Ok(flagged)
    }

    /// Record that a chunk was generated. Never downgrades an existing flag.
    pub fn flag_generated(
        &mut self,
        world: &str,
        x: i32,
        z: i32,
        duration_ms: i64,
    ) -> Result<bool, FlagError> {
        let expires_at = self.clock.now_ms().saturating_add(duration_ms);
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO chunk_flags (world, chunk_x, chunk_z, expires_at, generated_only)
             VALUES (?1, ?2, ?3, ?4, 1)",
            params![world, x, z, expires_at],
        )?;
        Ok(inserted > 0)
    }

    /// Protect a chunk forever
    pub fn flag_permanent(&mut self, world: &str, x: i32, z: i32) -> Result<(), FlagError> {
        self.conn.execute(
            "INSERT INTO chunk_flags (world, chunk_x, chunk_z, expires_at, generated_only)
             VALUES (?1, ?2, ?3, ?4, 0)
             ON CONFLICT (world, chunk_x, chunk_z) DO UPDATE SET
                expires_at = excluded.expires_at,
                generated_only = 0",
            params![world, x, z, PERMANENT_FLAG],
        )?;
        Ok(())
    }

    /// Number of flags recorded for a world
    pub fn count(&self, world: &str) -> Result<usize, FlagError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM chunk_flags WHERE world = ?1",
            [world],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Drop every flag of a world, e.g. after the world itself was removed
    pub fn purge_world(&mut self, world: &str) -> Result<usize, FlagError> {
        let removed = self
            .conn
            .execute("DELETE FROM chunk_flags WHERE world = ?1", [world])?;
        if removed > 0 {
            info!("Purged {} flags for {}", removed, world);
        }
        Ok(removed)
    }
}

impl VisitOracle for SqliteFlagger {
    fn status(&self, world: &str, x: i32, z: i32) -> Result<VisitStatus, FlagError> {
        let row: Option<(i64, bool)> = self
            .conn
            .query_row(
                "SELECT expires_at, generated_only FROM chunk_flags
                 WHERE world = ?1 AND chunk_x = ?2 AND chunk_z = ?3",
                params![world, x, z],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((expires_at, generated_only)) = row else {
            return Ok(VisitStatus::Unknown);
        };

        Ok(if expires_at == PERMANENT_FLAG {
            VisitStatus::Permanent
        } else if expires_at > self.clock.now_ms() {
            VisitStatus::Visited
        } else if generated_only {
            VisitStatus::Generated
        } else {
            VisitStatus::Unvisited
        })
    }

    fn unflag_chunk(&mut self, world: &str, x: i32, z: i32) -> Result<(), FlagError> {
        self.conn.execute(
            "DELETE FROM chunk_flags WHERE world = ?1 AND chunk_x = ?2 AND chunk_z = ?3",
            params![world, x, z],
        )?;
        Ok(())
    }

    fn unflag_region(
        &mut self,
        world: &str,
        origin_x: i32,
        origin_z: i32,
    ) -> Result<(), FlagError> {
        let side = i64::from(CHUNKS_PER_REGION_SIDE);
        let removed = self.conn.execute(
            "DELETE FROM chunk_flags
             WHERE world = ?1
               AND chunk_x >= ?2 AND chunk_x < ?3
               AND chunk_z >= ?4 AND chunk_z < ?5",
            params![
                world,
                origin_x,
                i64::from(origin_x) + side,
                origin_z,
                i64::from(origin_z) + side
            ],
        )?;
        debug!(
            "Cleared {} flags for region at {}, {} in {}",
            removed, origin_x, origin_z, world
        );
        Ok(())
    }
}
