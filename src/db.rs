//! SQLite store handle and scoped units of work

use std::ops::Deref;
use std::path::Path;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info, warn};

use crate::config::{DatabaseConfig, TransactionConfig};
use crate::error::{BountyError, Result};
use crate::migrations::Migrator;

/// Shared handle to the bounty store.
///
/// Writes go through a single writer connection, one [`UnitOfWork`] at a
/// time. Reads go through [`Database::with_conn`] on a pool of read-only
/// connections; in WAL mode they see the last committed state and never wait
/// on an open unit of work.
pub struct Database {
    writer: Mutex<Connection>,
    readers: Pool<SqliteConnectionManager>,
    budget: TransactionConfig,
    #[cfg(test)]
    _scratch: Option<tempfile::TempDir>,
}

impl Database {
    pub fn open(config: &DatabaseConfig, budget: TransactionConfig) -> Result<Self> {
        let path = config.path.as_path();
        let writer = Connection::open(path)?;
        writer.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        writer.pragma_update(None, "foreign_keys", "ON")?;
        writer.busy_timeout(budget.max_wait())?;
        Migrator::new().run(&writer)?;

        let readers = read_pool(path, config.read_pool_size, budget)?;
        info!(
            "Database opened at {} ({} readers)",
            path.display(),
            config.read_pool_size
        );

        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            budget,
            #[cfg(test)]
            _scratch: None,
        })
    }

    /// Fresh database in a temporary directory removed on drop
    #[cfg(test)]
    pub fn scratch() -> Result<Self> {
        Self::scratch_with_budget(TransactionConfig::default())
    }

    #[cfg(test)]
    pub fn scratch_with_budget(budget: TransactionConfig) -> Result<Self> {
        let dir = tempfile::tempdir().map_err(|e| BountyError::Database(e.to_string()))?;
        let config = DatabaseConfig {
            path: dir.path().join("bounty-board.db"),
            read_pool_size: 2,
        };
        let mut db = Self::open(&config, budget)?;
        db._scratch = Some(dir);
        Ok(db)
    }

    fn acquire_writer(&self) -> Result<MutexGuard<'_, Connection>> {
        self.writer.try_lock_for(self.budget.max_wait()).ok_or_else(|| {
            BountyError::Timeout(format!(
                "store busy for more than {}ms",
                self.budget.max_wait_ms
            ))
        })
    }

    fn acquire_reader(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.readers.get().map_err(|e| {
            BountyError::Timeout(format!(
                "no read connection within {}ms: {}",
                self.budget.max_wait_ms, e
            ))
        })
    }

    /// Run read-only work against a pooled connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.acquire_reader()?;
        f(&conn)
    }

    /// Begin a write transaction; it rolls back unless committed
    pub fn unit_of_work(&self) -> Result<UnitOfWork<'_>> {
        let conn = self.acquire_writer()?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(UnitOfWork {
            conn,
            started_at: Instant::now(),
            timeout: self.budget.timeout(),
            past_external_call: false,
            finished: false,
        })
    }
}

fn read_pool(
    path: &Path,
    size: u32,
    budget: TransactionConfig,
) -> Result<Pool<SqliteConnectionManager>> {
    let max_wait = budget.max_wait();
    let manager = SqliteConnectionManager::file(path)
        .with_flags(
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_init(move |conn| conn.busy_timeout(max_wait));

    Pool::builder()
        .max_size(size.max(1))
        .connection_timeout(max_wait)
        .build(manager)
        .map_err(|e| BountyError::Database(format!("read pool: {}", e)))
}

/// An open `BEGIN IMMEDIATE` transaction holding the writer connection.
///
/// The runtime budget is enforced at commit, or at the last check before an
/// external side effect when [`UnitOfWork::begin_external_call`] was used.
#[derive(Debug)]
pub struct UnitOfWork<'a> {
    conn: MutexGuard<'a, Connection>,
    started_at: Instant,
    timeout: Duration,
    past_external_call: bool,
    finished: bool,
}

impl UnitOfWork<'_> {
    fn remaining_budget(&self) -> Result<Duration> {
        let elapsed = self.started_at.elapsed();
        match self.timeout.checked_sub(elapsed) {
            Some(remaining) if !remaining.is_zero() => Ok(remaining),
            _ => Err(BountyError::Timeout(format!(
                "transaction ran {}ms, budget is {}ms",
                elapsed.as_millis(),
                self.timeout.as_millis()
            ))),
        }
    }

    /// Check the budget before a side effect that cannot be rolled back and
    /// return the time left for it. The caller must commit right after the
    /// call; from here on commit no longer enforces the budget.
    pub fn begin_external_call(&mut self) -> Result<Duration> {
        let remaining = self.remaining_budget()?;
        self.past_external_call = true;
        Ok(remaining)
    }

    pub fn commit(mut self) -> Result<()> {
        if !self.past_external_call {
            // Drop rolls back
            self.remaining_budget()?;
        }

        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        debug!(
            "Committed unit of work in {}ms",
            self.started_at.elapsed().as_millis()
        );
        Ok(())
    }

    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

impl Deref for UnitOfWork<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        // A failed COMMIT may already have ended the transaction
        if self.finished || self.conn.is_autocommit() {
            return;
        }
        match self.conn.execute_batch("ROLLBACK") {
            Ok(()) => debug!("Rolled back unit of work"),
            Err(e) => warn!("Rollback failed: {}", e),
        }
    }
}
