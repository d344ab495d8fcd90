//! Database connection management
//!
//! This module provides the connection provider used throughout tinker-store.
//! Connections come from an `r2d2` pool over a single SQLite file; every
//! connection is configured identically when the pool opens it.

use crate::database::error::{ConnectionError, Result, StoreError};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error};

/// Connection handle checked out of the pool
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Settings for opening the database file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Path to the SQLite database file
    pub path: PathBuf,
    /// Maximum number of open connections
    pub pool_size: u32,
    /// How long a statement waits on a locked database before failing
    pub busy_timeout: Duration,
    /// How long `acquire` waits for a free connection
    pub connection_timeout: Duration,
}

impl ConnectionSettings {
    /// Settings for the given file with default limits
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pool_size: 4,
            busy_timeout: Duration::from_millis(5000),
            connection_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_pool_size(mut self, pool_size: u32) -> Self {
        self.pool_size = pool_size.max(1);
        self
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn with_connection_timeout(mut self, connection_timeout: Duration) -> Self {
        self.connection_timeout = connection_timeout;
        self
    }
}

/// Snapshot of the pool's connection counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolState {
    pub connections: u32,
    pub idle_connections: u32,
}

/// Connection provider for the database file
///
/// `ConnectionProvider` owns a bounded pool of SQLite connections. Callers
/// either check a connection out with [`acquire`](Self::acquire) and let the
/// guard return it on drop, or use [`with_connection`](Self::with_connection)
/// for scoped access that releases the connection on every exit path.
#[derive(Clone)]
pub struct ConnectionProvider {
    path: PathBuf,
    pool: r2d2::Pool<SqliteConnectionManager>,
}

impl ConnectionProvider {
    /// Open the database described by `settings`
    ///
    /// Creates the containing directory and the file itself if they don't exist.
    pub fn open(settings: &ConnectionSettings) -> Result<Self> {
        let path = settings.path.clone();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| {
                error!("Failed to create database directory {}: {}", parent.display(), source);
                ConnectionError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                }
            })?;
        }

        let busy_timeout = settings.busy_timeout;
        let manager = SqliteConnectionManager::file(&path)
            .with_init(move |conn| configure(conn, busy_timeout));

        let pool = r2d2::Pool::builder()
            .max_size(settings.pool_size.max(1))
            .min_idle(Some(1))
            .connection_timeout(settings.connection_timeout)
            .build(manager)
            .map_err(|source| {
                error!("Failed to open database at {}: {}", path.display(), source);
                ConnectionError::Pool {
                    path: path.clone(),
                    source,
                }
            })?;

        debug!(
            "Opened connection pool for {} (max {} connections)",
            path.display(),
            settings.pool_size
        );

        Ok(Self { path, pool })
    }

    /// Open the database at `path` with default settings
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(&ConnectionSettings::new(path.as_ref()))
    }

    /// Check a connection out of the pool
    ///
    /// The connection goes back to the pool when the returned guard is dropped.
    pub fn acquire(&self) -> Result<PooledConnection> {
        self.pool.get().map_err(|source| {
            error!("Failed to acquire connection to {}: {}", self.path.display(), source);
            StoreError::from(ConnectionError::Checkout {
                path: self.path.clone(),
                source,
            })
        })
    }

    /// Run `f` with a connection and release it afterwards
    ///
    /// The connection is released exactly once, whether `f` succeeds or fails.
    /// An open transaction left behind by `f` is rolled back when its guard drops.
    pub fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.acquire()?;
        f(&mut *conn)
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current connection counts of the pool
    pub fn pool_state(&self) -> PoolState {
        let state = self.pool.state();
        PoolState {
            connections: state.connections,
            idle_connections: state.idle_connections,
        }
    }
}

/// Configure a freshly opened connection
fn configure(conn: &mut Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    // Must come first so the pragmas below wait on a locked file instead of failing
    conn.busy_timeout(busy_timeout)?;

    // WAL lets readers proceed while a writer holds the lock
    let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;

    conn.execute_batch(
        "PRAGMA synchronous=NORMAL;
         PRAGMA foreign_keys=ON;",
    )?;

    Ok(())
}
