//! Pooled SQLite data source.
//!
//! # Responsibility
//! - Bootstrap the schema once, then serve connections from an `r2d2` pool.
//! - Carry a process-unique identity so transactions can bind a connection to
//!   the current thread per data source.
//!
//! # Invariants
//! - Every pooled connection is configured with `foreign_keys=ON` and the
//!   configured busy timeout before first use.
//! - Clones share one pool and one identity.
//! - A checked-out connection is never inside a transaction left open by a
//!   previous holder.

use super::migrations::apply_migrations;
use super::open::{configure_connection, DEFAULT_BUSY_TIMEOUT};
use super::DbResult;
use log::{info, warn};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub(crate) type PooledSqlite = PooledConnection<SqliteConnectionManager>;

static NEXT_DATA_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Pool sizing and timeout options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataSourceOptions {
    /// Maximum number of pooled connections.
    pub max_size: u32,
    /// How long `acquire` waits for a free pooled connection.
    pub connection_timeout: Duration,
    /// SQLite busy timeout applied to every pooled connection.
    pub busy_timeout: Duration,
}

impl Default for DataSourceOptions {
    fn default() -> Self {
        Self {
            max_size: 10,
            connection_timeout: Duration::from_secs(30),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolState {
    pub connections: u32,
    pub idle_connections: u32,
}

/// Shared handle to a file-backed connection pool.
#[derive(Clone)]
pub struct DataSource {
    inner: Arc<DataSourceInner>,
}

struct DataSourceInner {
    id: u64,
    path: PathBuf,
    pool: Pool<SqliteConnectionManager>,
}

impl DataSource {
    /// Opens a pool over the database file at `path`.
    ///
    /// Migrations are applied on a dedicated bootstrap connection before the
    /// pool is built, and the file is switched to WAL journaling.
    pub fn open(path: impl AsRef<Path>, options: DataSourceOptions) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        bootstrap_schema(&path, options.busy_timeout)?;

        let busy_timeout = options.busy_timeout;
        let manager = SqliteConnectionManager::file(&path)
            .with_init(move |conn| configure_connection(conn, busy_timeout));
        let pool = Pool::builder()
            .max_size(options.max_size.max(1))
            .min_idle(Some(0))
            .connection_timeout(options.connection_timeout)
            .build(manager)?;

        let id = NEXT_DATA_SOURCE_ID.fetch_add(1, Ordering::Relaxed);
        info!(
            "event=datasource_open module=db status=ok data_source={} max_size={} path={}",
            id,
            options.max_size,
            path.display()
        );

        Ok(Self {
            inner: Arc::new(DataSourceInner { id, path, pool }),
        })
    }

    /// Process-unique identity of this pool.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Database file backing this pool.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Returns current pool occupancy.
    pub fn pool_state(&self) -> PoolState {
        let state = self.inner.pool.state();
        PoolState {
            connections: state.connections,
            idle_connections: state.idle_connections,
        }
    }

    pub(crate) fn checkout(&self) -> DbResult<PooledSqlite> {
        let conn = self.inner.pool.get()?;
        if !conn.is_autocommit() {
            warn!(
                "event=conn_checkout module=db status=reset data_source={} reason=open_transaction",
                self.inner.id
            );
            conn.execute_batch("ROLLBACK;")?;
        }
        Ok(conn)
    }
}

fn bootstrap_schema(path: &Path, busy_timeout: Duration) -> DbResult<()> {
    let mut conn = Connection::open(path)?;
    configure_connection(&conn, busy_timeout)?;
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    apply_migrations(&mut conn)?;
    info!(
        "event=schema_bootstrap module=db status=ok journal_mode={} path={}",
        mode,
        path.display()
    );
    Ok(())
}
