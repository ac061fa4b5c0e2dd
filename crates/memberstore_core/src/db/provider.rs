//! Connection provisioning and scoped release.
//!
//! # Responsibility
//! - Define the [`ConnectionProvider`] seam consumed by repositories.
//! - Provide the plain, pooled and transaction-aware provisioning modes.
//! - Release every lease through the provider that handed it out, exactly once,
//!   via [`ConnectionGuard`].
//!
//! # Invariants
//! - A transactional lease is never closed or returned to the pool by
//!   `release`; the owning `TransactionScope` decides its fate.
//! - Release failures are logged and never replace an operation's outcome.

use super::datasource::{DataSource, PooledSqlite};
use super::open::{configure_connection, DEFAULT_BUSY_TIMEOUT};
use super::tx::bound_connection;
use super::{open_db, DbResult};
use log::{debug, warn};
use rusqlite::{Connection, Statement};
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

/// How a lease was provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseKind {
    /// Opened for this call only; closed on release.
    Direct,
    /// Checked out of a pool; returned on release.
    Pooled,
    /// Shared with the ambient transaction on this thread; kept open on release.
    Transactional,
}

impl Display for LeaseKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Direct => "direct",
            Self::Pooled => "pooled",
            Self::Transactional => "transactional",
        };
        f.write_str(label)
    }
}

/// A connection handed out by a [`ConnectionProvider`].
///
/// Derefs to [`rusqlite::Connection`]. Not `Send`: a lease belongs to the
/// operation (and thread) that acquired it.
pub struct Lease {
    inner: LeaseInner,
}

enum LeaseInner {
    Direct(Connection),
    Pooled(PooledSqlite),
    Transactional(Rc<PooledSqlite>),
}

impl Lease {
    pub(crate) fn direct(conn: Connection) -> Self {
        Self {
            inner: LeaseInner::Direct(conn),
        }
    }

    pub(crate) fn pooled(conn: PooledSqlite) -> Self {
        Self {
            inner: LeaseInner::Pooled(conn),
        }
    }

    pub(crate) fn transactional(conn: Rc<PooledSqlite>) -> Self {
        Self {
            inner: LeaseInner::Transactional(conn),
        }
    }

    pub fn kind(&self) -> LeaseKind {
        match self.inner {
            LeaseInner::Direct(_) => LeaseKind::Direct,
            LeaseInner::Pooled(_) => LeaseKind::Pooled,
            LeaseInner::Transactional(_) => LeaseKind::Transactional,
        }
    }

    /// Closes a direct connection, surfacing the close error.
    ///
    /// Pooled leases go back to the pool and transactional leases only drop
    /// their shared handle.
    fn close(self) -> DbResult<()> {
        match self.inner {
            LeaseInner::Direct(conn) => conn.close().map_err(|(_, err)| err.into()),
            LeaseInner::Pooled(conn) => {
                drop(conn);
                Ok(())
            }
            LeaseInner::Transactional(conn) => {
                drop(conn);
                Ok(())
            }
        }
    }
}

impl Deref for Lease {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match &self.inner {
            LeaseInner::Direct(conn) => conn,
            LeaseInner::Pooled(conn) => &**conn,
            LeaseInner::Transactional(conn) => &***conn,
        }
    }
}

/// Source of connections for repository operations.
///
/// Implementations must accept back, through `release`, every lease they
/// hand out from `acquire`.
pub trait ConnectionProvider {
    /// Hands out a connection for one operation.
    fn acquire(&self) -> DbResult<Lease>;
    /// Takes a lease back. Called exactly once per successful `acquire`.
    fn release(&self, lease: Lease) -> DbResult<()>;
}

impl<P: ConnectionProvider + ?Sized> ConnectionProvider for Arc<P> {
    fn acquire(&self) -> DbResult<Lease> {
        (**self).acquire()
    }

    fn release(&self, lease: Lease) -> DbResult<()> {
        (**self).release(lease)
    }
}

impl<P: ConnectionProvider + ?Sized> ConnectionProvider for &P {
    fn acquire(&self) -> DbResult<Lease> {
        (**self).acquire()
    }

    fn release(&self, lease: Lease) -> DbResult<()> {
        (**self).release(lease)
    }
}

/// RAII guard that releases its lease through the originating provider on drop.
///
/// Declared after any statement or cursor borrowed from it, so scope exit
/// releases cursor, then statement, then connection.
pub struct ConnectionGuard<'p, P: ConnectionProvider + ?Sized> {
    provider: &'p P,
    lease: Option<Lease>,
}

impl<'p, P: ConnectionProvider + ?Sized> ConnectionGuard<'p, P> {
    /// Acquires one lease from `provider`.
    pub fn acquire(provider: &'p P) -> DbResult<Self> {
        let lease = provider.acquire()?;
        debug!(
            "event=conn_acquire module=db status=ok lease={}",
            lease.kind()
        );
        Ok(Self {
            provider,
            lease: Some(lease),
        })
    }

    pub fn kind(&self) -> LeaseKind {
        self.lease().kind()
    }

    fn lease(&self) -> &Lease {
        self.lease
            .as_ref()
            .expect("connection lease is held until the guard drops")
    }
}

impl<P: ConnectionProvider + ?Sized> Deref for ConnectionGuard<'_, P> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.lease()
    }
}

impl<P: ConnectionProvider + ?Sized> Drop for ConnectionGuard<'_, P> {
    fn drop(&mut self) {
        let Some(lease) = self.lease.take() else {
            return;
        };
        let kind = lease.kind();
        match self.provider.release(lease) {
            Ok(()) => debug!("event=conn_release module=db status=ok lease={kind}"),
            Err(err) => warn!("event=conn_release module=db status=error lease={kind} error={err}"),
        }
    }
}

/// Finalizes a prepared statement, logging (not returning) any failure.
pub(crate) fn close_statement(stmt: Statement<'_>) {
    if let Err(err) = stmt.finalize() {
        warn!("event=stmt_close module=db status=error error={err}");
    }
}

/// Plain per-call connection factory.
///
/// Opens a fresh connection on every `acquire` and closes it on `release`.
/// No pooling, no transaction awareness.
#[derive(Debug, Clone)]
pub struct DriverConnectionFactory {
    path: PathBuf,
    busy_timeout: Duration,
}

impl DriverConnectionFactory {
    /// Creates a factory for the database file at `path`.
    ///
    /// Applies pending migrations once so later opens skip bootstrap.
    pub fn new(path: impl AsRef<Path>) -> DbResult<Self> {
        Self::with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn with_busy_timeout(path: impl AsRef<Path>, busy_timeout: Duration) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = open_db(&path)?;
        conn.close().map_err(|(_, err)| err)?;
        Ok(Self { path, busy_timeout })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConnectionProvider for DriverConnectionFactory {
    fn acquire(&self) -> DbResult<Lease> {
        let conn = Connection::open(&self.path)?;
        configure_connection(&conn, self.busy_timeout)?;
        Ok(Lease::direct(conn))
    }

    fn release(&self, lease: Lease) -> DbResult<()> {
        lease.close()
    }
}

/// Pool-backed provider without transaction awareness.
///
/// Every `acquire` checks out a distinct pooled connection, even inside an
/// open transaction on the same data source.
#[derive(Clone)]
pub struct PooledProvider {
    data_source: DataSource,
}

impl PooledProvider {
    pub fn new(data_source: DataSource) -> Self {
        Self { data_source }
    }

    pub fn data_source(&self) -> &DataSource {
        &self.data_source
    }
}

impl ConnectionProvider for PooledProvider {
    fn acquire(&self) -> DbResult<Lease> {
        Ok(Lease::pooled(self.data_source.checkout()?))
    }

    fn release(&self, lease: Lease) -> DbResult<()> {
        lease.close()
    }
}

/// Pool-backed provider that joins the ambient transaction.
///
/// When a `TransactionScope` is open on the calling thread for the same data
/// source, `acquire` hands out that scope's connection and `release` leaves it
/// open. Otherwise it behaves like [`PooledProvider`].
#[derive(Clone)]
pub struct TransactionAwareProvider {
    data_source: DataSource,
}

impl TransactionAwareProvider {
    pub fn new(data_source: DataSource) -> Self {
        Self { data_source }
    }

    pub fn data_source(&self) -> &DataSource {
        &self.data_source
    }
}

impl ConnectionProvider for TransactionAwareProvider {
    fn acquire(&self) -> DbResult<Lease> {
        match bound_connection(self.data_source.id()) {
            Some(conn) => Ok(Lease::transactional(conn)),
            None => Ok(Lease::pooled(self.data_source.checkout()?)),
        }
    }

    fn release(&self, lease: Lease) -> DbResult<()> {
        if lease.kind() == LeaseKind::Transactional {
            debug!(
                "event=conn_release module=db status=deferred data_source={} reason=transaction_active",
                self.data_source.id()
            );
        }
        lease.close()
    }
}
