//! SQLite storage bootstrap, connection provisioning and fault translation.
//!
//! # Responsibility
//! - Open and configure SQLite connections for member storage.
//! - Apply schema migrations in deterministic order.
//! - Hand out connections through [`ConnectionProvider`] implementations and
//!   take them back through the same provider.
//! - Translate driver faults into store-agnostic [`FaultKind`] categories.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Core code must not read/write member data before migrations succeed.
//! - A connection bound to an open transaction is never closed by a release.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod datasource;
pub mod migrations;
mod open;
pub mod provider;
pub mod template;
pub mod translate;
pub mod tx;

pub use datasource::{DataSource, DataSourceOptions, PoolState};
pub use open::{open_db, open_db_in_memory};
pub use provider::{
    ConnectionGuard, ConnectionProvider, DriverConnectionFactory, Lease, LeaseKind,
    PooledProvider, TransactionAwareProvider,
};
pub use template::{SqlTemplate, TemplateError, TemplateResult};
pub use translate::{ErrorClassifier, FaultKind, PlainClassifier, SqliteCodeClassifier, StoreFault};
pub use tx::{TransactionManager, TransactionScope};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    Pool(r2d2::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    IncorrectResultSize {
        expected: usize,
        actual: usize,
    },
    TransactionAlreadyActive,
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Pool(err) => write!(f, "connection pool error: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::IncorrectResultSize { expected, actual } => write!(
                f,
                "incorrect result size: expected {expected}, actual {actual}"
            ),
            Self::TransactionAlreadyActive => {
                write!(f, "a transaction is already active on this thread")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Pool(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. }
            | Self::IncorrectResultSize { .. }
            | Self::TransactionAlreadyActive => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<r2d2::Error> for DbError {
    fn from(value: r2d2::Error) -> Self {
        Self::Pool(value)
    }
}
