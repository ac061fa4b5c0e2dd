//! Driver fault classification.
//!
//! # Responsibility
//! - Wrap driver faults into [`StoreFault`] with operation and SQL context.
//! - Map SQLite result codes onto store-agnostic [`FaultKind`] categories.
//!
//! # Invariants
//! - Classification never drops the original driver error; it stays reachable
//!   through `Error::source`.

use super::DbError;
use rusqlite::{ffi, ErrorCode};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-agnostic fault category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Primary key or unique constraint collision.
    DuplicateKey,
    /// Any other constraint or type violation.
    DataIntegrity,
    /// The store could not be reached, opened or written to.
    Connectivity,
    /// Lock contention; the same call may succeed later.
    Transient,
    /// Malformed SQL, unknown table/column, or parameter mismatch.
    BadSql,
    /// Persisted values could not be mapped to the requested shape.
    DataRetrieval,
    Uncategorized,
}

impl FaultKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DuplicateKey => "duplicate_key",
            Self::DataIntegrity => "data_integrity",
            Self::Connectivity => "connectivity",
            Self::Transient => "transient",
            Self::BadSql => "bad_sql",
            Self::DataRetrieval => "data_retrieval",
            Self::Uncategorized => "uncategorized",
        }
    }
}

impl Display for FaultKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified store failure.
#[derive(Debug)]
pub struct StoreFault {
    kind: FaultKind,
    operation: &'static str,
    sql: &'static str,
    source: DbError,
}

impl StoreFault {
    pub fn new(kind: FaultKind, operation: &'static str, sql: &'static str, source: DbError) -> Self {
        Self {
            kind,
            operation,
            sql,
            source,
        }
    }

    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    /// Name of the repository or template call that failed.
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn sql(&self) -> &'static str {
        self.sql
    }

    pub fn db_error(&self) -> &DbError {
        &self.source
    }
}

impl Display for StoreFault {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} failed ({}); SQL [{}]; {}",
            self.operation, self.kind, self.sql, self.source
        )
    }
}

impl Error for StoreFault {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// Turns a raw driver fault into a [`StoreFault`].
pub trait ErrorClassifier {
    fn classify(&self, operation: &'static str, sql: &'static str, fault: DbError) -> StoreFault;
}

/// Wraps every fault as [`FaultKind::Uncategorized`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainClassifier;

impl ErrorClassifier for PlainClassifier {
    fn classify(&self, operation: &'static str, sql: &'static str, fault: DbError) -> StoreFault {
        StoreFault::new(FaultKind::Uncategorized, operation, sql, fault)
    }
}

/// Categorizes faults by SQLite primary and extended result codes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteCodeClassifier;

impl ErrorClassifier for SqliteCodeClassifier {
    fn classify(&self, operation: &'static str, sql: &'static str, fault: DbError) -> StoreFault {
        StoreFault::new(fault_kind_of(&fault), operation, sql, fault)
    }
}

/// Returns the category [`SqliteCodeClassifier`] assigns to `err`.
pub fn fault_kind_of(err: &DbError) -> FaultKind {
    match err {
        DbError::Sqlite(err) => sqlite_fault_kind(err),
        DbError::Pool(_) | DbError::UnsupportedSchemaVersion { .. } => FaultKind::Connectivity,
        DbError::IncorrectResultSize { .. } => FaultKind::DataRetrieval,
        DbError::TransactionAlreadyActive => FaultKind::Uncategorized,
    }
}

fn sqlite_fault_kind(err: &rusqlite::Error) -> FaultKind {
    use rusqlite::Error;

    // Covers both plain failures and input errors that carry an SQL offset.
    if let Some(failure) = err.sqlite_error() {
        return match failure.code {
            ErrorCode::ConstraintViolation => match failure.extended_code {
                ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE => {
                    FaultKind::DuplicateKey
                }
                _ => FaultKind::DataIntegrity,
            },
            ErrorCode::TypeMismatch => FaultKind::DataIntegrity,
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => FaultKind::Transient,
            ErrorCode::CannotOpen
            | ErrorCode::NotADatabase
            | ErrorCode::DatabaseCorrupt
            | ErrorCode::SystemIoFailure
            | ErrorCode::PermissionDenied
            | ErrorCode::ReadOnly
            | ErrorCode::DiskFull => FaultKind::Connectivity,
            // SQLITE_ERROR: syntax errors, missing tables and columns.
            ErrorCode::Unknown => FaultKind::BadSql,
            _ => FaultKind::Uncategorized,
        };
    }

    match err {
        Error::InvalidParameterCount(..)
        | Error::InvalidParameterName(_)
        | Error::InvalidColumnName(_)
        | Error::InvalidColumnIndex(_)
        | Error::MultipleStatement
        | Error::ExecuteReturnedResults => FaultKind::BadSql,
        Error::InvalidColumnType(..)
        | Error::FromSqlConversionFailure(..)
        | Error::IntegralValueOutOfRange(..)
        | Error::QueryReturnedNoRows => FaultKind::DataRetrieval,
        _ => FaultKind::Uncategorized,
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorClassifier, FaultKind, PlainClassifier, SqliteCodeClassifier};
    use crate::db::{open_db_in_memory, DbError};
    use std::error::Error;

    const INSERT: &str = "INSERT INTO member(member_id,money) VALUES (?,?)";

    fn insert_error(member_id: &str) -> DbError {
        let conn = open_db_in_memory().unwrap();
        conn.execute(INSERT, rusqlite::params!["dup", 1]).unwrap();
        conn.execute(INSERT, rusqlite::params![member_id, 1])
            .unwrap_err()
            .into()
    }

    #[test]
    fn primary_key_collision_is_duplicate_key() {
        let fault = SqliteCodeClassifier.classify("save", INSERT, insert_error("dup"));
        assert_eq!(fault.kind(), FaultKind::DuplicateKey);
        assert_eq!(fault.operation(), "save");
        assert!(fault.source().is_some());
    }

    #[test]
    fn empty_member_id_is_data_integrity() {
        let fault = SqliteCodeClassifier.classify("save", INSERT, insert_error(""));
        assert_eq!(fault.kind(), FaultKind::DataIntegrity);
    }

    #[test]
    fn missing_table_is_bad_sql() {
        let conn = open_db_in_memory().unwrap();
        let err: DbError = conn
            .prepare("SELECT * FROM no_such_table")
            .map(|_| ())
            .unwrap_err()
            .into();
        let fault = SqliteCodeClassifier.classify("find_by_id", "SELECT", err);
        assert_eq!(fault.kind(), FaultKind::BadSql);
    }

    #[test]
    fn conversion_failure_is_data_retrieval() {
        let conn = open_db_in_memory().unwrap();
        let err: DbError = conn
            .query_row("SELECT 'abc'", [], |row| row.get::<_, i64>(0))
            .unwrap_err()
            .into();
        let fault = SqliteCodeClassifier.classify("find_by_id", "SELECT", err);
        assert_eq!(fault.kind(), FaultKind::DataRetrieval);
    }

    #[test]
    fn plain_classifier_never_categorizes() {
        let fault = PlainClassifier.classify("save", INSERT, insert_error("dup"));
        assert_eq!(fault.kind(), FaultKind::Uncategorized);
        assert!(fault.to_string().contains("save failed"));
    }
}
