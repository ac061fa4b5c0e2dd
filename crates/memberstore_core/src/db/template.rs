//! Templated SQL executor.
//!
//! # Responsibility
//! - Collapse acquire/prepare/bind/execute/map/release into single calls.
//! - Classify every driver fault through the configured [`ErrorClassifier`].
//!
//! # Invariants
//! - Each call holds one lease, one statement and at most one cursor, all
//!   released before the call returns.
//! - `query_for_object` yields exactly one row or fails.

use super::provider::{close_statement, ConnectionGuard, ConnectionProvider};
use super::translate::{ErrorClassifier, SqliteCodeClassifier, StoreFault};
use super::DbError;
use log::error;
use rusqlite::{Params, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type TemplateResult<T> = Result<T, TemplateError>;

#[derive(Debug)]
pub enum TemplateError {
    /// A single-row query matched nothing.
    EmptyResult { sql: &'static str },
    Fault(StoreFault),
}

impl Display for TemplateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyResult { sql } => {
                write!(f, "incorrect result size: expected 1, actual 0; SQL [{sql}]")
            }
            Self::Fault(fault) => write!(f, "{fault}"),
        }
    }
}

impl Error for TemplateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::EmptyResult { .. } => None,
            Self::Fault(fault) => Some(fault),
        }
    }
}

impl From<StoreFault> for TemplateError {
    fn from(value: StoreFault) -> Self {
        Self::Fault(value)
    }
}

/// Executes parameterized SQL against connections from `P`.
pub struct SqlTemplate<P, C = SqliteCodeClassifier> {
    provider: P,
    classifier: C,
}

impl<P: ConnectionProvider> SqlTemplate<P, SqliteCodeClassifier> {
    /// Creates a template that classifies faults by SQLite result code.
    pub fn new(provider: P) -> Self {
        Self::with_classifier(provider, SqliteCodeClassifier)
    }
}

impl<P: ConnectionProvider, C: ErrorClassifier> SqlTemplate<P, C> {
    pub fn with_classifier(provider: P, classifier: C) -> Self {
        Self {
            provider,
            classifier,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Executes an INSERT/UPDATE/DELETE and returns the affected row count.
    pub fn update(&self, sql: &'static str, params: impl Params) -> TemplateResult<usize> {
        self.update_as("update", sql, params)
    }

    /// Like [`SqlTemplate::update`], reporting faults under `operation`.
    pub fn update_as(
        &self,
        operation: &'static str,
        sql: &'static str,
        params: impl Params,
    ) -> TemplateResult<usize> {
        let conn = ConnectionGuard::acquire(&self.provider)
            .map_err(|err| self.translate(operation, sql, err))?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|err| self.translate(operation, sql, err.into()))?;
        let affected = stmt
            .execute(params)
            .map_err(|err| self.translate(operation, sql, err.into()))?;
        close_statement(stmt);
        Ok(affected)
    }

    /// Runs a query expected to match exactly one row and maps it.
    ///
    /// # Errors
    /// - `TemplateError::EmptyResult` when no row matches.
    /// - `TemplateError::Fault` for driver faults, mapper failures, or more
    ///   than one matching row.
    pub fn query_for_object<T, F>(
        &self,
        sql: &'static str,
        params: impl Params,
        row_mapper: F,
    ) -> TemplateResult<T>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.query_for_object_as("query_for_object", sql, params, row_mapper)
    }

    /// Like [`SqlTemplate::query_for_object`], reporting faults under `operation`.
    pub fn query_for_object_as<T, F>(
        &self,
        operation: &'static str,
        sql: &'static str,
        params: impl Params,
        mut row_mapper: F,
    ) -> TemplateResult<T>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let conn = ConnectionGuard::acquire(&self.provider)
            .map_err(|err| self.translate(operation, sql, err))?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|err| self.translate(operation, sql, err.into()))?;
        let mut results = {
            let mut rows = stmt
                .query(params)
                .map_err(|err| self.translate(operation, sql, err.into()))?;
            let mut results = Vec::with_capacity(1);
            while let Some(row) = rows
                .next()
                .map_err(|err| self.translate(operation, sql, err.into()))?
            {
                results.push(
                    row_mapper(row).map_err(|err| self.translate(operation, sql, err.into()))?,
                );
            }
            results
        };
        close_statement(stmt);

        match results.len() {
            0 => Err(TemplateError::EmptyResult { sql }),
            1 => Ok(results.remove(0)),
            actual => Err(self
                .translate(
                    operation,
                    sql,
                    DbError::IncorrectResultSize {
                        expected: 1,
                        actual,
                    },
                )
                .into()),
        }
    }

    fn translate(&self, operation: &'static str, sql: &'static str, err: DbError) -> StoreFault {
        let fault = self.classifier.classify(operation, sql, err);
        error!(
            "event=template_{} module=template status=error fault={} error={}",
            operation,
            fault.kind(),
            fault.db_error()
        );
        fault
    }
}
