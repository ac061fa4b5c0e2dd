//! Explicit-steps member repository.
//!
//! # Responsibility
//! - Run each operation as acquire, prepare, bind, execute, map, release.
//! - Route every driver fault through the injected [`ErrorClassifier`].
//!
//! # Invariants
//! - One lease per operation, released through the provider that issued it.
//! - Release order is cursor, statement, connection on every exit path.
//!
//! Built with [`DriverConnectionFactory`] + [`PlainClassifier`] this is the
//! plain per-call mode; with [`TransactionAwareProvider`] +
//! [`SqliteCodeClassifier`] it is the managed mode.
//!
//! [`TransactionAwareProvider`]: crate::db::TransactionAwareProvider
//! [`SqliteCodeClassifier`]: crate::db::SqliteCodeClassifier

use crate::db::provider::close_statement;
use crate::db::{
    ConnectionGuard, ConnectionProvider, DbError, DriverConnectionFactory, ErrorClassifier,
    PlainClassifier,
};
use crate::model::member::Member;
use crate::repo::member_repo::{
    map_member_row, MemberRepository, RepoError, RepoResult, DELETE_MEMBER_SQL,
    INSERT_MEMBER_SQL, SELECT_MEMBER_SQL, UPDATE_MEMBER_SQL,
};
use log::{error, info};
use rusqlite::{params, Params};

/// Member repository that spells out every resource step.
pub struct SqlMemberRepository<P, C> {
    provider: P,
    classifier: C,
}

impl SqlMemberRepository<DriverConnectionFactory, PlainClassifier> {
    /// Plain mode: a fresh connection per call and uncategorized faults.
    pub fn driver(factory: DriverConnectionFactory) -> Self {
        Self::new(factory, PlainClassifier)
    }
}

impl<P, C> SqlMemberRepository<P, C> {
    pub fn new(provider: P, classifier: C) -> Self {
        Self {
            provider,
            classifier,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P: ConnectionProvider, C: ErrorClassifier> SqlMemberRepository<P, C> {
    fn translate(&self, operation: &'static str, sql: &'static str, err: DbError) -> RepoError {
        let fault = self.classifier.classify(operation, sql, err);
        error!(
            "event=member_{} module=repo status=error fault={} error={}",
            operation,
            fault.kind(),
            fault.db_error()
        );
        RepoError::StoreFault(fault)
    }

    fn execute_update(
        &self,
        operation: &'static str,
        sql: &'static str,
        params: impl Params,
    ) -> RepoResult<usize> {
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
}

impl<P: ConnectionProvider, C: ErrorClassifier> MemberRepository for SqlMemberRepository<P, C> {
    fn save(&self, member: &Member) -> RepoResult<Member> {
        self.execute_update(
            "save",
            INSERT_MEMBER_SQL,
            params![member.member_id, member.money],
        )?;
        info!(
            "event=member_save module=repo status=ok member_id={}",
            member.member_id
        );
        Ok(member.clone())
    }

    fn find_by_id(&self, member_id: &str) -> RepoResult<Member> {
        const OPERATION: &str = "find_by_id";
        let sql = SELECT_MEMBER_SQL;

        let conn = ConnectionGuard::acquire(&self.provider)
            .map_err(|err| self.translate(OPERATION, sql, err))?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|err| self.translate(OPERATION, sql, err.into()))?;
        let found = {
            let mut rows = stmt
                .query([member_id])
                .map_err(|err| self.translate(OPERATION, sql, err.into()))?;
            match rows
                .next()
                .map_err(|err| self.translate(OPERATION, sql, err.into()))?
            {
                Some(row) => Some(
                    map_member_row(row)
                        .map_err(|err| self.translate(OPERATION, sql, err.into()))?,
                ),
                None => None,
            }
        };
        close_statement(stmt);

        found.ok_or_else(|| {
            info!("event=member_find module=repo status=not_found member_id={member_id}");
            RepoError::NotFound(member_id.to_string())
        })
    }

    fn update(&self, member_id: &str, money: i64) -> RepoResult<()> {
        let affected = self.execute_update("update", UPDATE_MEMBER_SQL, params![money, member_id])?;
        info!(
            "event=member_update module=repo status=ok member_id={} rows_affected={}",
            member_id, affected
        );
        Ok(())
    }

    fn delete(&self, member_id: &str) -> RepoResult<()> {
        let affected = self.execute_update("delete", DELETE_MEMBER_SQL, [member_id])?;
        info!(
            "event=member_delete module=repo status=ok member_id={} rows_affected={}",
            member_id, affected
        );
        Ok(())
    }
}
