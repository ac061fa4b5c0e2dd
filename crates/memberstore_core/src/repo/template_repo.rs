//! Member repository on top of [`SqlTemplate`].
//!
//! Every operation is one declarative template call; resource handling and
//! fault classification live in the template.

use crate::db::{ConnectionProvider, ErrorClassifier, SqlTemplate, TemplateError};
use crate::model::member::Member;
use crate::repo::member_repo::{
    map_member_row, MemberRepository, RepoError, RepoResult, DELETE_MEMBER_SQL,
    INSERT_MEMBER_SQL, SELECT_MEMBER_SQL, UPDATE_MEMBER_SQL,
};
use log::info;
use rusqlite::params;

/// Templated member repository.
pub struct TemplateMemberRepository<P, C> {
    template: SqlTemplate<P, C>,
}

impl<P: ConnectionProvider, C: ErrorClassifier> TemplateMemberRepository<P, C> {
    pub fn new(template: SqlTemplate<P, C>) -> Self {
        Self { template }
    }

    pub fn template(&self) -> &SqlTemplate<P, C> {
        &self.template
    }
}

impl<P: ConnectionProvider, C: ErrorClassifier> MemberRepository for TemplateMemberRepository<P, C> {
    fn save(&self, member: &Member) -> RepoResult<Member> {
        self.template
            .update_as("save", INSERT_MEMBER_SQL, params![member.member_id, member.money])
            .map_err(|err| into_repo_error(err, &member.member_id))?;
        info!(
            "event=member_save module=repo status=ok member_id={}",
            member.member_id
        );
        Ok(member.clone())
    }

    fn find_by_id(&self, member_id: &str) -> RepoResult<Member> {
        self.template
            .query_for_object_as("find_by_id", SELECT_MEMBER_SQL, [member_id], map_member_row)
            .map_err(|err| into_repo_error(err, member_id))
    }

    fn update(&self, member_id: &str, money: i64) -> RepoResult<()> {
        let affected = self
            .template
            .update_as("update", UPDATE_MEMBER_SQL, params![money, member_id])
            .map_err(|err| into_repo_error(err, member_id))?;
        info!(
            "event=member_update module=repo status=ok member_id={} rows_affected={}",
            member_id, affected
        );
        Ok(())
    }

    fn delete(&self, member_id: &str) -> RepoResult<()> {
        let affected = self
            .template
            .update_as("delete", DELETE_MEMBER_SQL, [member_id])
            .map_err(|err| into_repo_error(err, member_id))?;
        info!(
            "event=member_delete module=repo status=ok member_id={} rows_affected={}",
            member_id, affected
        );
        Ok(())
    }
}

fn into_repo_error(err: TemplateError, member_id: &str) -> RepoError {
    match err {
        TemplateError::EmptyResult { .. } => RepoError::NotFound(member_id.to_string()),
        TemplateError::Fault(fault) => RepoError::StoreFault(fault),
    }
}
