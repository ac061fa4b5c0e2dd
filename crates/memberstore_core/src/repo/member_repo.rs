//! Member repository contract, SQL surface and row mapping.
//!
//! # Responsibility
//! - Define the four-operation [`MemberRepository`] contract shared by every
//!   provisioning mode.
//! - Define the two-kind error taxonomy callers branch on.
//!
//! # Invariants
//! - `find_by_id` distinguishes an absent record (`NotFound`) from a store
//!   failure (`StoreFault`).
//! - `update` and `delete` on a missing key succeed without effect.

use crate::db::{FaultKind, StoreFault};
use crate::model::member::{Member, MemberId};
use rusqlite::Row;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub const INSERT_MEMBER_SQL: &str = "INSERT INTO member(member_id,money) VALUES (?,?)";
pub const SELECT_MEMBER_SQL: &str = "SELECT * FROM member WHERE member_id = ?";
pub const UPDATE_MEMBER_SQL: &str = "UPDATE member SET money=? WHERE member_id = ?";
pub const DELETE_MEMBER_SQL: &str = "DELETE FROM member WHERE member_id = ?";

pub type RepoResult<T> = Result<T, RepoError>;

/// Error taxonomy surfaced by every repository variant.
#[derive(Debug)]
pub enum RepoError {
    /// Lookup matched zero rows.
    NotFound(MemberId),
    /// Any other failure from the underlying store.
    StoreFault(StoreFault),
}

impl RepoError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Fault category, or `None` for `NotFound`.
    pub fn fault_kind(&self) -> Option<FaultKind> {
        match self {
            Self::NotFound(_) => None,
            Self::StoreFault(fault) => Some(fault.kind()),
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(member_id) => write!(f, "member not found memberId={member_id}"),
            Self::StoreFault(fault) => write!(f, "{fault}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound(_) => None,
            Self::StoreFault(fault) => Some(fault),
        }
    }
}

impl From<StoreFault> for RepoError {
    fn from(value: StoreFault) -> Self {
        Self::StoreFault(value)
    }
}

/// Repository interface for member CRUD operations.
pub trait MemberRepository {
    /// Inserts `member` and returns it unchanged.
    fn save(&self, member: &Member) -> RepoResult<Member>;
    /// Loads the member with `member_id`, or `RepoError::NotFound`.
    fn find_by_id(&self, member_id: &str) -> RepoResult<Member>;
    /// Replaces the balance. A missing key is a silent no-op.
    fn update(&self, member_id: &str, money: i64) -> RepoResult<()>;
    /// Removes the member. A missing key is a silent no-op.
    fn delete(&self, member_id: &str) -> RepoResult<()>;
}

impl<R: MemberRepository + ?Sized> MemberRepository for Box<R> {
    fn save(&self, member: &Member) -> RepoResult<Member> {
        (**self).save(member)
    }

    fn find_by_id(&self, member_id: &str) -> RepoResult<Member> {
        (**self).find_by_id(member_id)
    }

    fn update(&self, member_id: &str, money: i64) -> RepoResult<()> {
        (**self).update(member_id, money)
    }

    fn delete(&self, member_id: &str) -> RepoResult<()> {
        (**self).delete(member_id)
    }
}

impl<R: MemberRepository + ?Sized> MemberRepository for Arc<R> {
    fn save(&self, member: &Member) -> RepoResult<Member> {
        (**self).save(member)
    }

    fn find_by_id(&self, member_id: &str) -> RepoResult<Member> {
        (**self).find_by_id(member_id)
    }

    fn update(&self, member_id: &str, money: i64) -> RepoResult<()> {
        (**self).update(member_id, money)
    }

    fn delete(&self, member_id: &str) -> RepoResult<()> {
        (**self).delete(member_id)
    }
}

/// Maps one `member` row. Pure; reads columns by name.
pub fn map_member_row(row: &Row<'_>) -> rusqlite::Result<Member> {
    Ok(Member {
        member_id: row.get("member_id")?,
        money: row.get("money")?,
    })
}
