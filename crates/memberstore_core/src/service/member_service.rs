//! Member use-case service.
//!
//! # Responsibility
//! - Run multi-step member use-cases (account transfer) inside one transaction.
//! - Recover from duplicate keys on join by picking a fresh key.
//!
//! # Invariants
//! - A transfer either applies both balance changes or neither.
//! - The service never retries a store fault other than `DuplicateKey` on join.
//! - Transfers only join the transaction when the repository provisions through
//!   a `TransactionAwareProvider` on the manager's data source.

use crate::db::{DbError, FaultKind, TransactionManager};
use crate::model::member::{Member, MemberId};
use crate::repo::member_repo::{MemberRepository, RepoError};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Member id that makes a transfer fail after the debit step.
pub const TRANSFER_FAILURE_MEMBER_ID: &str = "ex";

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error for member use-cases.
#[derive(Debug)]
pub enum ServiceError {
    Repo(RepoError),
    /// Transaction begin/commit failure.
    Db(DbError),
    /// Transfer stopped mid-way; all changes rolled back.
    TransferAborted { member_id: MemberId },
    /// Balance arithmetic left the `i64` range.
    BalanceOverflow { member_id: MemberId },
    /// The service was built without a transaction manager.
    TransactionsUnavailable,
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::TransferAborted { member_id } => {
                write!(f, "transfer aborted while crediting member {member_id}")
            }
            Self::BalanceOverflow { member_id } => {
                write!(f, "balance overflow for member {member_id}")
            }
            Self::TransactionsUnavailable => {
                write!(f, "account transfer requires a transactional store")
            }
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::TransferAborted { .. }
            | Self::BalanceOverflow { .. }
            | Self::TransactionsUnavailable => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<DbError> for ServiceError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

/// Use-case service wrapper around a member repository.
pub struct MemberService<R: MemberRepository> {
    repo: R,
    tx: Option<TransactionManager>,
}

impl<R: MemberRepository> MemberService<R> {
    /// Creates a service without transaction support.
    pub fn new(repo: R) -> Self {
        Self { repo, tx: None }
    }

    /// Creates a service whose transfers run inside `tx` transactions.
    pub fn with_transactions(repo: R, tx: TransactionManager) -> Self {
        Self { repo, tx: Some(tx) }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Moves `money` from `from_id` to `to_id` atomically.
    ///
    /// # Errors
    /// - `ServiceError::TransactionsUnavailable` without a transaction manager.
    /// - `RepoError::NotFound` when either member is missing.
    /// - `ServiceError::TransferAborted` when `to_id` is
    ///   [`TRANSFER_FAILURE_MEMBER_ID`].
    pub fn account_transfer(&self, from_id: &str, to_id: &str, money: i64) -> ServiceResult<()> {
        let tx = self.tx.as_ref().ok_or(ServiceError::TransactionsUnavailable)?;
        let scope = tx.begin()?;

        match self.transfer_steps(from_id, to_id, money) {
            Ok(()) => {
                scope.commit()?;
                info!(
                    "event=account_transfer module=service status=ok from={} to={} money={}",
                    from_id, to_id, money
                );
                Ok(())
            }
            Err(err) => {
                if let Err(rollback_err) = scope.rollback() {
                    warn!(
                        "event=account_transfer module=service status=error stage=rollback error={}",
                        rollback_err
                    );
                }
                error!(
                    "event=account_transfer module=service status=error from={} to={} error={}",
                    from_id, to_id, err
                );
                Err(err)
            }
        }
    }

    fn transfer_steps(&self, from_id: &str, to_id: &str, money: i64) -> ServiceResult<()> {
        let from_member = self.repo.find_by_id(from_id)?;
        let to_member = self.repo.find_by_id(to_id)?;

        let debited = from_member
            .money
            .checked_sub(money)
            .ok_or_else(|| ServiceError::BalanceOverflow {
                member_id: from_id.to_string(),
            })?;
        self.repo.update(from_id, debited)?;

        validate_transfer_target(&to_member)?;

        let credited = to_member
            .money
            .checked_add(money)
            .ok_or_else(|| ServiceError::BalanceOverflow {
                member_id: to_id.to_string(),
            })?;
        self.repo.update(to_id, credited)?;
        Ok(())
    }

    /// Registers a member, retrying once under a fresh key on `DuplicateKey`.
    ///
    /// Returns the member as stored, which may carry a suffixed id.
    pub fn join(&self, member_id: &str, money: i64) -> ServiceResult<Member> {
        match self.repo.save(&Member::new(member_id, money)) {
            Ok(saved) => Ok(saved),
            Err(RepoError::StoreFault(fault)) if fault.kind() == FaultKind::DuplicateKey => {
                let retry_id = generate_member_id(member_id);
                info!(
                    "event=member_join module=service status=retry member_id={} retry_id={}",
                    member_id, retry_id
                );
                Ok(self.repo.save(&Member::new(retry_id, money))?)
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn validate_transfer_target(to_member: &Member) -> ServiceResult<()> {
    if to_member.member_id == TRANSFER_FAILURE_MEMBER_ID {
        return Err(ServiceError::TransferAborted {
            member_id: to_member.member_id.clone(),
        });
    }
    Ok(())
}

fn generate_member_id(member_id: &str) -> MemberId {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{member_id}-{}", &suffix[..8])
}
