//! Member record storage over SQLite.
//!
//! Three repository variants share one [`MemberRepository`] contract:
//! plain per-call connections, pooled transaction-aware connections with
//! fault classification, and a templated executor.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use config::{ConfigError, ProvisioningMode, StoreConfig};
pub use db::{
    ConnectionProvider, DataSource, DataSourceOptions, DbError, DbResult, FaultKind, StoreFault,
    TransactionManager, TransactionScope,
};
pub use logging::{default_log_level, init_logging, init_stderr_logging, logging_status, LogTarget};
pub use model::member::{Member, MemberId};
pub use repo::member_repo::{MemberRepository, RepoError, RepoResult};
pub use repo::sql_repo::SqlMemberRepository;
pub use repo::template_repo::TemplateMemberRepository;
pub use service::member_service::{MemberService, ServiceError, ServiceResult};
pub use store::{DynMemberRepository, MemberStore, StoreError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
