//! Repository assembly by provisioning mode.
//!
//! # Responsibility
//! - Build the repository variant selected by [`StoreConfig::mode`].
//! - Share one data source between the repository and its transactions.
//!
//! # Invariants
//! - Callers only see `dyn MemberRepository`; the mode stays an internal
//!   construction detail.

use crate::config::{ConfigError, ProvisioningMode, StoreConfig};
use crate::db::{
    DataSource, DbError, DriverConnectionFactory, SqlTemplate, SqliteCodeClassifier,
    TransactionAwareProvider, TransactionManager,
};
use crate::repo::member_repo::MemberRepository;
use crate::repo::sql_repo::SqlMemberRepository;
use crate::repo::template_repo::TemplateMemberRepository;
use crate::service::member_service::MemberService;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type DynMemberRepository = Box<dyn MemberRepository + Send + Sync>;

#[derive(Debug)]
pub enum StoreError {
    Config(ConfigError),
    Db(DbError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Db(err) => Some(err),
        }
    }
}

impl From<ConfigError> for StoreError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

/// An opened member store.
pub struct MemberStore {
    mode: ProvisioningMode,
    repository: DynMemberRepository,
    data_source: Option<DataSource>,
}

impl MemberStore {
    /// Validates `config` and builds the configured repository variant.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;

        let (repository, data_source) = match config.mode {
            ProvisioningMode::Driver => {
                let factory = DriverConnectionFactory::with_busy_timeout(
                    &config.database,
                    config.busy_timeout(),
                )?;
                let repository: DynMemberRepository =
                    Box::new(SqlMemberRepository::driver(factory));
                (repository, None)
            }
            ProvisioningMode::Managed => {
                let data_source =
                    DataSource::open(&config.database, config.data_source_options())?;
                let provider = TransactionAwareProvider::new(data_source.clone());
                let repository: DynMemberRepository =
                    Box::new(SqlMemberRepository::new(provider, SqliteCodeClassifier));
                (repository, Some(data_source))
            }
            ProvisioningMode::Template => {
                let data_source =
                    DataSource::open(&config.database, config.data_source_options())?;
                let template = SqlTemplate::new(TransactionAwareProvider::new(data_source.clone()));
                let repository: DynMemberRepository =
                    Box::new(TemplateMemberRepository::new(template));
                (repository, Some(data_source))
            }
        };

        info!(
            "event=store_open module=store status=ok mode={} database={}",
            config.mode,
            config.database.display()
        );
        Ok(Self {
            mode: config.mode,
            repository,
            data_source,
        })
    }

    pub fn mode(&self) -> ProvisioningMode {
        self.mode
    }

    pub fn repository(&self) -> &(dyn MemberRepository + Send + Sync) {
        self.repository.as_ref()
    }

    /// Shared pool, `None` in driver mode.
    pub fn data_source(&self) -> Option<&DataSource> {
        self.data_source.as_ref()
    }

    /// Transaction manager over the shared pool, `None` in driver mode.
    pub fn transaction_manager(&self) -> Option<TransactionManager> {
        self.data_source.clone().map(TransactionManager::new)
    }

    /// Wraps the repository in a service, with transactions when pooled.
    pub fn into_service(self) -> MemberService<DynMemberRepository> {
        match self.data_source {
            Some(data_source) => MemberService::with_transactions(
                self.repository,
                TransactionManager::new(data_source),
            ),
            None => MemberService::new(self.repository),
        }
    }
}
