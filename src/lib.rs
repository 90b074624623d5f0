//! Application Support Library
//!
//! Lifecycle hooks around transactional units of work, plus the base
//! machinery commands and background jobs build on: a Postgres transaction
//! manager, query filters, error codes, a service error, a JSON resource
//! wrapper and environment-driven configuration.

pub mod command;
pub mod config;
pub mod error_code;
pub mod executor;
pub mod filter;
pub mod job;
pub mod lifecycle;
pub mod resource;
pub mod service_error;
pub mod transaction_aware;
pub mod transaction_manager;

pub use command::{Command, CommandError, CommandResult, CommandRunner, InstallCommand, Output};
pub use config::{ConfigError, DatabaseConfig, FileConfig, HttpConfig, SupportConfig};
pub use error_code::{ErrorCode, UnknownErrorCode};
pub use executor::{Executor, ExecutorGuard};
pub use filter::{apply_filters, EqualsFilter, FilterInput, QueryFilter, WhereClause};
pub use job::{Job, JobError, JobIdentifier, JobOptions, JobResult, JobRunner};
pub use lifecycle::TransactionLifecycle;
pub use resource::Resource;
pub use service_error::ServiceError;
pub use transaction_aware::{TransactionAware, TransactionError, TransactionResult};
pub use transaction_manager::{
    PostgresSession, PostgresTransactionManager, TransactionManager, TransactionSession,
};
