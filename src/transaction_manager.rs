use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::{Executor, TransactionError, TransactionResult};

/// Source of transaction sessions.
///
/// The lifecycle coordinator only ever calls [`TransactionManager::begin`]
/// and then commits or rolls back the returned session; how the transaction
/// is actually opened is up to the implementation.
#[async_trait]
pub trait TransactionManager: Send + Sync {
    type Session: TransactionSession;

    /// Begin a new transaction session.
    async fn begin(&self) -> TransactionResult<Self::Session>;
}

/// A single open transaction.
#[async_trait]
pub trait TransactionSession: Send + Sync {
    /// Cloneable handle given to the unit of work.
    type Handle: Clone + Send + Sync + 'static;

    /// Returns a handle sharing this session's transaction.
    fn handle(&self) -> Self::Handle;

    /// Commit the transaction, consuming the session.
    async fn commit(self) -> TransactionResult<()>;

    /// Rollback the transaction, consuming the session.
    async fn rollback(self) -> TransactionResult<()>;
}

/// [`TransactionManager`] backed by a Postgres connection pool.
#[derive(Clone, Debug)]
pub struct PostgresTransactionManager {
    pool: Arc<PgPool>,
}

impl PostgresTransactionManager {
    /// Create a new manager over the given connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Connect a pool using the database section of the configuration.
    pub async fn connect(config: &DatabaseConfig) -> TransactionResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        debug!(max_connections = config.max_connections, "Postgres pool connected");
        Ok(Self::new(Arc::new(pool)))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TransactionManager for PostgresTransactionManager {
    type Session = PostgresSession;

    async fn begin(&self) -> TransactionResult<Self::Session> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TransactionError::BeginFailed(e.to_string()))?;
        Ok(PostgresSession {
            executor: Executor::new(tx),
        })
    }
}

/// Open Postgres transaction handed out by [`PostgresTransactionManager`].
#[derive(Debug)]
pub struct PostgresSession {
    executor: Executor,
}

impl PostgresSession {
    pub fn executor(&self) -> &Executor {
        &self.executor
    }
}

#[async_trait]
impl TransactionSession for PostgresSession {
    type Handle = Executor;

    fn handle(&self) -> Executor {
        self.executor.clone()
    }

    async fn commit(self) -> TransactionResult<()> {
        let tx = self.executor.take_transaction().await?;
        tx.commit()
            .await
            .map_err(|e| TransactionError::CommitFailed(e.to_string()))
    }

    async fn rollback(self) -> TransactionResult<()> {
        let tx = self.executor.take_transaction().await?;
        tx.rollback()
            .await
            .map_err(|e| TransactionError::RollbackFailed(e.to_string()))
    }
}
