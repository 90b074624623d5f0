/// Error type for transaction boundary operations
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("Transaction begin failed: {0}")]
    BeginFailed(String),

    #[error("Transaction commit failed: {0}")]
    CommitFailed(String),

    #[error("Transaction rollback failed: {0}")]
    RollbackFailed(String),

    #[error("Transaction already closed")]
    Closed,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Result type for transaction boundary operations
pub type TransactionResult<T> = Result<T, TransactionError>;

/// Components that want to be told about the lifecycle of a transactional
/// unit of work.
///
/// This is the object form of the three lifecycle hooks. Attach an
/// implementation with [`TransactionLifecycle::with_aware`] instead of
/// registering three closures by hand.
///
/// [`TransactionLifecycle::with_aware`]: crate::TransactionLifecycle::with_aware
pub trait TransactionAware<T, E>: Send + Sync {
    /// Called before the transaction is begun.
    fn before_transaction(&self) {}

    /// Called after a successful commit with the unit of work's result.
    fn after_transaction_committed(&self, _result: &T) {}

    /// Called after rollback with the failure that is about to be returned.
    fn handle_transaction_error(&self, _error: &E) {}
}
