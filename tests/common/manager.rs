use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

use app_support::{TransactionError, TransactionManager, TransactionResult, TransactionSession};

/// Ordered record of transaction and hook events shared by a test.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Arc<RwLock<Vec<String>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.events.write().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.read().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.read().iter().filter(|e| *e == event).count()
    }
}

/// Error type used by units of work under test
#[derive(Debug, thiserror::Error)]
pub enum TestError {
    #[error("work failed: {0}")]
    Work(String),

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

/// In-memory transaction manager recording begin/commit/rollback
#[derive(Clone, Debug, Default)]
pub struct MockTransactionManager {
    log: EventLog,
    fail_begin: bool,
    fail_commit: bool,
    fail_rollback: bool,
}

impl MockTransactionManager {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    pub fn failing_begin(mut self) -> Self {
        self.fail_begin = true;
        self
    }

    pub fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub fn failing_rollback(mut self) -> Self {
        self.fail_rollback = true;
        self
    }
}

#[async_trait]
impl TransactionManager for MockTransactionManager {
    type Session = MockSession;

    async fn begin(&self) -> TransactionResult<Self::Session> {
        self.log.push("begin");
        if self.fail_begin {
            return Err(TransactionError::BeginFailed("pool exhausted".to_string()));
        }
        Ok(MockSession {
            log: self.log.clone(),
            fail_commit: self.fail_commit,
            fail_rollback: self.fail_rollback,
        })
    }
}

pub struct MockSession {
    log: EventLog,
    fail_commit: bool,
    fail_rollback: bool,
}

#[async_trait]
impl TransactionSession for MockSession {
    type Handle = EventLog;

    fn handle(&self) -> EventLog {
        self.log.clone()
    }

    async fn commit(self) -> TransactionResult<()> {
        self.log.push("commit");
        if self.fail_commit {
            return Err(TransactionError::CommitFailed("serialization failure".to_string()));
        }
        Ok(())
    }

    async fn rollback(self) -> TransactionResult<()> {
        self.log.push("rollback");
        if self.fail_rollback {
            return Err(TransactionError::RollbackFailed("connection reset".to_string()));
        }
        Ok(())
    }
}
