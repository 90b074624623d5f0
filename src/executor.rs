use sqlx::{PgConnection, Postgres, Transaction};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use crate::{TransactionError, TransactionResult};

/// Handle to the open Postgres transaction of a session.
///
/// Units of work receive a clone of this handle and run their queries
/// through [`Executor::lock`]. Once the session commits or rolls back the
/// slot is emptied and further use reports [`TransactionError::Closed`].
#[derive(Clone, Debug)]
pub struct Executor {
    tx: Arc<Mutex<Option<Transaction<'static, Postgres>>>>,
}

impl Executor {
    /// Creates a new Executor from a PostgreSQL transaction.
    pub fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
        }
    }

    /// Locks the transaction for the duration of the returned guard.
    pub async fn lock(&self) -> TransactionResult<ExecutorGuard<'_>> {
        let guard = self.tx.lock().await;
        if guard.is_none() {
            return Err(TransactionError::Closed);
        }
        Ok(ExecutorGuard { guard })
    }

    /// Whether the transaction is still open (not yet committed or rolled back).
    pub async fn is_open(&self) -> bool {
        self.tx.lock().await.is_some()
    }

    pub(crate) async fn take_transaction(
        &self,
    ) -> TransactionResult<Transaction<'static, Postgres>> {
        self.tx.lock().await.take().ok_or(TransactionError::Closed)
    }
}

/// Exclusive access to the connection behind an [`Executor`].
pub struct ExecutorGuard<'a> {
    guard: MutexGuard<'a, Option<Transaction<'static, Postgres>>>,
}

impl ExecutorGuard<'_> {
    pub fn connection(&mut self) -> &mut PgConnection {
        // checked non-empty in `Executor::lock`, and the slot is only emptied under the same mutex
        match self.guard.as_mut() {
            Some(tx) => &mut **tx,
            None => unreachable!("executor guard over a closed transaction"),
        }
    }
}
