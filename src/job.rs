//! Base machinery for queued background jobs.
//!
//! A [`Job`] implements `execute`. [`JobRunner`] runs each attempt inside a
//! transaction with start/completion/failure logging, bounds it by the
//! configured timeout, and retries with a fixed backoff. Queueing and
//! dispatch belong to the host's queue worker.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    Executor, ServiceError, TransactionError, TransactionLifecycle, TransactionManager,
    TransactionSession,
};

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Job timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Failed(String),
}

pub type JobResult<T> = Result<T, JobError>;

/// A background job. `H` is the transaction handle given to `execute`.
#[async_trait]
pub trait Job<H = Executor>: Send + Sync
where
    H: Send + 'static,
{
    fn name(&self) -> &str;

    fn queue(&self) -> &str {
        "default"
    }

    /// The job body, always run inside a transaction.
    async fn execute(&self, tx: H) -> JobResult<Value>;

    /// Runs before the transaction is begun, after the start log.
    fn before_execute(&self) {}

    /// Runs after commit with the job's result.
    fn after_execute(&self, _result: &Value) {}

    /// Runs after rollback with the attempt's failure.
    fn handle_failure(&self, _err: &JobError) {}
}

/// Retry, timeout and logging settings for a [`JobRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOptions {
    pub tries: u32,
    pub timeout: Duration,
    pub backoff: Duration,
    pub log_failure: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            tries: 3,
            timeout: Duration::from_secs(60),
            backoff: Duration::from_secs(3),
            log_failure: true,
        }
    }
}

impl JobOptions {
    /// Attempts made by [`JobRunner::run_to_completion`]; zero counts as one.
    pub fn set_tries(mut self, tries: u32) -> Self {
        self.tries = tries;
        self
    }

    /// Upper bound on the job body of a single attempt.
    pub fn set_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Pause between failed attempts.
    pub fn set_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn without_failure_logging(mut self) -> Self {
        self.log_failure = false;
        self
    }

    pub fn with_failure_logging(mut self) -> Self {
        self.log_failure = true;
        self
    }
}

/// Identifier of one job run, `"{name}:job_{uuid}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobIdentifier(String);

impl JobIdentifier {
    pub fn generate(name: &str) -> Self {
        Self(format!("{}:job_{}", name, Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Runs one job with its options under a fixed identifier.
pub struct JobRunner<J> {
    job: Arc<J>,
    options: JobOptions,
    identifier: JobIdentifier,
}

impl<J> JobRunner<J> {
    /// Creates a runner with default options and a fresh identifier.
    pub fn new<H>(job: J) -> Self
    where
        H: Send + 'static,
        J: Job<H>,
    {
        Self::with_options(job, JobOptions::default())
    }

    pub fn with_options<H>(job: J, options: JobOptions) -> Self
    where
        H: Send + 'static,
        J: Job<H>,
    {
        let identifier = JobIdentifier::generate(job.name());
        Self {
            job: Arc::new(job),
            options,
            identifier,
        }
    }

    pub fn identifier(&self) -> &JobIdentifier {
        &self.identifier
    }

    pub fn options(&self) -> &JobOptions {
        &self.options
    }

    pub fn job(&self) -> &J {
        &self.job
    }

    /// Runs a single attempt inside a transaction from `manager`.
    ///
    /// `attempt` is 1-based and only used for logging. The timeout bounds
    /// the job body only, so an expired attempt is rolled back and reaches
    /// the error-hook like any other failure, and a commit is never cut
    /// short.
    pub async fn handle<M>(&self, manager: &M, attempt: u32) -> JobResult<Value>
    where
        M: TransactionManager,
        J: Job<<M::Session as TransactionSession>::Handle> + 'static,
    {
        let timeout = self.options.timeout;
        let lifecycle = self.lifecycle::<<M::Session as TransactionSession>::Handle>(attempt);
        let job = Arc::clone(&self.job);
        lifecycle
            .run_with_transaction(manager, |tx| async move {
                match tokio::time::timeout(timeout, job.execute(tx)).await {
                    Ok(result) => result,
                    Err(_) => Err(JobError::Timeout(timeout)),
                }
            })
            .await
    }

    /// Attempts the job up to `tries` times, sleeping `backoff` between
    /// attempts. After the last failed attempt [`JobRunner::failed`] runs
    /// and the last error is returned.
    pub async fn run_to_completion<M>(&self, manager: &M) -> JobResult<Value>
    where
        M: TransactionManager,
        J: Job<<M::Session as TransactionSession>::Handle> + 'static,
    {
        let tries = self.options.tries.max(1);
        let mut attempt = 1;
        loop {
            match self.handle(manager, attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < tries => {
                    warn!(
                        job = %self.identifier,
                        attempt,
                        tries,
                        error = %err,
                        "[Job Retrying]"
                    );
                    tokio::time::sleep(self.options.backoff).await;
                    attempt += 1;
                }
                Err(err) => {
                    self.failed(&err);
                    return Err(err);
                }
            }
        }
    }

    /// Final failure once all attempts are used up.
    pub fn failed(&self, err: &JobError) {
        if self.options.log_failure {
            error!(
                job = %self.identifier,
                tries = self.options.tries,
                error = %err,
                "[Job Failed]"
            );
        }
    }

    fn lifecycle<H>(&self, attempt: u32) -> TransactionLifecycle<Value, JobError>
    where
        H: Send + 'static,
        J: Job<H> + 'static,
    {
        let log_failure = self.options.log_failure;
        let (started_id, completed_id, failed_id) = (
            self.identifier.clone(),
            self.identifier.clone(),
            self.identifier.clone(),
        );
        let queue = Job::<H>::queue(self.job.as_ref()).to_string();
        let (started, completed, failed) = (
            Arc::clone(&self.job),
            Arc::clone(&self.job),
            Arc::clone(&self.job),
        );

        TransactionLifecycle::new()
            .with_pre_hook(move || {
                info!(job = %started_id, queue = %queue, attempt, "[Job Started]");
                Job::<H>::before_execute(started.as_ref());
            })
            .with_post_hook(move |result| {
                info!(job = %completed_id, result = %result, "[Job Completed]");
                Job::<H>::after_execute(completed.as_ref(), result);
            })
            .with_error_hook(move |err| {
                if log_failure {
                    error!(job = %failed_id, attempt, error = %err, "[Job Failed]");
                }
                Job::<H>::handle_failure(failed.as_ref(), err);
            })
    }
}
