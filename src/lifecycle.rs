//! Lifecycle hooks around a unit of work.
//!
//! A [`TransactionLifecycle`] holds up to three hooks and runs a unit of work
//! either directly ([`TransactionLifecycle::run`]) or inside a transaction
//! obtained from a [`TransactionManager`]
//! ([`TransactionLifecycle::run_with_transaction`]).
//!
//! Per invocation exactly one of the post-hook or the error-hook fires. The
//! error is always handed back to the caller after the error-hook; nothing
//! is swallowed or retried here.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error};

use crate::{TransactionAware, TransactionError, TransactionManager, TransactionSession};

type PreHook = Box<dyn Fn() + Send + Sync>;
type PostHook<T> = Box<dyn Fn(&T) + Send + Sync>;
type ErrorHook<E> = Box<dyn Fn(&E) + Send + Sync>;

/// Pre, post and error hooks wrapped around a unit of work returning
/// `Result<T, E>`. Hooks stay registered across invocations.
pub struct TransactionLifecycle<T, E> {
    pre_hook: Option<PreHook>,
    post_hook: Option<PostHook<T>>,
    error_hook: Option<ErrorHook<E>>,
}

impl<T, E> Default for TransactionLifecycle<T, E> {
    fn default() -> Self {
        Self {
            pre_hook: None,
            post_hook: None,
            error_hook: None,
        }
    }
}

impl<T, E> fmt::Debug for TransactionLifecycle<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionLifecycle")
            .field("pre_hook", &self.pre_hook.is_some())
            .field("post_hook", &self.post_hook.is_some())
            .field("error_hook", &self.error_hook.is_some())
            .finish()
    }
}

impl<T, E> TransactionLifecycle<T, E> {
    /// Creates a lifecycle with no hooks registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the hook run before the unit of work (and before `begin`).
    pub fn set_pre_hook<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.pre_hook = Some(Box::new(hook));
        self
    }

    /// Replaces the hook run with the result after success (after commit).
    pub fn set_post_hook<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.post_hook = Some(Box::new(hook));
        self
    }

    /// Replaces the hook run with the failure (after rollback).
    pub fn set_error_hook<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.error_hook = Some(Box::new(hook));
        self
    }

    /// Builder form of [`TransactionLifecycle::set_pre_hook`].
    pub fn with_pre_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.set_pre_hook(hook);
        self
    }

    /// Builder form of [`TransactionLifecycle::set_post_hook`].
    pub fn with_post_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.set_post_hook(hook);
        self
    }

    /// Builder form of [`TransactionLifecycle::set_error_hook`].
    pub fn with_error_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.set_error_hook(hook);
        self
    }

    /// Registers all three hooks from a [`TransactionAware`] component,
    /// replacing whatever was set before.
    pub fn with_aware<A>(mut self, aware: Arc<A>) -> Self
    where
        A: TransactionAware<T, E> + 'static,
        T: 'static,
        E: 'static,
    {
        let before = Arc::clone(&aware);
        let after = Arc::clone(&aware);
        self.set_pre_hook(move || before.before_transaction())
            .set_post_hook(move |result| after.after_transaction_committed(result))
            .set_error_hook(move |err| aware.handle_transaction_error(err));
        self
    }

    /// Runs the unit of work without a transaction.
    pub async fn run<F, Fut>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.fire_pre();
        match work().await {
            Ok(result) => {
                self.fire_post(&result);
                Ok(result)
            }
            Err(err) => {
                self.fire_error(&err);
                Err(err)
            }
        }
    }

    /// Runs the unit of work inside a transaction from `manager`.
    ///
    /// The pre-hook fires before `begin`. On success the session is
    /// committed before the post-hook sees the result; on failure it is
    /// rolled back before the error-hook sees the failure. A failed commit
    /// is treated as a failure of the invocation. A failed rollback
    /// replaces the unit of work's failure, which is logged at `error`.
    pub async fn run_with_transaction<M, F, Fut>(&self, manager: &M, work: F) -> Result<T, E>
    where
        M: TransactionManager,
        F: FnOnce(<M::Session as TransactionSession>::Handle) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<TransactionError> + fmt::Display,
    {
        self.fire_pre();

        let session = match manager.begin().await {
            Ok(session) => session,
            Err(err) => {
                let err = E::from(err);
                self.fire_error(&err);
                return Err(err);
            }
        };
        debug!("Transaction begun");

        match work(session.handle()).await {
            Ok(result) => {
                if let Err(err) = session.commit().await {
                    let err = E::from(err);
                    self.fire_error(&err);
                    return Err(err);
                }
                debug!("Transaction committed");
                self.fire_post(&result);
                Ok(result)
            }
            Err(err) => {
                if let Err(rollback_err) = session.rollback().await {
                    error!(error = %err, "Unit of work failed before rollback failure");
                    let rollback_err = E::from(rollback_err);
                    self.fire_error(&rollback_err);
                    return Err(rollback_err);
                }
                debug!("Transaction rolled back");
                self.fire_error(&err);
                Err(err)
            }
        }
    }

    fn fire_pre(&self) {
        if let Some(hook) = &self.pre_hook {
            hook();
        }
    }

    fn fire_post(&self, result: &T) {
        if let Some(hook) = &self.post_hook {
            hook(result);
        }
    }

    fn fire_error(&self, err: &E) {
        if let Some(hook) = &self.error_hook {
            hook(err);
        }
    }
}
