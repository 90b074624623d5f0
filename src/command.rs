//! Base machinery for CLI commands.
//!
//! A [`Command`] only implements `process`. [`CommandRunner`] wraps it in
//! the lifecycle hooks, optionally inside a transaction, logs start,
//! completion and failure, and turns any failure into [`FAILURE`].

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::config::SupportConfig;
use crate::{
    Executor, ServiceError, TransactionError, TransactionLifecycle, TransactionManager,
    TransactionSession,
};

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const INVALID: i32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Command requires a transaction manager")]
    TransactionUnavailable,

    #[error("{0}")]
    Failed(String),
}

pub type CommandResult<T> = Result<T, CommandError>;

/// Console sink for the human-readable lines a command prints.
pub trait Output: Send + Sync {
    fn info(&self, line: &str);
    fn error(&self, line: &str);
}

/// Writes info lines to stdout and error lines to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdOutput;

impl Output for StdOutput {
    fn info(&self, line: &str) {
        println!("{line}");
    }

    fn error(&self, line: &str) {
        eprintln!("{line}");
    }
}

/// A CLI command. `H` is the transaction handle passed to `process` when
/// the command runs inside a transaction.
#[async_trait]
pub trait Command<H = Executor>: Send + Sync
where
    H: Send + 'static,
{
    fn name(&self) -> &str;

    /// Arguments and options, recorded in the start log.
    fn arguments(&self) -> Map<String, Value> {
        Map::new()
    }

    fn use_transaction(&self) -> bool {
        false
    }

    /// The command body. `tx` is `Some` only when `use_transaction` is set.
    async fn process(&self, tx: Option<H>, output: &dyn Output) -> CommandResult<i32>;
}

/// Runs [`Command`]s with lifecycle logging and exit-code conversion.
pub struct CommandRunner {
    output: Arc<dyn Output>,
    enable_logging: bool,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new(Arc::new(StdOutput))
    }
}

impl CommandRunner {
    /// Creates a runner writing console lines to `output`, logging enabled.
    pub fn new(output: Arc<dyn Output>) -> Self {
        Self {
            output,
            enable_logging: true,
        }
    }

    pub fn without_logging(mut self) -> Self {
        self.enable_logging = false;
        self
    }

    pub fn with_logging(mut self) -> Self {
        self.enable_logging = true;
        self
    }

    pub fn output(&self) -> &dyn Output {
        self.output.as_ref()
    }

    /// Runs `command`, inside a transaction from `manager` when the command
    /// asks for one. Returns the command's exit code, or [`FAILURE`].
    pub async fn handle<M, C>(&self, manager: &M, command: &C) -> i32
    where
        M: TransactionManager,
        C: Command<<M::Session as TransactionSession>::Handle>,
    {
        let lifecycle = self.lifecycle(command.name(), command.arguments());
        let result = if command.use_transaction() {
            lifecycle
                .run_with_transaction(manager, |tx| command.process(Some(tx), self.output()))
                .await
        } else {
            lifecycle.run(|| command.process(None, self.output())).await
        };
        self.finish(result)
    }

    /// Runs a command that needs no database. A command that asks for a
    /// transaction fails with [`CommandError::TransactionUnavailable`].
    pub async fn handle_local<H, C>(&self, command: &C) -> i32
    where
        H: Send + 'static,
        C: Command<H>,
    {
        let lifecycle = self.lifecycle(command.name(), command.arguments());
        let result = lifecycle
            .run(|| async {
                if command.use_transaction() {
                    return Err(CommandError::TransactionUnavailable);
                }
                command.process(None, self.output()).await
            })
            .await;
        self.finish(result)
    }

    fn lifecycle(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> TransactionLifecycle<i32, CommandError> {
        let started_at = Instant::now();
        let logging = self.enable_logging;

        let (before_name, before_output) = (name.to_string(), Arc::clone(&self.output));
        let (after_name, after_output) = (name.to_string(), Arc::clone(&self.output));
        let error_name = name.to_string();

        TransactionLifecycle::new()
            .with_pre_hook(move || {
                if logging {
                    info!(
                        command = %before_name,
                        arguments = %serde_json::Value::Object(arguments.clone()),
                        "[Command Started]"
                    );
                }
                before_output.info("Starting command execution...");
            })
            .with_post_hook(move |result| {
                let duration = (started_at.elapsed().as_secs_f64() * 100.0).round() / 100.0;
                if logging {
                    info!(command = %after_name, duration, result, "[Command Completed]");
                }
                after_output.info(&format!("Command completed in {duration}s"));
            })
            .with_error_hook(move |err| {
                if logging {
                    error!(command = %error_name, error = %err, "[Command Failed]");
                }
            })
    }

    fn finish(&self, result: CommandResult<i32>) -> i32 {
        match result {
            Ok(code) => code,
            Err(err) => {
                self.output.error(&err.to_string());
                FAILURE
            }
        }
    }
}

/// Runs one named step, printing its outcome. Failures are printed and
/// propagated.
pub async fn step<F, Fut, T>(output: &dyn Output, description: &str, work: F) -> CommandResult<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = CommandResult<T>>,
{
    output.info(&format!("Step: {description}"));
    match work().await {
        Ok(value) => {
            output.info("✓ Done");
            Ok(value)
        }
        Err(err) => {
            output.error(&format!("✗ Failed: {err}"));
            Err(err)
        }
    }
}

/// Human-readable byte size using 1024 steps, e.g. `1.5 KB`.
pub fn format_bytes(bytes: u64, precision: usize) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut pow = 0;
    let mut size = bytes as f64;
    while size >= 1024.0 && pow < UNITS.len() - 1 {
        size /= 1024.0;
        pow += 1;
    }

    let factor = 10f64.powi(precision as i32);
    let rounded = (size * factor).round() / factor;
    format!("{} {}", rounded, UNITS[pow])
}

/// Step counter for batch commands.
#[derive(Debug, Default)]
pub struct ProgressReporter {
    state: Mutex<Progress>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub current: u64,
    /// Zero when the total is unknown.
    pub max: u64,
    pub finished: bool,
}

impl ProgressReporter {
    pub fn new(max: u64) -> Self {
        Self {
            state: Mutex::new(Progress {
                max,
                ..Progress::default()
            }),
        }
    }

    pub fn advance(&self, step: u64) {
        let mut state = self.state.lock();
        state.current = state.current.saturating_add(step);
        if state.max > 0 {
            state.current = state.current.min(state.max);
        }
    }

    pub fn finish(&self, output: &dyn Output) {
        let mut state = self.state.lock();
        if state.max > 0 {
            state.current = state.max;
        }
        state.finished = true;
        if state.max > 0 {
            output.info(&format!("{}/{}", state.current, state.max));
        } else {
            output.info(&state.current.to_string());
        }
    }

    pub fn snapshot(&self) -> Progress {
        *self.state.lock()
    }

    /// Calls `work` for each item, advancing once per item.
    pub fn for_each<I, F>(items: I, output: &dyn Output, mut work: F)
    where
        I: IntoIterator,
        F: FnMut(I::Item),
    {
        let iter = items.into_iter();
        let max = match iter.size_hint() {
            (lower, Some(upper)) if lower == upper => upper as u64,
            _ => 0,
        };
        let progress = ProgressReporter::new(max);
        for item in iter {
            work(item);
            progress.advance(1);
        }
        progress.finish(output);
    }
}

/// Publishes the default configuration file.
#[derive(Debug, Clone)]
pub struct InstallCommand {
    target: PathBuf,
    force: bool,
}

impl InstallCommand {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            force: false,
        }
    }

    /// Overwrite an existing configuration file.
    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }
}

#[async_trait]
impl<H: Send + 'static> Command<H> for InstallCommand {
    fn name(&self) -> &str {
        "app-support:install"
    }

    fn arguments(&self) -> Map<String, Value> {
        let mut args = Map::new();
        args.insert("target".to_string(), Value::String(self.target.display().to_string()));
        args.insert("force".to_string(), Value::Bool(self.force));
        args
    }

    async fn process(&self, _tx: Option<H>, output: &dyn Output) -> CommandResult<i32> {
        output.info("Installing app-support...");

        if self.target.exists() && !self.force {
            output.info(&format!(
                "Configuration already present at {}, skipping",
                self.target.display()
            ));
            return Ok(SUCCESS);
        }

        if let Some(parent) = self.target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&SupportConfig::default())?;
        std::fs::write(&self.target, contents)?;

        output.info("app-support installed");
        output.info(&format!("Review the configuration at {}", self.target.display()));
        Ok(SUCCESS)
    }
}
