mod common;

use app_support::command::{format_bytes, step, ProgressReporter, FAILURE, SUCCESS};
use app_support::{
    Command, CommandError, CommandResult, CommandRunner, InstallCommand, Output, SupportConfig,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use common::{EventLog, MockTransactionManager, RecordingOutput};

/// Command that records its run into the transaction's event log
struct ImportCommand {
    transactional: bool,
    fail: bool,
}

#[async_trait]
impl Command<EventLog> for ImportCommand {
    fn name(&self) -> &str {
        "import:users"
    }

    fn arguments(&self) -> Map<String, Value> {
        let mut args = Map::new();
        args.insert("source".to_string(), Value::String("users.csv".to_string()));
        args
    }

    fn use_transaction(&self) -> bool {
        self.transactional
    }

    async fn process(&self, tx: Option<EventLog>, output: &dyn Output) -> CommandResult<i32> {
        if let Some(tx) = tx {
            tx.push("process");
        }
        output.info("importing");
        if self.fail {
            return Err(CommandError::Failed("malformed row 3".to_string()));
        }
        Ok(SUCCESS)
    }
}

fn runner() -> (CommandRunner, Arc<RecordingOutput>) {
    let output = Arc::new(RecordingOutput::default());
    (CommandRunner::new(output.clone()), output)
}

#[tokio::test]
async fn test_transactional_command_commits() {
    let log = EventLog::new();
    let manager = MockTransactionManager::new(log.clone());
    let (runner, output) = runner();

    let code = runner
        .handle(&manager, &ImportCommand { transactional: true, fail: false })
        .await;

    assert_eq!(code, SUCCESS);
    assert_eq!(log.events(), vec!["begin", "process", "commit"]);

    let lines = output.info_lines();
    assert_eq!(lines[0], "Starting command execution...");
    assert_eq!(lines[1], "importing");
    assert!(lines[2].starts_with("Command completed in "));
    assert!(output.error_lines().is_empty());
}

#[tokio::test]
async fn test_plain_command_skips_transaction() {
    let log = EventLog::new();
    let manager = MockTransactionManager::new(log.clone());
    let (runner, output) = runner();

    let code = runner
        .handle(&manager, &ImportCommand { transactional: false, fail: false })
        .await;

    assert_eq!(code, SUCCESS);
    assert!(log.events().is_empty());
    assert_eq!(output.info_lines().len(), 3);
}

#[tokio::test]
async fn test_failing_command_rolls_back_and_returns_failure() {
    let log = EventLog::new();
    let manager = MockTransactionManager::new(log.clone());
    let (runner, output) = runner();

    let code = runner
        .handle(&manager, &ImportCommand { transactional: true, fail: true })
        .await;

    assert_eq!(code, FAILURE);
    assert_eq!(log.events(), vec!["begin", "process", "rollback"]);
    assert_eq!(output.error_lines(), vec!["malformed row 3"]);
    assert!(!output
        .info_lines()
        .iter()
        .any(|line| line.starts_with("Command completed")));
}

#[tokio::test]
async fn test_begin_failure_becomes_exit_code() {
    let log = EventLog::new();
    let manager = MockTransactionManager::new(log.clone()).failing_begin();
    let (runner, output) = runner();

    let code = runner
        .without_logging()
        .handle(&manager, &ImportCommand { transactional: true, fail: false })
        .await;

    assert_eq!(code, FAILURE);
    assert_eq!(log.events(), vec!["begin"]);
    assert_eq!(
        output.error_lines(),
        vec!["Transaction begin failed: pool exhausted"]
    );
}

#[tokio::test]
async fn test_local_command_rejects_transaction() {
    let (runner, output) = runner();

    let code = runner
        .handle_local(&ImportCommand { transactional: true, fail: false })
        .await;

    assert_eq!(code, FAILURE);
    assert_eq!(
        output.error_lines(),
        vec!["Command requires a transaction manager"]
    );
}

#[tokio::test]
async fn test_install_command_publishes_config() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let target = dir.path().join("config").join("app-support.json");
    let (runner, _output) = runner();

    let code = runner
        .handle_local::<(), _>(&InstallCommand::new(&target))
        .await;
    assert_eq!(code, SUCCESS);

    let written = std::fs::read_to_string(&target).expect("Config should be written");
    let config: SupportConfig = serde_json::from_str(&written).expect("Config should parse");
    assert_eq!(config, SupportConfig::default());
}

#[tokio::test]
async fn test_install_command_keeps_existing_config() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let target = dir.path().join("app-support.json");
    std::fs::write(&target, "{}").expect("Failed to seed config");
    let (runner, output) = runner();

    let code = runner
        .handle_local::<(), _>(&InstallCommand::new(&target))
        .await;
    assert_eq!(code, SUCCESS);
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "{}");
    assert!(output
        .info_lines()
        .iter()
        .any(|line| line.contains("skipping")));

    let code = runner
        .handle_local::<(), _>(&InstallCommand::new(&target).force())
        .await;
    assert_eq!(code, SUCCESS);
    assert_ne!(std::fs::read_to_string(&target).unwrap(), "{}");
}

#[tokio::test]
async fn test_step_reports_outcome() {
    let output = RecordingOutput::default();

    let value = step(&output, "load", || async { Ok::<_, CommandError>(3) })
        .await
        .expect("step should succeed");
    assert_eq!(value, 3);

    let err = step(&output, "save", || async {
        Err::<(), _>(CommandError::Failed("disk full".to_string()))
    })
    .await
    .expect_err("step should fail");
    assert!(matches!(err, CommandError::Failed(_)));

    assert_eq!(
        output.info_lines(),
        vec!["Step: load", "✓ Done", "Step: save"]
    );
    assert_eq!(output.error_lines(), vec!["✗ Failed: disk full"]);
}

#[test]
fn test_format_bytes() {
    assert_eq!(format_bytes(0, 2), "0 B");
    assert_eq!(format_bytes(512, 2), "512 B");
    assert_eq!(format_bytes(1024, 2), "1 KB");
    assert_eq!(format_bytes(1536, 2), "1.5 KB");
    assert_eq!(format_bytes(5 * 1024 * 1024, 2), "5 MB");
    assert_eq!(format_bytes(1_234_567_890, 1), "1.1 GB");
    assert_eq!(format_bytes(u64::MAX, 0), "16777216 TB");
}

#[test]
fn test_progress_reporter() {
    let output = RecordingOutput::default();
    let progress = ProgressReporter::new(4);
    progress.advance(1);
    progress.advance(10);
    assert_eq!(progress.snapshot().current, 4);

    progress.finish(&output);
    assert!(progress.snapshot().finished);

    let mut seen = Vec::new();
    ProgressReporter::for_each(vec!["a", "b", "c"], &output, |item| seen.push(item));
    assert_eq!(seen, vec!["a", "b", "c"]);
    assert_eq!(output.info_lines(), vec!["4/4", "3/3"]);
}

#[test]
fn test_progress_without_total_saturates() {
    let progress = ProgressReporter::new(0);
    progress.advance(u64::MAX);
    progress.advance(1);
    assert_eq!(progress.snapshot().current, u64::MAX);
}

/// Output writing into the same log as the transaction manager
struct LoggedOutput(EventLog);

impl Output for LoggedOutput {
    fn info(&self, line: &str) {
        self.0.push(format!("info:{line}"));
    }

    fn error(&self, line: &str) {
        self.0.push(format!("error:{line}"));
    }
}

#[tokio::test]
async fn test_start_message_precedes_transaction() {
    let log = EventLog::new();
    let manager = MockTransactionManager::new(log.clone());
    let runner = CommandRunner::new(Arc::new(LoggedOutput(log.clone())));

    let code = runner
        .handle(&manager, &ImportCommand { transactional: true, fail: true })
        .await;

    assert_eq!(code, FAILURE);
    assert_eq!(
        log.events(),
        vec![
            "info:Starting command execution...",
            "begin",
            "process",
            "info:importing",
            "rollback",
            "error:malformed row 3",
        ]
    );
}
