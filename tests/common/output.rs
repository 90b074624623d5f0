use parking_lot::RwLock;

use app_support::Output;

/// Captures console lines for assertions
#[derive(Debug, Default)]
pub struct RecordingOutput {
    info: RwLock<Vec<String>>,
    error: RwLock<Vec<String>>,
}

impl RecordingOutput {
    pub fn info_lines(&self) -> Vec<String> {
        self.info.read().clone()
    }

    pub fn error_lines(&self) -> Vec<String> {
        self.error.read().clone()
    }
}

impl Output for RecordingOutput {
    fn info(&self, line: &str) {
        self.info.write().push(line.to_string());
    }

    fn error(&self, line: &str) {
        self.error.write().push(line.to_string());
    }
}
