pub mod manager;
pub mod output;

pub use manager::{EventLog, MockTransactionManager, TestError};
pub use output::RecordingOutput;
