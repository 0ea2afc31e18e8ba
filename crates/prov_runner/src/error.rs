//! Error types for the runner module.

use thiserror::Error;

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Transport-level failures of a process invocation.
///
/// A process that starts and exits with a nonzero code is not an error at
/// this level; it is reported through [`crate::RunResult::exit_code`].
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Executable not found: {0}")]
    ExecutableNotFound(String),

    #[error("Failed to spawn {command}: {message}")]
    SpawnFailed { command: String, message: String },

    #[error("Invocation cancelled: {0}")]
    Cancelled(String),

    #[error("Process timeout after {0} seconds")]
    Timeout(u64),

    #[error("No mock response registered for: {0}")]
    NoMatchingResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunnerError {
    /// Whether this error was caused by a cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunnerError::Cancelled(_))
    }
}
