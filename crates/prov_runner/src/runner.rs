//! Command runner trait and types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::RunArgs;
use crate::error::RunnerResult;

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    /// Exit code (-1 when the process was terminated by a signal)
    pub exit_code: i32,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
}

impl RunResult {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Check if execution was successful (exit code 0).
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Diagnostic text for a failed run: stderr, or stdout when stderr is empty.
    pub fn diagnostic(&self) -> String {
        if self.stderr.trim().is_empty() {
            self.stdout.clone()
        } else {
            self.stderr.clone()
        }
    }
}

/// Executes one process invocation.
///
/// Implementations must stop the underlying process promptly once `cancel`
/// fires and return [`crate::RunnerError::Cancelled`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, args: &RunArgs, cancel: &CancellationToken) -> RunnerResult<RunResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_prefers_stderr() {
        let result = RunResult {
            exit_code: 1,
            stdout: "partial".to_string(),
            stderr: "Error: bad config".to_string(),
        };
        assert_eq!(result.diagnostic(), "Error: bad config");
        assert!(!result.is_success());
    }

    #[test]
    fn test_diagnostic_falls_back_to_stdout() {
        let result = RunResult {
            exit_code: 1,
            stdout: "Error: something".to_string(),
            stderr: "  ".to_string(),
        };
        assert_eq!(result.diagnostic(), "Error: something");
    }
}
