//! Error types for provisioning operations.

use thiserror::Error;

use prov_runner::RunnerError;

/// Result type alias for provisioning operations.
pub type ProvisionResult<T> = Result<T, ProvisionError>;

/// Errors that can terminate a provisioning task.
///
/// Phase errors carry the failing subprocess's diagnostic text verbatim.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Provisioning tool not available: {0}")]
    ToolUnavailable(String),

    #[error("Provisioning tool version {found} is not supported (minimum {minimum})")]
    ToolVersionUnsupported { found: String, minimum: String },

    #[error("Init failed: {0}")]
    InitFailed(String),

    #[error("Parameter file generation failed: {0}")]
    ParameterWriteFailed(String),

    #[error("Missing environment value '{0}' required by parameter generation")]
    MissingEnvironmentValue(String),

    #[error("Validation failed: {0}")]
    ValidateFailed(String),

    #[error("Plan failed: {0}")]
    PlanFailed(String),

    #[error("Apply failed: {0}")]
    ApplyFailed(String),

    #[error("Output parsing failed: {0}")]
    OutputParseFailed(String),

    #[error("Destroy failed: {0}")]
    DestroyFailed(String),

    #[error("Invalid deployment plan: {0}")]
    InvalidPlan(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Provisioning task aborted: {0}")]
    TaskAborted(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProvisionError {
    /// Map a transport-level runner failure onto a phase error.
    ///
    /// Cancellation always maps to [`ProvisionError::Cancelled`] so callers
    /// can tell it apart from a failing phase.
    pub fn from_runner(err: RunnerError, phase: impl FnOnce(String) -> ProvisionError) -> Self {
        match err {
            RunnerError::Cancelled(_) => ProvisionError::Cancelled,
            RunnerError::ExecutableNotFound(cmd) => {
                ProvisionError::ToolUnavailable(format!("executable '{}' not found", cmd))
            }
            other => phase(other.to_string()),
        }
    }

    /// Whether this error was caused by cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProvisionError::Cancelled)
    }
}
