//! Progress reports emitted by provisioning tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Logical lifecycle phase a report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Initialize,
    GenerateParameters,
    Validate,
    ValidateResult,
    Plan,
    PlanResult,
    CreateTemplate,
    Apply,
    Destroy,
    Outputs,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Initialize => "initialize",
            Phase::GenerateParameters => "generate-parameters",
            Phase::Validate => "validate",
            Phase::ValidateResult => "validate-result",
            Phase::Plan => "plan",
            Phase::PlanResult => "plan-result",
            Phase::CreateTemplate => "create-template",
            Phase::Apply => "apply",
            Phase::Destroy => "destroy",
            Phase::Outputs => "outputs",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One progress message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub message: String,
    pub phase: Phase,
    pub timestamp: DateTime<Utc>,
}

impl ProgressReport {
    pub fn new(phase: Phase, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            phase,
            timestamp: Utc::now(),
        }
    }
}

impl std::fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.phase, self.message)
    }
}
