//! Terraform provider configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Oldest Terraform release whose `-json` output and `-chdir` flag are relied on.
pub const MINIMUM_TERRAFORM_VERSION: &str = "1.1.7";

/// Configuration for [`crate::TerraformProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerraformProviderConfig {
    /// Terraform executable name or path
    pub executable: String,
    /// Minimum supported Terraform version
    pub minimum_version: String,
    /// Pass `-auto-approve` to apply. When false, apply runs attached to the
    /// terminal and is bracketed by interactivity signals.
    pub auto_approve: bool,
    /// Extra environment variables for every Terraform invocation
    pub env: HashMap<String, String>,
}

impl Default for TerraformProviderConfig {
    fn default() -> Self {
        Self {
            executable: "terraform".to_string(),
            minimum_version: MINIMUM_TERRAFORM_VERSION.to_string(),
            auto_approve: false,
            env: HashMap::new(),
        }
    }
}

impl TerraformProviderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    pub fn with_minimum_version(mut self, version: impl Into<String>) -> Self {
        self.minimum_version = version.into();
        self
    }

    pub fn auto_approve(mut self, enabled: bool) -> Self {
        self.auto_approve = enabled;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TerraformProviderConfig::default();
        assert_eq!(config.executable, "terraform");
        assert_eq!(config.minimum_version, MINIMUM_TERRAFORM_VERSION);
        assert!(!config.auto_approve);
        assert!(config.env.is_empty());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TerraformProviderConfig =
            serde_json::from_str(r#"{"auto_approve": true}"#).unwrap();
        assert!(config.auto_approve);
        assert_eq!(config.executable, "terraform");
    }
}
