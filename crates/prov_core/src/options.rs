//! Provisioning options selecting the module to operate on.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ProvisionError, ProvisionResult};

/// Provisioning backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Terraform,
    Bicep,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Terraform => "terraform",
            ProviderKind::Bicep => "bicep",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Module selection for a provisioning provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Backend to provision with
    pub provider: ProviderKind,
    /// Module directory, relative to the project root
    pub path: PathBuf,
    /// Module name; names the parameter template and generated artifacts
    pub module: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            path: PathBuf::from("infra"),
            module: "main".to_string(),
        }
    }
}

impl Options {
    pub fn terraform() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    /// Parse options from a YAML document; absent fields take defaults.
    pub fn from_yaml(content: &str) -> ProvisionResult<Self> {
        serde_yaml::from_str(content).map_err(|e| ProvisionError::Config(e.to_string()))
    }

    /// Resolve the module directory against the project root.
    pub fn module_path(&self, project_path: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            project_path.join(&self.path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert_eq!(options.provider, ProviderKind::Terraform);
        assert_eq!(options.path, PathBuf::from("infra"));
        assert_eq!(options.module, "main");
    }

    #[test]
    fn test_from_yaml_partial() {
        let options = Options::from_yaml("path: deploy/tf\n").unwrap();
        assert_eq!(options.path, PathBuf::from("deploy/tf"));
        assert_eq!(options.module, "main");
        assert_eq!(options.provider, ProviderKind::Terraform);
    }

    #[test]
    fn test_from_yaml_rejects_unknown_provider() {
        let err = Options::from_yaml("provider: pulumi\n").unwrap_err();
        assert!(matches!(err, ProvisionError::Config(_)));
    }

    #[test]
    fn test_module_path() {
        let options = Options::terraform().with_path("infra");
        assert_eq!(
            options.module_path(Path::new("/work/app")),
            PathBuf::from("/work/app/infra")
        );
    }
}
