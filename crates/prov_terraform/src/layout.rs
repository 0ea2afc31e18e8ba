//! Per-environment artifact layout and state backend detection.

use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;

use prov_core::{
    Environment, ProvisionError, ProvisionResult, TerraformDeploymentDetails, ENV_NAME_KEY,
};

/// Directory under the project root holding per-environment state.
pub const ENV_ROOT_DIR: &str = ".azure";
/// File name of the local state file.
pub const LOCAL_STATE_FILE: &str = "terraform.tfstate";

const BACKEND_PATTERN: &str = r#"(?m)^\s*backend\s+"[^"]+"\s*\{"#;

/// Deterministic artifact paths for one module in one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub env_dir: PathBuf,
    pub parameter_file: PathBuf,
    pub plan_file: PathBuf,
    pub local_state_file: PathBuf,
}

impl ArtifactPaths {
    pub fn new(project_path: &Path, env_name: &str, module: &str) -> Self {
        let env_dir = project_path.join(ENV_ROOT_DIR).join(env_name);
        Self {
            parameter_file: env_dir.join(format!("{}.tfvars.json", module)),
            plan_file: env_dir.join(format!("{}.tfplan", module)),
            local_state_file: env_dir.join(LOCAL_STATE_FILE),
            env_dir,
        }
    }

    /// Resolve the paths for the environment's current name.
    pub fn for_environment(
        project_path: &Path,
        env: &Environment,
        module: &str,
    ) -> ProvisionResult<Self> {
        let env_name = env
            .env_name()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ProvisionError::MissingEnvironmentValue(ENV_NAME_KEY.to_string()))?;
        Ok(Self::new(project_path, env_name, module))
    }

    pub fn to_details(&self) -> TerraformDeploymentDetails {
        TerraformDeploymentDetails {
            parameter_file_path: self.parameter_file.clone(),
            plan_file_path: self.plan_file.clone(),
            local_state_file_path: self.local_state_file.clone(),
        }
    }

    /// Whether `details` points at exactly these artifacts.
    pub fn matches(&self, details: &TerraformDeploymentDetails) -> bool {
        details.parameter_file_path == self.parameter_file
            && details.plan_file_path == self.plan_file
            && details.local_state_file_path == self.local_state_file
    }

    /// The `-state=` argument target, or `None` when state lives in a remote
    /// backend.
    pub fn state_arg(&self, remote_backend: bool) -> Option<&Path> {
        if remote_backend {
            None
        } else {
            Some(&self.local_state_file)
        }
    }
}

/// Whether any `*.tf` file directly inside `module_path` declares a
/// `backend "<name>"` block.
pub fn uses_remote_backend(module_path: &Path) -> ProvisionResult<bool> {
    if !module_path.is_dir() {
        return Ok(false);
    }

    let pattern = Regex::new(BACKEND_PATTERN)
        .map_err(|e| ProvisionError::Config(format!("invalid backend pattern: {}", e)))?;

    for entry in std::fs::read_dir(module_path)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("tf") {
            continue;
        }
        let content = std::fs::read_to_string(&path)?;
        if pattern.is_match(&content) {
            debug!("Remote backend declared in {:?}", path);
            return Ok(true);
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_paths_are_scoped_per_environment() {
        let paths = ArtifactPaths::new(Path::new("/work/app"), "dev", "main");

        assert_eq!(paths.env_dir, PathBuf::from("/work/app/.azure/dev"));
        assert_eq!(
            paths.parameter_file,
            PathBuf::from("/work/app/.azure/dev/main.tfvars.json")
        );
        assert_eq!(paths.plan_file, PathBuf::from("/work/app/.azure/dev/main.tfplan"));
        assert_eq!(
            paths.local_state_file,
            PathBuf::from("/work/app/.azure/dev/terraform.tfstate")
        );

        let other = ArtifactPaths::new(Path::new("/work/app"), "prod", "main");
        assert!(!other.matches(&paths.to_details()));
        assert!(paths.matches(&paths.to_details()));
    }

    #[test]
    fn test_missing_env_name() {
        let err = ArtifactPaths::for_environment(Path::new("/p"), &Environment::new(), "main")
            .unwrap_err();
        assert!(matches!(err, ProvisionError::MissingEnvironmentValue(key) if key == ENV_NAME_KEY));
    }

    #[test]
    fn test_state_arg() {
        let paths = ArtifactPaths::new(Path::new("/p"), "dev", "main");
        assert_eq!(paths.state_arg(false), Some(paths.local_state_file.as_path()));
        assert_eq!(paths.state_arg(true), None);
    }

    #[test]
    fn test_remote_backend_detection() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("main.tf"),
            "resource \"azurerm_resource_group\" \"rg\" {}\n",
        )
        .unwrap();
        assert!(!uses_remote_backend(dir.path()).unwrap());

        std::fs::write(
            dir.path().join("provider.tf"),
            "terraform {\n  backend \"azurerm\" {\n    key = \"state\"\n  }\n}\n",
        )
        .unwrap();
        assert!(uses_remote_backend(dir.path()).unwrap());
    }

    #[test]
    fn test_backend_in_non_tf_file_is_ignored() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("notes.md"), "backend \"s3\" {}").unwrap();
        assert!(!uses_remote_backend(dir.path()).unwrap());
        assert!(!uses_remote_backend(&dir.path().join("missing")).unwrap());
    }
}
