//! Terraform command-line wrapper.
//!
//! Every invocation has the shape `terraform -chdir=<module> <subcommand> ...`.
//! `version` and `output` answer with JSON; `validate` and `plan` answer with
//! free text. [`ToolOutput`] keeps that distinction instead of forcing one
//! schema onto both.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use prov_core::{DestroyOptions, ProvisionError, ProvisionResult};
use prov_runner::{CommandRunner, RunArgs, RunResult};

/// Variable exported when destroy should purge soft-deleted resources.
pub const FORCE_PURGE_VAR: &str = "TF_VAR_force_purge";

/// Keeps reported tool output free of ANSI escapes.
const NO_COLOR: &str = "-no-color";

/// Output of a Terraform subcommand.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Text(String),
    Json(Value),
}

impl ToolOutput {
    pub fn into_text(self) -> String {
        match self {
            ToolOutput::Text(text) => text,
            ToolOutput::Json(value) => value.to_string(),
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            ToolOutput::Json(value) => Some(value),
            ToolOutput::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum OutputFormat {
    Text,
    Json,
}

/// Response of `terraform version -json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VersionInfo {
    pub terraform_version: String,
    #[serde(default)]
    pub platform: Option<String>,
}

/// Parse `major.minor.patch`, tolerating a leading `v`, missing components and
/// a pre-release suffix.
pub fn parse_version(version: &str) -> Option<(u64, u64, u64)> {
    let core = version.trim().trim_start_matches('v');
    let core = core.split(['-', '+']).next()?;
    let mut parts = core.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().map_or(Some(0), |p| p.parse().ok())?;
    let patch = parts.next().map_or(Some(0), |p| p.parse().ok())?;
    Some((major, minor, patch))
}

/// Fail unless `found` is at least `minimum`.
pub fn ensure_minimum_version(found: &str, minimum: &str) -> ProvisionResult<()> {
    let unsupported = || ProvisionError::ToolVersionUnsupported {
        found: found.to_string(),
        minimum: minimum.to_string(),
    };
    let found_version = parse_version(found).ok_or_else(unsupported)?;
    let minimum_version = parse_version(minimum).ok_or_else(|| {
        ProvisionError::Config(format!("invalid minimum terraform version '{}'", minimum))
    })?;
    if found_version < minimum_version {
        return Err(unsupported());
    }
    Ok(())
}

/// Terraform invocations against one module directory.
pub struct TerraformCli {
    runner: Arc<dyn CommandRunner>,
    executable: String,
    module_path: PathBuf,
    env: HashMap<String, String>,
}

impl TerraformCli {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        executable: impl Into<String>,
        module_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            executable: executable.into(),
            module_path: module_path.into(),
            env: HashMap::new(),
        }
    }

    /// Set environment variables passed to every invocation.
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn module_path(&self) -> &Path {
        &self.module_path
    }

    fn command(&self, subcommand: &str) -> RunArgs {
        RunArgs::new(&self.executable)
            .arg(format!("-chdir={}", self.module_path.display()))
            .arg(subcommand)
            .envs(&self.env)
    }

    /// Query the installed Terraform version.
    ///
    /// A response that is not the expected JSON document fails with
    /// [`ProvisionError::OutputParseFailed`] carrying the raw text.
    pub async fn version(&self, cancel: &CancellationToken) -> ProvisionResult<VersionInfo> {
        let args = self.command("version").arg("-json");
        let output = self
            .run_command(args, cancel, ProvisionError::ToolUnavailable, OutputFormat::Json)
            .await?;
        let value = output.into_json().unwrap_or(Value::Null);
        serde_json::from_value(value.clone()).map_err(|e| {
            ProvisionError::OutputParseFailed(format!("{} ({})", value, e))
        })
    }

    /// Run terraform init.
    pub async fn init(&self, cancel: &CancellationToken) -> ProvisionResult<String> {
        info!("Running terraform init in {:?}", self.module_path);
        let args = self.command("init").args(["-upgrade", "-input=false", NO_COLOR]);
        self.run_text(args, cancel, ProvisionError::InitFailed).await
    }

    /// Run terraform validate.
    pub async fn validate(&self, cancel: &CancellationToken) -> ProvisionResult<String> {
        info!("Running terraform validate in {:?}", self.module_path);
        let args = self.command("validate").arg(NO_COLOR);
        self.run_text(args, cancel, ProvisionError::ValidateFailed).await
    }

    /// Run terraform plan, writing the plan artifact to `plan_file`.
    pub async fn plan(
        &self,
        cancel: &CancellationToken,
        var_file: &Path,
        plan_file: &Path,
        state_file: Option<&Path>,
    ) -> ProvisionResult<String> {
        info!("Running terraform plan in {:?}", self.module_path);
        let mut args = self.command("plan").args([
            format!("-out={}", plan_file.display()),
            "-input=false".to_string(),
            "-lock=false".to_string(),
            format!("-var-file={}", var_file.display()),
            NO_COLOR.to_string(),
        ]);
        if let Some(state) = state_file {
            args = args.arg(format!("-state={}", state.display()));
        }
        self.run_text(args, cancel, ProvisionError::PlanFailed).await
    }

    /// Run terraform apply. Without auto-approval the process is attached to
    /// the terminal so the operator can confirm.
    pub async fn apply(
        &self,
        cancel: &CancellationToken,
        var_file: &Path,
        state_file: Option<&Path>,
        auto_approve: bool,
    ) -> ProvisionResult<()> {
        info!("Running terraform apply in {:?}", self.module_path);
        let mut args = self
            .command("apply")
            .args(["-lock=false", "-input=false"])
            .interactive(!auto_approve);
        if auto_approve {
            args = args.args(["-auto-approve", NO_COLOR]);
        }
        args = args.arg(format!("-var-file={}", var_file.display()));
        if let Some(state) = state_file {
            args = args.arg(format!("-state={}", state.display()));
        }
        self.run_text(args, cancel, ProvisionError::ApplyFailed)
            .await
            .map(|_| ())
    }

    /// Run terraform destroy.
    pub async fn destroy(
        &self,
        cancel: &CancellationToken,
        var_file: Option<&Path>,
        state_file: Option<&Path>,
        options: DestroyOptions,
    ) -> ProvisionResult<()> {
        info!("Running terraform destroy in {:?}", self.module_path);
        let mut args = self
            .command("destroy")
            .args(["-input=false", "-lock=false", NO_COLOR])
            .interactive(!options.force_delete);
        if let Some(var_file) = var_file {
            args = args.arg(format!("-var-file={}", var_file.display()));
        }
        if let Some(state) = state_file {
            args = args.arg(format!("-state={}", state.display()));
        }
        if options.force_delete {
            args = args.arg("-auto-approve");
        }
        if options.force_purge {
            args = args.env(FORCE_PURGE_VAR, "true");
        }
        self.run_text(args, cancel, ProvisionError::DestroyFailed)
            .await
            .map(|_| ())
    }

    /// Query module outputs as JSON.
    pub async fn output(
        &self,
        cancel: &CancellationToken,
        state_file: Option<&Path>,
    ) -> ProvisionResult<Value> {
        debug!("Reading terraform outputs in {:?}", self.module_path);
        let mut args = self.command("output").args(["-json", NO_COLOR]);
        if let Some(state) = state_file {
            args = args.arg(format!("-state={}", state.display()));
        }
        let output = self
            .run_command(args, cancel, ProvisionError::OutputParseFailed, OutputFormat::Json)
            .await?;
        output.into_json().ok_or_else(|| {
            ProvisionError::OutputParseFailed("terraform output did not return JSON".to_string())
        })
    }

    async fn run_text(
        &self,
        args: RunArgs,
        cancel: &CancellationToken,
        phase: fn(String) -> ProvisionError,
    ) -> ProvisionResult<String> {
        self.run_command(args, cancel, phase, OutputFormat::Text)
            .await
            .map(ToolOutput::into_text)
    }

    async fn run_command(
        &self,
        args: RunArgs,
        cancel: &CancellationToken,
        phase: fn(String) -> ProvisionError,
        format: OutputFormat,
    ) -> ProvisionResult<ToolOutput> {
        debug!("Executing {}", args.command_line());

        let result: RunResult = self
            .runner
            .run(&args, cancel)
            .await
            .map_err(|e| ProvisionError::from_runner(e, phase))?;

        if !result.is_success() {
            return Err(phase(result.diagnostic()));
        }

        match format {
            OutputFormat::Text => Ok(ToolOutput::Text(result.stdout)),
            OutputFormat::Json => serde_json::from_str(&result.stdout)
                .map(ToolOutput::Json)
                .map_err(|e| {
                    ProvisionError::OutputParseFailed(format!(
                        "invalid JSON from `{}`: {}: {}",
                        args.command_line(),
                        e,
                        result.stdout
                    ))
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("1.1.7"), Some((1, 1, 7)));
        assert_eq!(parse_version("v1.6.0"), Some((1, 6, 0)));
        assert_eq!(parse_version("1.7.0-beta1"), Some((1, 7, 0)));
        assert_eq!(parse_version("1.2"), Some((1, 2, 0)));
        assert_eq!(parse_version("one.two"), None);
        assert_eq!(parse_version(""), None);
    }

    #[test]
    fn test_ensure_minimum_version() {
        assert!(ensure_minimum_version("1.1.7", "1.1.7").is_ok());
        assert!(ensure_minimum_version("1.10.0", "1.1.7").is_ok());
        assert!(matches!(
            ensure_minimum_version("1.0.11", "1.1.7"),
            Err(ProvisionError::ToolVersionUnsupported { .. })
        ));
        assert!(matches!(
            ensure_minimum_version("garbage", "1.1.7"),
            Err(ProvisionError::ToolVersionUnsupported { .. })
        ));
    }

    #[test]
    fn test_tool_output_tags() {
        let text = ToolOutput::Text("Success!".to_string());
        assert_eq!(text.clone().into_json(), None);
        assert_eq!(text.into_text(), "Success!");

        let json = ToolOutput::Json(serde_json::json!({"a": 1}));
        assert!(json.into_json().is_some());
    }
}
