//! Terraform implementation of [`Provider`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use prov_core::{
    DeployResult, Deployment, DeploymentDetails, DeploymentPlan, DestroyOptions, DestroyResult,
    Environment, GetDeploymentResult, Options, Phase, Provider, ProviderKind, ProvisionError,
    ProvisionResult, ProvisioningTask, Scope, SharedEnvironment, TaskContext,
    TerraformDeploymentDetails,
};
use prov_runner::{CancellationToken, CommandRunner};

use crate::cli::{ensure_minimum_version, TerraformCli};
use crate::config::TerraformProviderConfig;
use crate::layout::{uses_remote_backend, ArtifactPaths};
use crate::outputs::OutputParser;
use crate::parameters::{read_parameter_file, ParameterFileWriter};

/// Marks Terraform output as running under automation.
pub const AUTOMATION_VAR: &str = "TF_IN_AUTOMATION";
/// Subscription variable read by the azurerm provider.
pub const SUBSCRIPTION_VAR: &str = "ARM_SUBSCRIPTION_ID";

/// Provisions a Terraform module for one environment.
#[derive(Clone)]
pub struct TerraformProvider {
    env: SharedEnvironment,
    project_path: PathBuf,
    module_path: PathBuf,
    options: Options,
    config: TerraformProviderConfig,
    runner: Arc<dyn CommandRunner>,
}

impl TerraformProvider {
    pub fn new(
        env: SharedEnvironment,
        project_path: impl Into<PathBuf>,
        options: Options,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let project_path = project_path.into();
        let module_path = options.module_path(&project_path);
        Self {
            env,
            project_path,
            module_path,
            options,
            config: TerraformProviderConfig::default(),
            runner,
        }
    }

    pub fn with_config(mut self, config: TerraformProviderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn module_path(&self) -> &Path {
        &self.module_path
    }

    pub fn config(&self) -> &TerraformProviderConfig {
        &self.config
    }

    /// Artifact paths for the environment's current name.
    pub fn artifact_paths(&self) -> ProvisionResult<ArtifactPaths> {
        ArtifactPaths::for_environment(&self.project_path, &self.env.read(), &self.options.module)
    }

    fn ensure_terraform(&self) -> ProvisionResult<()> {
        if self.options.provider != ProviderKind::Terraform {
            return Err(ProvisionError::Config(format!(
                "options select the {} provider, not terraform",
                self.options.provider
            )));
        }
        Ok(())
    }

    // Operations work on a copy so no lock is held across subprocess calls.
    fn snapshot(&self) -> Environment {
        self.env.read().clone()
    }

    fn cli(&self, env: &Environment, scope: Option<&Scope>) -> TerraformCli {
        let mut vars = HashMap::new();
        vars.insert(AUTOMATION_VAR.to_string(), "1".to_string());

        let subscription = scope
            .map(Scope::subscription_id)
            .filter(|id| !id.is_empty())
            .or_else(|| env.subscription_id());
        if let Some(id) = subscription {
            vars.insert(SUBSCRIPTION_VAR.to_string(), id.to_string());
        }

        vars.extend(self.config.env.clone());

        TerraformCli::new(
            self.runner.clone(),
            &self.config.executable,
            &self.module_path,
        )
        .with_env(vars)
    }

    async fn run_plan(self, ctx: TaskContext) -> ProvisionResult<DeploymentPlan> {
        self.ensure_terraform()?;
        let env = self.snapshot();
        let paths = ArtifactPaths::for_environment(&self.project_path, &env, &self.options.module)?;
        let cli = self.cli(&env, None);
        let cancel = ctx.cancellation().clone();

        info!("Planning terraform module {:?}", self.module_path);

        ctx.check_cancelled()?;
        let version = cli.version(&cancel).await.map_err(|e| match e {
            ProvisionError::OutputParseFailed(raw) => ProvisionError::ToolVersionUnsupported {
                found: raw,
                minimum: self.config.minimum_version.clone(),
            },
            other => other,
        })?;
        ensure_minimum_version(&version.terraform_version, &self.config.minimum_version)?;
        info!("Using terraform {}", version.terraform_version);

        ctx.check_cancelled()?;
        ctx.report(Phase::Initialize, "Initialize terraform");
        cli.init(&cancel).await?;

        ctx.check_cancelled()?;
        ctx.report(Phase::GenerateParameters, "Generating terraform parameters");
        let parameters = ParameterFileWriter::new(&self.module_path, &self.options.module)
            .write(&env, &paths.parameter_file)?;

        ctx.check_cancelled()?;
        ctx.report(Phase::Validate, "Validate terraform template");
        let validated = cli.validate(&cancel).await?;
        ctx.report(
            Phase::ValidateResult,
            format!("terraform validate result : {}", validated.trim()),
        );

        ctx.check_cancelled()?;
        ctx.report(Phase::Plan, "Plan terraform template");
        let remote = uses_remote_backend(&self.module_path)?;
        let planned = cli
            .plan(
                &cancel,
                &paths.parameter_file,
                &paths.plan_file,
                paths.state_arg(remote),
            )
            .await?;
        ctx.report(
            Phase::PlanResult,
            format!("terraform plan result : {}", planned.trim()),
        );

        ctx.check_cancelled()?;
        ctx.report(Phase::CreateTemplate, "Create terraform template");

        info!("Plan written to {:?}", paths.plan_file);
        Ok(DeploymentPlan {
            deployment: Deployment::new().with_parameters(parameters),
            details: DeploymentDetails::Terraform(paths.to_details()),
        })
    }

    /// The plan's Terraform details, if they belong to this environment.
    fn plan_details<'a>(
        &self,
        plan: &'a DeploymentPlan,
        paths: &ArtifactPaths,
    ) -> ProvisionResult<&'a TerraformDeploymentDetails> {
        let details = plan.details.as_terraform().ok_or_else(|| {
            ProvisionError::InvalidPlan(format!(
                "expected terraform deployment details, got {}",
                plan.details.provider_name()
            ))
        })?;
        if !paths.matches(details) {
            return Err(ProvisionError::InvalidPlan(format!(
                "plan artifacts in {:?} do not belong to {:?}",
                details.plan_file_path.parent().unwrap_or(Path::new("")),
                paths.env_dir
            )));
        }
        Ok(details)
    }

    async fn run_deploy(
        self,
        ctx: TaskContext,
        plan: DeploymentPlan,
        scope: Scope,
    ) -> ProvisionResult<DeployResult> {
        self.ensure_terraform()?;
        let env = self.snapshot();
        let paths = ArtifactPaths::for_environment(&self.project_path, &env, &self.options.module)?;
        let details = self.plan_details(&plan, &paths)?;
        let cli = self.cli(&env, Some(&scope));
        let cancel = ctx.cancellation().clone();

        info!(
            "Deploying terraform module {:?} as '{}'",
            self.module_path,
            scope.deployment_name()
        );

        ctx.check_cancelled()?;
        ctx.report(Phase::Validate, "Validate terraform template");
        let validated = cli.validate(&cancel).await?;
        ctx.report(
            Phase::ValidateResult,
            format!("terraform validate result : {}", validated.trim()),
        );

        ctx.check_cancelled()?;
        ctx.report(Phase::Apply, "Deploy terraform template");
        let remote = uses_remote_backend(&self.module_path)?;
        let state = (!remote).then_some(details.local_state_file_path.as_path());
        let auto_approve = self.config.auto_approve;
        if !auto_approve {
            ctx.set_interactive(true);
        }
        let applied = cli
            .apply(&cancel, &details.parameter_file_path, state, auto_approve)
            .await;
        if !auto_approve {
            ctx.set_interactive(false);
        }
        applied?;

        ctx.check_cancelled()?;
        ctx.report(Phase::Outputs, "Retrieving terraform outputs");
        let outputs = OutputParser::parse(&cli.output(&cancel, state).await?)?;

        let parameters = if details.parameter_file_path.exists() {
            read_parameter_file(&details.parameter_file_path)?
        } else {
            warn!(
                "Parameter file {:?} is gone, reporting planned parameters",
                details.parameter_file_path
            );
            plan.deployment.parameters.clone()
        };

        info!("Deployment complete with {} outputs", outputs.len());
        Ok(DeployResult {
            deployment: Deployment::new()
                .with_parameters(parameters)
                .with_outputs(outputs),
        })
    }

    async fn run_destroy(
        self,
        ctx: TaskContext,
        deployment: Deployment,
        options: DestroyOptions,
    ) -> ProvisionResult<DestroyResult> {
        self.ensure_terraform()?;
        let env = self.snapshot();
        let paths = ArtifactPaths::for_environment(&self.project_path, &env, &self.options.module)?;
        let cli = self.cli(&env, None);
        let cancel = ctx.cancellation().clone();

        info!(
            "Destroying terraform module {:?} ({} known outputs, force_delete={}, force_purge={})",
            self.module_path,
            deployment.outputs.len(),
            options.force_delete,
            options.force_purge
        );

        ctx.check_cancelled()?;
        ctx.report(Phase::Initialize, "Initialize terraform");
        cli.init(&cancel).await?;

        ctx.check_cancelled()?;
        ctx.report(Phase::Destroy, "Destroy terraform resources");
        let remote = uses_remote_backend(&self.module_path)?;
        let state = paths.state_arg(remote);
        let var_file = paths
            .parameter_file
            .exists()
            .then_some(paths.parameter_file.as_path());
        let prompts = !options.force_delete;
        if prompts {
            ctx.set_interactive(true);
        }
        let destroyed = cli.destroy(&cancel, var_file, state, options).await;
        if prompts {
            ctx.set_interactive(false);
        }
        destroyed?;

        ctx.check_cancelled()?;
        ctx.report(Phase::Outputs, "Retrieving terraform outputs");
        let outputs = OutputParser::parse(&cli.output(&cancel, state).await?)?;

        info!("Destroy complete");
        Ok(DestroyResult { outputs })
    }

    async fn run_get_deployment(
        self,
        ctx: TaskContext,
        scope: Scope,
    ) -> ProvisionResult<GetDeploymentResult> {
        self.ensure_terraform()?;
        let env = self.snapshot();
        let paths = ArtifactPaths::for_environment(&self.project_path, &env, &self.options.module)?;
        let cli = self.cli(&env, Some(&scope));
        let cancel = ctx.cancellation().clone();

        ctx.check_cancelled()?;
        ctx.report(Phase::Outputs, "Retrieving terraform outputs");
        let remote = uses_remote_backend(&self.module_path)?;
        let outputs = OutputParser::parse(&cli.output(&cancel, paths.state_arg(remote)).await?)?;

        let parameters = if paths.parameter_file.exists() {
            read_parameter_file(&paths.parameter_file)?
        } else {
            HashMap::new()
        };

        Ok(GetDeploymentResult {
            deployment: Deployment::new()
                .with_parameters(parameters)
                .with_outputs(outputs),
        })
    }
}

impl Provider for TerraformProvider {
    fn name(&self) -> &str {
        "terraform"
    }

    fn plan(&self, cancel: CancellationToken) -> ProvisioningTask<DeploymentPlan> {
        let provider = self.clone();
        ProvisioningTask::spawn(cancel, move |ctx| provider.run_plan(ctx))
    }

    fn deploy(
        &self,
        cancel: CancellationToken,
        plan: &DeploymentPlan,
        scope: &Scope,
    ) -> ProvisioningTask<DeployResult> {
        let provider = self.clone();
        let plan = plan.clone();
        let scope = scope.clone();
        ProvisioningTask::spawn(cancel, move |ctx| provider.run_deploy(ctx, plan, scope))
    }

    fn destroy(
        &self,
        cancel: CancellationToken,
        deployment: &Deployment,
        options: DestroyOptions,
    ) -> ProvisioningTask<DestroyResult> {
        let provider = self.clone();
        let deployment = deployment.clone();
        ProvisioningTask::spawn(cancel, move |ctx| {
            provider.run_destroy(ctx, deployment, options)
        })
    }

    fn get_deployment(
        &self,
        cancel: CancellationToken,
        scope: &Scope,
    ) -> ProvisioningTask<GetDeploymentResult> {
        let provider = self.clone();
        let scope = scope.clone();
        ProvisioningTask::spawn(cancel, move |ctx| provider.run_get_deployment(ctx, scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prov_core::BicepDeploymentDetails;
    use prov_runner::MockCommandRunner;

    fn provider(project: &Path) -> TerraformProvider {
        TerraformProvider::new(
            Environment::named("dev").into_shared(),
            project,
            Options::terraform(),
            Arc::new(MockCommandRunner::new()),
        )
    }

    #[test]
    fn test_module_path_resolution() {
        let provider = provider(Path::new("/work/app"));
        assert_eq!(provider.module_path(), Path::new("/work/app/infra"));
        assert_eq!(provider.name(), "terraform");
        assert_eq!(
            provider.artifact_paths().unwrap().env_dir,
            PathBuf::from("/work/app/.azure/dev")
        );
    }

    #[test]
    fn test_plan_details_rejects_foreign_plans() {
        let provider = provider(Path::new("/work/app"));
        let paths = provider.artifact_paths().unwrap();

        let bicep = DeploymentPlan {
            deployment: Deployment::new(),
            details: DeploymentDetails::Bicep(BicepDeploymentDetails {
                template_file_path: PathBuf::from("infra/main.bicep"),
                parameter_file_path: PathBuf::from("infra/main.parameters.json"),
            }),
        };
        assert!(matches!(
            provider.plan_details(&bicep, &paths),
            Err(ProvisionError::InvalidPlan(_))
        ));

        let other_env = ArtifactPaths::new(Path::new("/work/app"), "prod", "main");
        let foreign = DeploymentPlan {
            deployment: Deployment::new(),
            details: DeploymentDetails::Terraform(other_env.to_details()),
        };
        assert!(matches!(
            provider.plan_details(&foreign, &paths),
            Err(ProvisionError::InvalidPlan(_))
        ));

        let own = DeploymentPlan {
            deployment: Deployment::new(),
            details: DeploymentDetails::Terraform(paths.to_details()),
        };
        assert!(provider.plan_details(&own, &paths).is_ok());
    }
}
