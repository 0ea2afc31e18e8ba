//! Provisioning provider trait.

use tokio_util::sync::CancellationToken;

use crate::deployment::{
    DeployResult, Deployment, DeploymentPlan, DestroyOptions, DestroyResult,
    GetDeploymentResult, Scope,
};
use crate::task::ProvisioningTask;

/// A provisioning backend.
///
/// Every operation returns immediately with a running [`ProvisioningTask`].
/// Callers must serialize operations that target the same environment; the
/// provider performs no locking of its own.
pub trait Provider: Send + Sync {
    /// Backend name (e.g., "terraform").
    fn name(&self) -> &str;

    /// Prepare a deployment plan without changing any resources.
    fn plan(&self, cancel: CancellationToken) -> ProvisioningTask<DeploymentPlan>;

    /// Apply a plan previously produced by [`Provider::plan`].
    fn deploy(
        &self,
        cancel: CancellationToken,
        plan: &DeploymentPlan,
        scope: &Scope,
    ) -> ProvisioningTask<DeployResult>;

    /// Tear down the resources of a deployment.
    fn destroy(
        &self,
        cancel: CancellationToken,
        deployment: &Deployment,
        options: DestroyOptions,
    ) -> ProvisioningTask<DestroyResult>;

    /// Read the current deployment outputs without changing anything.
    fn get_deployment(
        &self,
        cancel: CancellationToken,
        scope: &Scope,
    ) -> ProvisioningTask<GetDeploymentResult>;
}
