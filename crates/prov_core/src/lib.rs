//! # prov_core
//!
//! Deployment model and task primitives for the provisioning orchestrator.
//!
//! # Architecture
//!
//! - **Environment**: Caller-owned key/value settings, shared with providers
//! - **Deployment**: Input parameters and outputs of one provisioning run
//! - **ProvisioningTask**: A spawned operation with progress and interactivity
//!   streams and a typed result
//! - **Provider**: Backend trait exposing plan, deploy, destroy and
//!   get-deployment
//!
//! # Example
//!
//! ```rust,ignore
//! use prov_core::{Provider, CancellationToken};
//!
//! let task = provider.plan(CancellationToken::new());
//! let mut progress = task.progress();
//! tokio::spawn(async move {
//!     while let Some(report) = progress.recv().await {
//!         println!("{}", report);
//!     }
//! });
//! let plan = task.wait().await?;
//! ```

pub mod deployment;
pub mod environment;
pub mod error;
pub mod options;
pub mod progress;
pub mod provider;
pub mod task;

// Re-export main types for convenience
pub use deployment::{
    BicepDeploymentDetails, DeployResult, Deployment, DeploymentDetails, DeploymentPlan,
    DeploymentValue, DestroyOptions, DestroyResult, GetDeploymentResult, Scope,
    TerraformDeploymentDetails,
};
pub use environment::{
    Environment, SharedEnvironment, ENV_NAME_KEY, LOCATION_KEY, SUBSCRIPTION_ID_KEY,
};
pub use error::{ProvisionError, ProvisionResult};
pub use options::{Options, ProviderKind};
pub use progress::{Phase, ProgressReport};
pub use provider::Provider;
pub use task::{ProvisioningTask, TaskContext, TaskStream};

pub use tokio_util::sync::CancellationToken;
