//! # prov_terraform
//!
//! Terraform provisioning provider.
//!
//! [`TerraformProvider`] drives the `terraform` CLI through plan, deploy,
//! destroy and output queries, publishing progress through a
//! [`prov_core::ProvisioningTask`]. Every subprocess goes through a
//! [`prov_runner::CommandRunner`], so the whole lifecycle can be exercised
//! against [`prov_runner::MockCommandRunner`].
//!
//! Artifacts are written under `<project>/.azure/<env>/`:
//!
//! - `<module>.tfvars.json`: rendered variable file
//! - `<module>.tfplan`: plan artifact
//! - `terraform.tfstate`: local state, unless the module declares a backend
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use prov_core::{Environment, Options, Provider, CancellationToken};
//! use prov_runner::ProcessRunner;
//! use prov_terraform::TerraformProvider;
//!
//! let env = Environment::named("dev").into_shared();
//! let provider = TerraformProvider::new(env, ".", Options::terraform(), Arc::new(ProcessRunner::default()));
//! let plan = provider.plan(CancellationToken::new()).wait().await?;
//! ```

pub mod cli;
pub mod config;
pub mod layout;
pub mod outputs;
pub mod parameters;
pub mod provider;

pub use cli::{ensure_minimum_version, parse_version, TerraformCli, ToolOutput, VersionInfo};
pub use config::{TerraformProviderConfig, MINIMUM_TERRAFORM_VERSION};
pub use layout::{uses_remote_backend, ArtifactPaths};
pub use outputs::OutputParser;
pub use parameters::{read_parameter_file, substitute, ParameterFileWriter};
pub use provider::TerraformProvider;
