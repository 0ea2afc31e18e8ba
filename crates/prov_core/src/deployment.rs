//! Deployment model shared by all provisioning backends.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

const REDACTED: &str = "*****";

/// One input parameter or output value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentValue {
    pub value: Value,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub sensitive: bool,
}

impl DeploymentValue {
    pub fn new(value: Value, kind: impl Into<String>) -> Self {
        Self {
            value,
            kind: kind.into(),
            sensitive: false,
        }
    }

    /// A string value of type `string`.
    pub fn string(value: impl Into<String>) -> Self {
        Self::new(Value::String(value.into()), "string")
    }

    pub fn sensitive(mut self, sensitive: bool) -> Self {
        self.sensitive = sensitive;
        self
    }

    /// The value as a string slice, when it is a JSON string.
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_str()
    }

    /// Text safe to show to users or write to logs.
    pub fn display_value(&self) -> String {
        if self.sensitive {
            return REDACTED.to_string();
        }
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Input parameters and resulting outputs of one provisioning operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    #[serde(default)]
    pub parameters: HashMap<String, DeploymentValue>,
    #[serde(default)]
    pub outputs: HashMap<String, DeploymentValue>,
}

impl Deployment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameters(mut self, parameters: HashMap<String, DeploymentValue>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_outputs(mut self, outputs: HashMap<String, DeploymentValue>) -> Self {
        self.outputs = outputs;
        self
    }
}

fn write_values(
    f: &mut std::fmt::Formatter<'_>,
    title: &str,
    values: &HashMap<String, DeploymentValue>,
) -> std::fmt::Result {
    writeln!(f, "{}:", title)?;
    let mut names: Vec<&String> = values.keys().collect();
    names.sort();
    for name in names {
        writeln!(f, "  {} = {}", name, values[name].display_value())?;
    }
    Ok(())
}

impl std::fmt::Display for Deployment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_values(f, "parameters", &self.parameters)?;
        write_values(f, "outputs", &self.outputs)
    }
}

/// Artifacts produced by a Terraform plan, scoped to one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerraformDeploymentDetails {
    pub parameter_file_path: PathBuf,
    pub plan_file_path: PathBuf,
    pub local_state_file_path: PathBuf,
}

/// Artifacts for an ARM/Bicep deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BicepDeploymentDetails {
    pub template_file_path: PathBuf,
    pub parameter_file_path: PathBuf,
}

/// Backend-specific plan artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum DeploymentDetails {
    Terraform(TerraformDeploymentDetails),
    Bicep(BicepDeploymentDetails),
}

impl DeploymentDetails {
    pub fn provider_name(&self) -> &'static str {
        match self {
            DeploymentDetails::Terraform(_) => "terraform",
            DeploymentDetails::Bicep(_) => "bicep",
        }
    }

    pub fn as_terraform(&self) -> Option<&TerraformDeploymentDetails> {
        match self {
            DeploymentDetails::Terraform(details) => Some(details),
            _ => None,
        }
    }
}

/// Result of planning: the proposed deployment and the artifacts to apply it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    pub deployment: Deployment,
    pub details: DeploymentDetails,
}

/// Destroy behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestroyOptions {
    /// Skip the tool's confirmation prompt
    pub force_delete: bool,
    /// Permanently purge soft-deleted resources
    pub force_purge: bool,
}

impl DestroyOptions {
    pub fn new(force_delete: bool, force_purge: bool) -> Self {
        Self {
            force_delete,
            force_purge,
        }
    }
}

/// Target boundary for deploy, destroy and deployment queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scope {
    Subscription {
        subscription_id: String,
        location: String,
        deployment_name: String,
    },
    ResourceGroup {
        subscription_id: String,
        resource_group: String,
        deployment_name: String,
    },
}

impl Scope {
    pub fn subscription(
        location: impl Into<String>,
        subscription_id: impl Into<String>,
        deployment_name: impl Into<String>,
    ) -> Self {
        Scope::Subscription {
            subscription_id: subscription_id.into(),
            location: location.into(),
            deployment_name: deployment_name.into(),
        }
    }

    pub fn resource_group(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        deployment_name: impl Into<String>,
    ) -> Self {
        Scope::ResourceGroup {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            deployment_name: deployment_name.into(),
        }
    }

    pub fn subscription_id(&self) -> &str {
        match self {
            Scope::Subscription {
                subscription_id, ..
            }
            | Scope::ResourceGroup {
                subscription_id, ..
            } => subscription_id,
        }
    }

    pub fn deployment_name(&self) -> &str {
        match self {
            Scope::Subscription {
                deployment_name, ..
            }
            | Scope::ResourceGroup {
                deployment_name, ..
            } => deployment_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployResult {
    pub deployment: Deployment,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DestroyResult {
    pub outputs: HashMap<String, DeploymentValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetDeploymentResult {
    pub deployment: Deployment,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deployment_value_wire_shape() {
        let value: DeploymentValue = serde_json::from_value(json!({
            "sensitive": false,
            "type": "string",
            "value": "westus2"
        }))
        .unwrap();

        assert_eq!(value.as_str(), Some("westus2"));
        assert_eq!(value.kind, "string");
        assert!(!value.sensitive);
    }

    #[test]
    fn test_sensitive_value_is_redacted() {
        let secret = DeploymentValue::string("hunter2").sensitive(true);
        assert_eq!(secret.display_value(), "*****");

        let mut outputs = HashMap::new();
        outputs.insert("ADMIN_PASSWORD".to_string(), secret);
        outputs.insert("RG_NAME".to_string(), DeploymentValue::string("rg-dev"));
        let rendered = Deployment::new().with_outputs(outputs).to_string();

        assert!(rendered.contains("RG_NAME = rg-dev"));
        assert!(rendered.contains("ADMIN_PASSWORD = *****"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_non_string_display_value() {
        let count = DeploymentValue::new(json!(3), "number");
        assert_eq!(count.display_value(), "3");
    }

    #[test]
    fn test_details_variant_accessors() {
        let details = DeploymentDetails::Bicep(BicepDeploymentDetails {
            template_file_path: PathBuf::from("infra/main.bicep"),
            parameter_file_path: PathBuf::from("infra/main.parameters.json"),
        });
        assert_eq!(details.provider_name(), "bicep");
        assert!(details.as_terraform().is_none());
    }

    #[test]
    fn test_scope_accessors() {
        let scope = Scope::subscription("westus2", "sub-1", "test-env");
        assert_eq!(scope.subscription_id(), "sub-1");
        assert_eq!(scope.deployment_name(), "test-env");

        let scope = Scope::resource_group("sub-2", "rg-test", "deploy-1");
        assert_eq!(scope.subscription_id(), "sub-2");
        assert_eq!(scope.deployment_name(), "deploy-1");
    }
}
