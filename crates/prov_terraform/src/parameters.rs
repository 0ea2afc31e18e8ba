//! Terraform variable file generation.
//!
//! The module ships a template `<module>.tfvars.json` whose string values may
//! reference environment values as `${KEY}`. Rendering substitutes every
//! reference and writes the result into the environment's directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info};

use prov_core::{DeploymentValue, Environment, ProvisionError, ProvisionResult};

const REFERENCE_PATTERN: &str = r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}";

/// Renders a module's parameter template against an environment.
#[derive(Debug, Clone)]
pub struct ParameterFileWriter {
    module_path: PathBuf,
    module: String,
}

impl ParameterFileWriter {
    pub fn new(module_path: impl Into<PathBuf>, module: impl Into<String>) -> Self {
        Self {
            module_path: module_path.into(),
            module: module.into(),
        }
    }

    /// Location of the parameter template inside the module.
    pub fn template_path(&self) -> PathBuf {
        self.module_path.join(format!("{}.tfvars.json", self.module))
    }

    /// Render the template. A missing template yields no parameters.
    pub fn render(&self, env: &Environment) -> ProvisionResult<Map<String, Value>> {
        let template_path = self.template_path();
        if !template_path.exists() {
            debug!("No parameter template at {:?}", template_path);
            return Ok(Map::new());
        }

        let content = std::fs::read_to_string(&template_path).map_err(write_failed)?;
        let template: Value = serde_json::from_str(&content).map_err(|e| {
            ProvisionError::ParameterWriteFailed(format!(
                "invalid parameter template {:?}: {}",
                template_path, e
            ))
        })?;

        let Value::Object(fields) = template else {
            return Err(ProvisionError::ParameterWriteFailed(format!(
                "parameter template {:?} is not a JSON object",
                template_path
            )));
        };

        let pattern = reference_pattern()?;
        fields
            .into_iter()
            .map(|(name, value)| Ok((name, substitute_value(&pattern, value, env)?)))
            .collect()
    }

    /// Render the template into `output` and return the resulting parameters.
    pub fn write(
        &self,
        env: &Environment,
        output: &Path,
    ) -> ProvisionResult<HashMap<String, DeploymentValue>> {
        let rendered = self.render(env)?;

        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent).map_err(write_failed)?;
        }
        let content = serde_json::to_string_pretty(&rendered)
            .map_err(|e| ProvisionError::ParameterWriteFailed(e.to_string()))?;
        std::fs::write(output, content).map_err(write_failed)?;

        info!("Wrote {} parameters to {:?}", rendered.len(), output);
        Ok(into_parameters(rendered))
    }
}

/// Read a previously written parameter file.
pub fn read_parameter_file(path: &Path) -> ProvisionResult<HashMap<String, DeploymentValue>> {
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content).map_err(|e| {
        ProvisionError::ParameterWriteFailed(format!("invalid parameter file {:?}: {}", path, e))
    })?;
    match value {
        Value::Object(fields) => Ok(into_parameters(fields)),
        _ => Err(ProvisionError::ParameterWriteFailed(format!(
            "parameter file {:?} is not a JSON object",
            path
        ))),
    }
}

/// Replace every `${KEY}` in `input` with the environment's value.
pub fn substitute(input: &str, env: &Environment) -> ProvisionResult<String> {
    substitute_str(&reference_pattern()?, input, env)
}

/// Terraform type name for a JSON value.
pub fn value_type(value: &Value) -> &'static str {
    match value {
        Value::String(_) => "string",
        Value::Number(_) => "number",
        Value::Bool(_) => "bool",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
        Value::Null => "null",
    }
}

fn write_failed(err: std::io::Error) -> ProvisionError {
    ProvisionError::ParameterWriteFailed(err.to_string())
}

fn reference_pattern() -> ProvisionResult<Regex> {
    Regex::new(REFERENCE_PATTERN)
        .map_err(|e| ProvisionError::Config(format!("invalid reference pattern: {}", e)))
}

fn substitute_str(pattern: &Regex, input: &str, env: &Environment) -> ProvisionResult<String> {
    let mut output = String::with_capacity(input.len());
    let mut last = 0;
    for captures in pattern.captures_iter(input) {
        let (Some(whole), Some(key)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let value = env
            .get(key.as_str())
            .ok_or_else(|| ProvisionError::MissingEnvironmentValue(key.as_str().to_string()))?;
        output.push_str(&input[last..whole.start()]);
        output.push_str(value);
        last = whole.end();
    }
    output.push_str(&input[last..]);
    Ok(output)
}

fn substitute_value(pattern: &Regex, value: Value, env: &Environment) -> ProvisionResult<Value> {
    Ok(match value {
        Value::String(s) => Value::String(substitute_str(pattern, &s, env)?),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| substitute_value(pattern, item, env))
                .collect::<ProvisionResult<_>>()?,
        ),
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(k, v)| Ok((k, substitute_value(pattern, v, env)?)))
                .collect::<ProvisionResult<_>>()?,
        ),
        other => other,
    })
}

fn into_parameters(fields: Map<String, Value>) -> HashMap<String, DeploymentValue> {
    fields
        .into_iter()
        .map(|(name, value)| {
            let kind = value_type(&value);
            (name, DeploymentValue::new(value, kind))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn test_env() -> Environment {
        let mut env = Environment::named("test-env");
        env.set_location("westus2");
        env
    }

    #[test]
    fn test_substitute() {
        let env = test_env();
        assert_eq!(
            substitute("rg-${AZURE_ENV_NAME}-${AZURE_LOCATION}", &env).unwrap(),
            "rg-test-env-westus2"
        );
        assert_eq!(substitute("plain", &env).unwrap(), "plain");
        assert_eq!(substitute("$AZURE_LOCATION", &env).unwrap(), "$AZURE_LOCATION");
    }

    #[test]
    fn test_substitute_missing_key() {
        let err = substitute("${NOT_SET}", &test_env()).unwrap_err();
        assert!(matches!(err, ProvisionError::MissingEnvironmentValue(key) if key == "NOT_SET"));
    }

    #[test]
    fn test_write_renders_template() {
        let dir = tempdir().unwrap();
        let module_path = dir.path().join("infra");
        std::fs::create_dir_all(&module_path).unwrap();
        std::fs::write(
            module_path.join("main.tfvars.json"),
            r#"{
                "location": "${AZURE_LOCATION}",
                "name": "${AZURE_ENV_NAME}",
                "tags": {"env": "${AZURE_ENV_NAME}"},
                "replicas": 2
            }"#,
        )
        .unwrap();

        let output = dir.path().join(".azure/test-env/main.tfvars.json");
        let writer = ParameterFileWriter::new(&module_path, "main");
        let parameters = writer.write(&test_env(), &output).unwrap();

        assert_eq!(parameters["location"].as_str(), Some("westus2"));
        assert_eq!(parameters["name"].as_str(), Some("test-env"));
        assert_eq!(parameters["tags"].value, json!({"env": "test-env"}));
        assert_eq!(parameters["tags"].kind, "map");
        assert_eq!(parameters["replicas"].kind, "number");

        let written = read_parameter_file(&output).unwrap();
        assert_eq!(written, parameters);
    }

    #[test]
    fn test_missing_template_yields_empty_parameters() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out/main.tfvars.json");
        let writer = ParameterFileWriter::new(dir.path(), "main");

        let parameters = writer.write(&test_env(), &output).unwrap();
        assert!(parameters.is_empty());
        assert_eq!(std::fs::read_to_string(&output).unwrap().trim(), "{}");
    }

    #[test]
    fn test_non_object_template_is_rejected() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("main.tfvars.json"), "[1, 2]").unwrap();
        let writer = ParameterFileWriter::new(dir.path(), "main");

        let err = writer.render(&test_env()).unwrap_err();
        assert!(matches!(err, ProvisionError::ParameterWriteFailed(_)));
    }

    #[test]
    fn test_value_type() {
        assert_eq!(value_type(&json!("a")), "string");
        assert_eq!(value_type(&json!(true)), "bool");
        assert_eq!(value_type(&json!([1])), "list");
        assert_eq!(value_type(&Value::Null), "null");
    }
}
