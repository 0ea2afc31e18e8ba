//! Parsing of `terraform output -json`.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use prov_core::{DeploymentValue, ProvisionError, ProvisionResult};

#[derive(Debug, Deserialize)]
struct RawOutput {
    sensitive: bool,
    #[serde(rename = "type")]
    kind: Value,
    value: Value,
}

/// Translates Terraform's output document into deployment values.
pub struct OutputParser;

impl OutputParser {
    /// Parse a document of the form `{ name: { sensitive, type, value } }`.
    ///
    /// Complex types (Terraform reports them as JSON arrays such as
    /// `["list", "string"]`) are kept as their compact JSON text.
    pub fn parse(document: &Value) -> ProvisionResult<HashMap<String, DeploymentValue>> {
        let Value::Object(entries) = document else {
            return Err(ProvisionError::OutputParseFailed(format!(
                "expected a JSON object, got: {}",
                document
            )));
        };

        let mut outputs = HashMap::with_capacity(entries.len());
        for (name, entry) in entries {
            let raw: RawOutput = serde_json::from_value(entry.clone()).map_err(|e| {
                ProvisionError::OutputParseFailed(format!("output '{}': {}", name, e))
            })?;
            let kind = match raw.kind {
                Value::String(kind) => kind,
                other => other.to_string(),
            };
            outputs.insert(
                name.clone(),
                DeploymentValue::new(raw.value, kind).sensitive(raw.sensitive),
            );
        }
        Ok(outputs)
    }

    pub fn parse_str(document: &str) -> ProvisionResult<HashMap<String, DeploymentValue>> {
        let value: Value = serde_json::from_str(document)
            .map_err(|e| ProvisionError::OutputParseFailed(e.to_string()))?;
        Self::parse(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = r#"{
        "AZURE_LOCATION": {"sensitive": false, "type": "string", "value": "westus2"},
        "RG_NAME": {"sensitive": false, "type": "string", "value": "rg-test-env"}
    }"#;

    #[test]
    fn test_parse_sample() {
        let outputs = OutputParser::parse_str(SAMPLE).unwrap();

        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs["AZURE_LOCATION"].as_str(), Some("westus2"));
        assert_eq!(outputs["RG_NAME"].as_str(), Some("rg-test-env"));
        assert_eq!(outputs["RG_NAME"].kind, "string");
    }

    #[test]
    fn test_complex_type_and_sensitive() {
        let outputs = OutputParser::parse(&json!({
            "ZONES": {"sensitive": false, "type": ["list", "string"], "value": ["1", "2"]},
            "ADMIN_PASSWORD": {"sensitive": true, "type": "string", "value": "hunter2"}
        }))
        .unwrap();

        assert_eq!(outputs["ZONES"].kind, r#"["list","string"]"#);
        assert_eq!(outputs["ZONES"].value, json!(["1", "2"]));
        assert!(outputs["ADMIN_PASSWORD"].sensitive);
        assert_eq!(outputs["ADMIN_PASSWORD"].display_value(), "*****");
    }

    #[test]
    fn test_empty_document() {
        assert!(OutputParser::parse_str("{}").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_documents_are_rejected() {
        for document in [
            "not json",
            "[]",
            r#"{"A": {"type": "string", "value": "x"}}"#,
            r#"{"A": "x"}"#,
        ] {
            let err = OutputParser::parse_str(document).unwrap_err();
            assert!(
                matches!(err, ProvisionError::OutputParseFailed(_)),
                "{} should fail to parse",
                document
            );
        }
    }
}
