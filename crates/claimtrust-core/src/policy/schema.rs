//! JSON Schema validation for policy documents.
//!
//! Policy files are checked against `schema/policy.schema.json` before they
//! are deserialized, so structural mistakes are reported with their path.

use std::sync::OnceLock;

use jsonschema::{Draft, Validator};
use serde_json::Value;

const POLICY_SCHEMA_JSON: &str = include_str!("../../schema/policy.schema.json");

/// The embedded policy schema, compiled on first use.
pub struct PolicySchema {
    validator: Validator,
}

impl PolicySchema {
    /// The process-wide compiled schema. A schema that fails to load is a
    /// build defect; the message is kept so every later check reports it.
    pub fn shared() -> Result<&'static PolicySchema, String> {
        static SHARED: OnceLock<Result<PolicySchema, String>> = OnceLock::new();
        SHARED
            .get_or_init(PolicySchema::compile)
            .as_ref()
            .map_err(Clone::clone)
    }

    fn compile() -> Result<Self, String> {
        let schema: Value = serde_json::from_str(POLICY_SCHEMA_JSON)
            .map_err(|e| format!("policy schema is not valid JSON: {}", e))?;
        let validator = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(&schema)
            .map_err(|e| format!("policy schema does not compile: {}", e))?;
        Ok(Self { validator })
    }

    /// Every violation in `document`, each as `"<message> at <path>"`.
    pub fn violations(&self, document: &Value) -> Vec<String> {
        self.validator
            .iter_errors(document)
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect()
    }
}

/// Validate a policy document against the embedded schema.
pub fn validate_policy_schema(document: &Value) -> Result<(), Vec<String>> {
    let violations = PolicySchema::shared()
        .map_err(|e| vec![e])?
        .violations(document);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_policy_passes() {
        let value = serde_json::json!({
            "providers": [{ "id": "claude" }]
        });
        assert!(validate_policy_schema(&value).is_ok());
    }

    #[test]
    fn test_full_policy_passes() {
        let value = serde_json::json!({
            "providers": [
                { "id": "claude", "threshold": 0.85, "weight": 1.0 },
                { "id": "gpt", "threshold": 0.8, "weight": 0.9 },
                { "id": "gemini", "threshold": 0.8, "weight": 0.85 }
            ],
            "max_tokens_per_job": -1,
            "max_claims_per_job": 50,
            "max_fallbacks": 3,
            "worker_concurrency": 5
        });
        assert!(validate_policy_schema(&value).is_ok());
    }

    #[test]
    fn test_empty_provider_list_fails() {
        let value = serde_json::json!({ "providers": [] });
        assert!(validate_policy_schema(&value).is_err());
    }

    #[test]
    fn test_threshold_out_of_range_fails() {
        let value = serde_json::json!({
            "providers": [{ "id": "claude", "threshold": 1.5 }]
        });
        let errors = validate_policy_schema(&value).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("/providers/0/threshold")));
    }

    #[test]
    fn test_unknown_field_fails() {
        let value = serde_json::json!({
            "providers": [{ "id": "claude" }],
            "max_tokens": 100
        });
        assert!(validate_policy_schema(&value).is_err());
    }

    #[test]
    fn test_shared_schema_compiles_once() {
        let first = PolicySchema::shared().unwrap();
        let second = PolicySchema::shared().unwrap();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn test_every_violation_reported() {
        let value = serde_json::json!({
            "providers": [{ "id": "claude", "threshold": 1.5, "weight": -1 }]
        });
        let violations = PolicySchema::shared().unwrap().violations(&value);
        assert!(violations.len() >= 2);
    }

    #[test]
    fn test_invalid_provider_id_fails() {
        let value = serde_json::json!({
            "providers": [{ "id": "Claude Opus" }]
        });
        assert!(validate_policy_schema(&value).is_err());
    }
}
