//! Provider chain policy: the immutable configuration threaded through the
//! orchestrator and the gate.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::schema::validate_policy_schema;
use crate::types::PolicyOverrides;

/// Errors that can occur when loading or deriving a policy.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Failed to read policy file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Policy does not match schema: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),

    #[error("Policy validation failed: {0}")]
    ValidationError(String),
}

/// Token ceiling for one claim evaluation.
///
/// On the wire this is a signed integer where any negative value means
/// unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenLimit {
    Unlimited,
    Limited(u64),
}

impl TokenLimit {
    pub fn from_signed(value: i64) -> Self {
        if value < 0 {
            TokenLimit::Unlimited
        } else {
            TokenLimit::Limited(value as u64)
        }
    }

    pub fn to_signed(self) -> i64 {
        match self {
            TokenLimit::Unlimited => -1,
            TokenLimit::Limited(n) => n.min(i64::MAX as u64) as i64,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, TokenLimit::Unlimited)
    }

    /// Tokens still available after `used`, or `None` when unlimited.
    pub fn remaining(&self, used: u64) -> Option<u64> {
        match self {
            TokenLimit::Unlimited => None,
            TokenLimit::Limited(max) => Some(max.saturating_sub(used)),
        }
    }

    /// Share of the budget consumed; always 0 when unlimited.
    pub fn utilization(&self, used: u64) -> f64 {
        match self {
            TokenLimit::Unlimited => 0.0,
            TokenLimit::Limited(0) => {
                if used == 0 {
                    0.0
                } else {
                    f64::INFINITY
                }
            }
            TokenLimit::Limited(max) => used as f64 / *max as f64,
        }
    }
}

impl Default for TokenLimit {
    fn default() -> Self {
        TokenLimit::Unlimited
    }
}

impl Serialize for TokenLimit {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(self.to_signed())
    }
}

impl<'de> Deserialize<'de> for TokenLimit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = i64::deserialize(deserializer)?;
        Ok(TokenLimit::from_signed(value))
    }
}

/// Per-provider gate threshold and consensus weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderPolicy {
    /// Provider identifier (e.g., "claude")
    pub id: String,

    /// Confidence at which this provider's answer alone ends the chain
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Static weight in the consensus vote
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl ProviderPolicy {
    pub fn new(id: impl Into<String>, threshold: f64, weight: f64) -> Self {
        Self {
            id: id.into(),
            threshold,
            weight,
        }
    }
}

fn default_threshold() -> f64 {
    0.8
}

fn default_weight() -> f64 {
    1.0
}

fn default_max_claims() -> u32 {
    50
}

fn default_max_fallbacks() -> u32 {
    3
}

fn default_worker_concurrency() -> u32 {
    5
}

/// The provider chain policy.
///
/// Built once at startup and never mutated; per-claim overrides derive a
/// new value via [`PolicyConfig::with_overrides`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Providers in invocation order, cheapest first
    pub providers: Vec<ProviderPolicy>,

    /// Token ceiling per claim evaluation
    #[serde(default)]
    pub max_tokens_per_job: TokenLimit,

    /// Claims accepted per batch
    #[serde(default = "default_max_claims")]
    pub max_claims_per_job: u32,

    /// Providers consulted per claim at most
    #[serde(default = "default_max_fallbacks")]
    pub max_fallbacks: u32,

    /// Claims evaluated concurrently
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            providers: vec![
                ProviderPolicy::new("claude", 0.85, 1.0),
                ProviderPolicy::new("gpt", 0.80, 0.9),
                ProviderPolicy::new("gemini", 0.80, 0.85),
            ],
            max_tokens_per_job: TokenLimit::Unlimited,
            max_claims_per_job: default_max_claims(),
            max_fallbacks: default_max_fallbacks(),
            worker_concurrency: default_worker_concurrency(),
        }
    }
}

impl PolicyConfig {
    /// Parse a policy from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, PolicyError> {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        let json = serde_json::to_value(value)?;
        Self::from_value(json)
    }

    /// Parse a policy from JSON string.
    pub fn from_json(json: &str) -> Result<Self, PolicyError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse a policy file; `.json` files are read as JSON, anything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&contents),
            _ => Self::from_yaml(&contents),
        }
    }

    fn from_value(value: serde_json::Value) -> Result<Self, PolicyError> {
        validate_policy_schema(&value).map_err(PolicyError::SchemaViolation)?;
        let policy: PolicyConfig = serde_json::from_value(value)?;
        policy.validate()?;
        Ok(policy)
    }

    /// Validate the semantic constraints the schema cannot express.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.providers.is_empty() {
            return Err(PolicyError::ValidationError(
                "at least one provider is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.id.trim().is_empty() {
                return Err(PolicyError::ValidationError(
                    "provider id must not be empty".to_string(),
                ));
            }
            if !seen.insert(provider.id.as_str()) {
                return Err(PolicyError::ValidationError(format!(
                    "Duplicate provider id: {}",
                    provider.id
                )));
            }
            if !(0.0..=1.0).contains(&provider.threshold) {
                return Err(PolicyError::ValidationError(format!(
                    "threshold for {} must be within [0, 1], got {}",
                    provider.id, provider.threshold
                )));
            }
            if !provider.weight.is_finite() || provider.weight < 0.0 {
                return Err(PolicyError::ValidationError(format!(
                    "weight for {} must be a non-negative number, got {}",
                    provider.id, provider.weight
                )));
            }
        }

        for (name, value) in [
            ("max_claims_per_job", self.max_claims_per_job),
            ("max_fallbacks", self.max_fallbacks),
            ("worker_concurrency", self.worker_concurrency),
        ] {
            if value == 0 {
                return Err(PolicyError::ValidationError(format!(
                    "{} must be at least 1",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Derive a policy with per-claim overrides applied.
    pub fn with_overrides(&self, overrides: &PolicyOverrides) -> Result<Self, PolicyError> {
        let mut derived = self.clone();
        if let Some(max_tokens) = overrides.max_tokens {
            derived.max_tokens_per_job = TokenLimit::from_signed(max_tokens);
        }
        if let Some(max_claims) = overrides.max_claims {
            derived.max_claims_per_job = max_claims;
        }
        if let Some(max_fallbacks) = overrides.max_fallbacks {
            derived.max_fallbacks = max_fallbacks;
        }
        if let Some(concurrency) = overrides.worker_concurrency {
            derived.worker_concurrency = concurrency;
        }
        derived.validate()?;
        Ok(derived)
    }

    /// Provider ids in invocation order.
    pub fn provider_ids(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|p| p.id.as_str())
    }

    pub fn provider(&self, id: &str) -> Option<&ProviderPolicy> {
        self.providers.iter().find(|p| p.id == id)
    }

    /// Gate threshold for a provider. Unconfigured providers only stop the
    /// chain on a fully confident answer.
    pub fn threshold(&self, id: &str) -> f64 {
        self.provider(id).map(|p| p.threshold).unwrap_or(1.0)
    }

    /// Consensus weight for a provider; unconfigured providers count as 1.0.
    pub fn weight(&self, id: &str) -> f64 {
        self.provider(id).map(|p| p.weight).unwrap_or(1.0)
    }
}
