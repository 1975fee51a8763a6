//! Provider factories.
//!
//! A factory turns a provider id plus its runtime config into a
//! [`FactCheckProvider`]. The registry maps provider kinds ("mock", "http")
//! to factories and assembles a [`ProviderChain`] in policy order.
//!
//! ```ignore
//! let registry = ProviderRegistry::with_defaults();
//! let chain = registry.build_chain(Mode::Mock, &policy, &runtime.providers)?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use claimtrust_core::PolicyConfig;
use serde_json::Value as JsonValue;

use super::{FactCheckProvider, ProviderChain, ProviderError};
use crate::config::Mode;

/// Creates providers of one kind from configuration.
pub trait ProviderFactory: Send + Sync {
    /// Kind identifier, e.g. "mock" or "http".
    fn provider_type(&self) -> &'static str;

    /// Create the provider that will answer as `id`.
    fn create(
        &self,
        id: &str,
        config: &JsonValue,
    ) -> Result<Arc<dyn FactCheckProvider>, ProviderError>;

    /// Check a config without building anything.
    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError>;

    fn default_config(&self) -> JsonValue {
        serde_json::json!({})
    }

    fn description(&self) -> &'static str {
        "Fact-check provider"
    }
}

/// Registry of provider factories by kind.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in "mock" and "http" kinds.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(super::MockProviderFactory));
        registry.register(Arc::new(super::HttpProviderFactory));
        registry
    }

    /// Register a factory, replacing any previous one of the same kind.
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        self.factories
            .insert(factory.provider_type().to_string(), factory);
    }

    fn factory(&self, provider_type: &str) -> Result<&Arc<dyn ProviderFactory>, ProviderError> {
        self.factories.get(provider_type).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "Unknown provider type: '{}'. Available: {:?}",
                provider_type,
                self.available_types()
            ))
        })
    }

    pub fn create(
        &self,
        provider_type: &str,
        id: &str,
        config: &JsonValue,
    ) -> Result<Arc<dyn FactCheckProvider>, ProviderError> {
        self.factory(provider_type)?.create(id, config)
    }

    pub fn validate(&self, provider_type: &str, config: &JsonValue) -> Result<(), ProviderError> {
        self.factory(provider_type)?.validate_config(config)
    }

    pub fn available_types(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    pub fn has_provider(&self, provider_type: &str) -> bool {
        self.factories.contains_key(provider_type)
    }

    pub fn default_config(&self, provider_type: &str) -> Option<JsonValue> {
        self.factories
            .get(provider_type)
            .map(|f| f.default_config())
    }

    /// Build one provider per policy entry, in policy order.
    ///
    /// In mock mode every id gets a mock. In live mode each id's config
    /// picks its kind through `"type"` (default "http").
    pub fn build_chain(
        &self,
        mode: Mode,
        policy: &PolicyConfig,
        configs: &BTreeMap<String, JsonValue>,
    ) -> Result<ProviderChain, ProviderError> {
        let empty = serde_json::json!({});
        let mut providers = Vec::with_capacity(policy.providers.len());

        for id in policy.provider_ids() {
            let config = configs.get(id).unwrap_or(&empty);
            let kind = match mode {
                Mode::Mock => "mock",
                Mode::Live => config["type"].as_str().unwrap_or("http"),
            };
            self.validate(kind, config)?;
            providers.push(self.create(kind, id, config)?);
        }

        tracing::debug!(
            mode = %mode,
            providers = ?policy.provider_ids().collect::<Vec<_>>(),
            "Provider chain assembled"
        );
        Ok(ProviderChain::new(providers))
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.available_types())
            .finish()
    }
}
