//! API key handling for live providers.
//!
//! Keys are wrapped in [`SecretString`] the moment they are read and only
//! unwrapped when a request header is set. `Debug` and `Display` never show
//! the value.

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;

use super::ProviderError;

/// Where a credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// `api_key` in the provider's runtime config
    Config,
    /// The environment variable named by `api_key_env`
    Environment,
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A provider's API key.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    provider: String,
}

impl ApiCredential {
    pub fn new(
        value: impl Into<String>,
        source: CredentialSource,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            provider: provider.into(),
        }
    }

    /// Read `config_key` from the provider config, else the environment
    /// variable named in `env_key`.
    pub fn from_config_or_env(
        provider: &str,
        config: &JsonValue,
        config_key: &str,
        env_key: &str,
    ) -> Result<Self, ProviderError> {
        if let Some(value) = config[config_key].as_str() {
            return Ok(Self::new(value, CredentialSource::Config, provider));
        }

        let env_var = config[env_key].as_str();
        if let Some(value) = env_var.and_then(|var| std::env::var(var).ok()) {
            return Ok(Self::new(value, CredentialSource::Environment, provider));
        }

        Err(ProviderError::NotConfigured(format!(
            "{} API key required: set '{}' or name a variable in '{}'{}",
            provider,
            config_key,
            env_key,
            env_var.map(|v| format!(" ({} is unset)", v)).unwrap_or_default()
        )))
    }

    /// Whether [`ApiCredential::from_config_or_env`] would succeed.
    pub fn is_available(config: &JsonValue, config_key: &str, env_key: &str) -> bool {
        config[config_key].as_str().is_some()
            || config[env_key]
                .as_str()
                .map(|var| std::env::var(var).is_ok())
                .unwrap_or(false)
    }

    /// Unwrap the key. Call only where a header is set.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("provider", &self.provider)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} key from {} [REDACTED]", self.provider, self.source)
    }
}
