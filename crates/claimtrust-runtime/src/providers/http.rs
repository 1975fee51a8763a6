//! Generic HTTP fact-check provider.
//!
//! Posts `{"claim": ..., "language": ...}` to a configured endpoint and
//! expects a [`RawProviderResponse`] JSON body back. Any vendor gateway that
//! speaks this shape can sit behind a provider id.
//!
//! ## Security
//!
//! The API key is held in an [`ApiCredential`] and only exposed when the
//! `Authorization` header is set.

use super::{
    factory::ProviderFactory,
    secrets::{ApiCredential, CredentialSource},
    FactCheckProvider, ProviderError, RawProviderResponse,
};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
#[cfg(feature = "live")]
use std::time::Duration;

#[cfg_attr(not(feature = "live"), allow(dead_code))]
#[derive(Debug, Serialize)]
struct FactCheckRequest<'a> {
    claim: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<&'a str>,
}

/// Provider backed by a JSON-over-HTTP endpoint.
pub struct HttpFactCheckProvider {
    id: String,
    endpoint: String,
    credential: Option<ApiCredential>,
    #[cfg(feature = "live")]
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpFactCheckProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFactCheckProvider")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("credential", &self.credential)
            .finish()
    }
}

impl HttpFactCheckProvider {
    pub fn new(id: impl Into<String>, endpoint: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            id: id.into(),
            endpoint: endpoint.into(),
            credential: None,
            #[cfg(feature = "live")]
            client: reqwest::Client::builder()
                .build()
                .map_err(|e| ProviderError::HttpError(e.to_string()))?,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.credential = Some(ApiCredential::new(
            api_key,
            CredentialSource::Programmatic,
            self.id.clone(),
        ));
        self
    }

    /// Build from a provider config:
    ///
    /// ```json
    /// {
    ///   "endpoint": "https://factcheck.example.org/v1/claude",
    ///   "api_key": "...",            // optional
    ///   "api_key_env": "CLAUDE_KEY"  // optional, used when api_key is absent
    /// }
    /// ```
    pub fn from_config(id: &str, config: &JsonValue) -> Result<Self, ProviderError> {
        let endpoint = config["endpoint"].as_str().ok_or_else(|| {
            ProviderError::NotConfigured(format!("{}: 'endpoint' is required", id))
        })?;

        let mut provider = Self::new(id, endpoint)?;
        if !config["api_key"].is_null() || !config["api_key_env"].is_null() {
            provider.credential = Some(ApiCredential::from_config_or_env(
                id,
                config,
                "api_key",
                "api_key_env",
            )?);
        }
        Ok(provider)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl FactCheckProvider for HttpFactCheckProvider {
    fn id(&self) -> &str {
        &self.id
    }

    #[cfg(feature = "live")]
    async fn evaluate(
        &self,
        claim_text: &str,
        language: Option<&str>,
    ) -> Result<RawProviderResponse, ProviderError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .json(&FactCheckRequest {
                claim: claim_text,
                language,
            });
        if let Some(credential) = &self.credential {
            request = request.bearer_auth(credential.expose());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::HttpError(e.to_string()))?;

        let status = response.status();
        if status == 401 || status == 403 {
            return Err(ProviderError::AuthError);
        }
        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<RawProviderResponse>()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    }

    #[cfg(not(feature = "live"))]
    async fn evaluate(
        &self,
        _claim_text: &str,
        _language: Option<&str>,
    ) -> Result<RawProviderResponse, ProviderError> {
        Err(ProviderError::NotConfigured(format!(
            "{}: HTTP providers require the 'live' feature",
            self.id
        )))
    }
}

/// Creates [`HttpFactCheckProvider`]s.
pub struct HttpProviderFactory;

impl ProviderFactory for HttpProviderFactory {
    fn provider_type(&self) -> &'static str {
        "http"
    }

    fn create(
        &self,
        id: &str,
        config: &JsonValue,
    ) -> Result<Arc<dyn FactCheckProvider>, ProviderError> {
        Ok(Arc::new(HttpFactCheckProvider::from_config(id, config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        let endpoint = config["endpoint"].as_str().ok_or_else(|| {
            ProviderError::NotConfigured("HTTP provider requires 'endpoint'".to_string())
        })?;
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(ProviderError::NotConfigured(
                "endpoint must start with http:// or https://".to_string(),
            ));
        }

        if config["api_key_env"].is_string()
            && !ApiCredential::is_available(config, "api_key", "api_key_env")
        {
            return Err(ProviderError::NotConfigured(format!(
                "API key variable {} is not set",
                config["api_key_env"]
            )));
        }
        Ok(())
    }

    fn default_config(&self) -> JsonValue {
        serde_json::json!({
            "endpoint": "http://localhost:8080/factcheck",
            "api_key_env": "CLAIMTRUST_API_KEY"
        })
    }

    fn description(&self) -> &'static str {
        "JSON-over-HTTP fact-check gateway"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let config = serde_json::json!({
            "endpoint": "https://factcheck.example.org/v1/gpt",
            "api_key": "sk-test"
        });
        let provider = HttpFactCheckProvider::from_config("gpt", &config).unwrap();
        assert_eq!(provider.id(), "gpt");
        assert_eq!(provider.endpoint(), "https://factcheck.example.org/v1/gpt");
        assert!(provider.credential.is_some());
    }

    #[test]
    fn test_key_is_optional() {
        let config = serde_json::json!({"endpoint": "http://localhost:9000"});
        let provider = HttpFactCheckProvider::from_config("gemini", &config).unwrap();
        assert!(provider.credential.is_none());
    }

    #[test]
    fn test_debug_redacts_key() {
        let provider = HttpFactCheckProvider::new("claude", "https://x.example")
            .unwrap()
            .with_api_key("sk-very-secret");
        let debug = format!("{:?}", provider);
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_factory_validation() {
        let factory = HttpProviderFactory;
        assert!(factory.validate_config(&serde_json::json!({})).is_err());
        assert!(factory
            .validate_config(&serde_json::json!({"endpoint": "ftp://x"}))
            .is_err());
        assert!(factory
            .validate_config(&serde_json::json!({
                "endpoint": "https://x.example",
                "api_key_env": "CLAIMTRUST_TEST_UNSET_0815"
            }))
            .is_err());
        assert!(factory
            .validate_config(&serde_json::json!({"endpoint": "https://x.example"}))
            .is_ok());
    }

    #[cfg(not(feature = "live"))]
    #[tokio::test]
    async fn test_offline_build_refuses_calls() {
        let provider = HttpFactCheckProvider::new("claude", "https://x.example").unwrap();
        let err = provider.evaluate("claim", None).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
        assert!(!err.is_transient());
    }
}
