//! Fact-check provider port and adapter boundary.
//!
//! Every backend implements [`FactCheckProvider`] and returns a loosely typed
//! [`RawProviderResponse`]. [`normalize`] turns that into a clean
//! [`ProviderOutcome`]: verdicts are parsed, confidences clamped, missing cost
//! estimated and source domains derived. Nothing past this boundary
//! re-validates provider output.
//!
//! ## Security
//!
//! Live providers use the [`secrets`] module for credential handling.

use async_trait::async_trait;
use claimtrust_core::{types::domain_of, ProviderOutcome, Source, Verdict};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

mod factory;
mod http;
mod mock;
pub mod secrets;

pub use factory::{ProviderFactory, ProviderRegistry};
pub use http::{HttpFactCheckProvider, HttpProviderFactory};
pub use mock::{MockProfile, MockProvider, MockProviderFactory};
pub use secrets::{ApiCredential, CredentialSource};

/// Lower bound of the estimated cost of one call.
pub const MIN_ESTIMATED_TOKENS: u64 = 300;

/// Upper bound of the estimated cost of one call.
pub const MAX_ESTIMATED_TOKENS: u64 = 4000;

/// Errors from fact-check providers.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Malformed provider output: {0}")]
    Malformed(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::HttpError(_)
            | ProviderError::RateLimited { .. }
            | ProviderError::Timeout(_) => true,
            ProviderError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// A cited source as reported by a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSource {
    pub url: String,
    #[serde(default)]
    pub domain: Option<String>,
}

impl RawSource {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            domain: None,
        }
    }
}

/// What a backend hands back before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawProviderResponse {
    pub verdict: String,
    pub confidence: f64,
    #[serde(default)]
    pub sources: Vec<RawSource>,
    /// Opaque payload; never inspected.
    #[serde(default)]
    pub raw: serde_json::Value,
    #[serde(default)]
    pub cost_tokens: Option<u64>,
}

impl RawProviderResponse {
    pub fn new(verdict: impl Into<String>, confidence: f64) -> Self {
        Self {
            verdict: verdict.into(),
            confidence,
            sources: Vec::new(),
            raw: serde_json::Value::Null,
            cost_tokens: None,
        }
    }
}

/// Estimated token cost of evaluating `text` when a provider does not report
/// its own: `clamp(300, 4000, round(chars / 4 × 1.1))`.
pub fn estimate_cost_tokens(text: &str) -> u64 {
    let chars = text.chars().count() as f64;
    let estimate = (chars / 4.0 * 1.1).round() as u64;
    estimate.clamp(MIN_ESTIMATED_TOKENS, MAX_ESTIMATED_TOKENS)
}

/// Adapter boundary: turn a raw response into a clean outcome.
pub fn normalize(
    provider: &str,
    claim_text: &str,
    response: RawProviderResponse,
) -> Result<ProviderOutcome, ProviderError> {
    let verdict: Verdict = response
        .verdict
        .parse()
        .map_err(ProviderError::Malformed)?;

    if !response.confidence.is_finite() {
        return Err(ProviderError::Malformed(format!(
            "non-finite confidence {}",
            response.confidence
        )));
    }

    let confidence = if (0.0..=1.0).contains(&response.confidence) {
        response.confidence
    } else {
        tracing::warn!(
            provider,
            confidence = response.confidence,
            "Provider confidence outside [0, 1], clamping"
        );
        response.confidence.clamp(0.0, 1.0)
    };

    let sources = response
        .sources
        .into_iter()
        .filter(|s| !s.url.trim().is_empty())
        .map(|s| match s.domain {
            Some(domain) if !domain.trim().is_empty() => Source::new(s.url, domain),
            _ => {
                let domain = domain_of(&s.url).unwrap_or_default();
                Source { url: s.url, domain }
            }
        })
        .collect();

    let cost_tokens = response
        .cost_tokens
        .unwrap_or_else(|| estimate_cost_tokens(claim_text));

    Ok(ProviderOutcome {
        provider: provider.to_string(),
        verdict,
        confidence,
        sources,
        raw: response.raw,
        cost_tokens,
    })
}

/// Capability contract of a fact-check backend.
///
/// A provider with no opinion answers `disputed` with low confidence; errors
/// are reserved for infrastructure failure (transport, auth, garbage output).
#[async_trait]
pub trait FactCheckProvider: Send + Sync {
    /// Stable identifier, matching the policy's provider id.
    fn id(&self) -> &str;

    /// Evaluate a claim.
    async fn evaluate(
        &self,
        claim_text: &str,
        language: Option<&str>,
    ) -> Result<RawProviderResponse, ProviderError>;

    /// Expected cost of evaluating `claim_text`, used for budget pre-checks.
    fn estimate_cost(&self, claim_text: &str) -> u64 {
        estimate_cost_tokens(claim_text)
    }
}

/// Providers in invocation order.
///
/// The order is the policy's provider order (cheapest first) and is part of
/// the cost-control contract.
#[derive(Clone, Default)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn FactCheckProvider>>,
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn FactCheckProvider>>) -> Self {
        Self { providers }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn FactCheckProvider>> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.id()).collect()
    }
}

impl std::fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderChain")
            .field("providers", &self.ids())
            .finish()
    }
}
