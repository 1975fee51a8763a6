//! Core data model shared by the gate, consensus engine and exporter.

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

lazy_static! {
    /// Language codes such as `de`, `en`, `gsw` or `en-US`.
    static ref LANGUAGE_PATTERN: Regex = Regex::new(r"^[A-Za-z]{2,3}(-[A-Za-z]{2,4})?$").unwrap();

    /// Host part of an absolute URL.
    static ref URL_HOST_PATTERN: Regex =
        Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://(?:[^@/?#]*@)?([^/:?#]+)").unwrap();
}

/// Errors for malformed claim requests.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClaimError {
    #[error("Claim text must not be empty")]
    EmptyText,

    #[error("Invalid language code: {0}")]
    InvalidLanguage(String),
}

/// Verdict a provider (or the consensus) reaches about a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    True,
    False,
    Disputed,
    Pending,
}

impl Verdict {
    /// Fixed iteration order. Consensus tie-breaking walks verdicts in
    /// exactly this order and keeps the first maximum it sees.
    pub const ORDER: [Verdict; 4] = [
        Verdict::True,
        Verdict::False,
        Verdict::Disputed,
        Verdict::Pending,
    ];

    /// Position of this verdict in [`Verdict::ORDER`].
    pub const fn index(self) -> usize {
        match self {
            Verdict::True => 0,
            Verdict::False => 1,
            Verdict::Disputed => 2,
            Verdict::Pending => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::True => "true",
            Verdict::False => "false",
            Verdict::Disputed => "disputed",
            Verdict::Pending => "pending",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Verdict::True),
            "false" => Ok(Verdict::False),
            "disputed" => Ok(Verdict::Disputed),
            "pending" => Ok(Verdict::Pending),
            other => Err(format!("unknown verdict '{}'", other)),
        }
    }
}

/// A source cited by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    pub domain: String,
}

impl Source {
    /// Create a source, deriving the domain from the URL host.
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let domain = domain_of(&url).unwrap_or_default();
        Self { url, domain }
    }

    pub fn new(url: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            domain: normalize_domain(&domain.into()),
        }
    }
}

/// Extract the normalized host of an absolute URL.
pub fn domain_of(url: &str) -> Option<String> {
    URL_HOST_PATTERN
        .captures(url.trim())
        .and_then(|c| c.get(1))
        .map(|m| normalize_domain(m.as_str()))
        .filter(|d| !d.is_empty())
}

/// Lower-case a domain and strip a leading `www.`.
pub fn normalize_domain(domain: &str) -> String {
    let lower = domain.trim().to_ascii_lowercase();
    lower
        .strip_prefix("www.")
        .map(str::to_string)
        .unwrap_or(lower)
}

/// One provider's opinion on a claim, after adapter-boundary normalization.
///
/// `confidence` is always in [0,1] and `verdict` is always one of the four
/// values; the consensus engine relies on this and does not re-validate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOutcome {
    pub provider: String,
    pub verdict: Verdict,
    pub confidence: f64,
    #[serde(default)]
    pub sources: Vec<Source>,
    /// Opaque provider payload, passed through to the record untouched.
    #[serde(default)]
    pub raw: serde_json::Value,
    pub cost_tokens: u64,
}

impl ProviderOutcome {
    pub fn new(provider: impl Into<String>, verdict: Verdict, confidence: f64) -> Self {
        Self {
            provider: provider.into(),
            verdict,
            confidence,
            sources: Vec::new(),
            raw: serde_json::Value::Null,
            cost_tokens: 0,
        }
    }

    pub fn with_sources(mut self, sources: Vec<Source>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_cost(mut self, cost_tokens: u64) -> Self {
        self.cost_tokens = cost_tokens;
        self
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = raw;
        self
    }
}

/// Per-claim policy overrides supplied by the ingestion collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyOverrides {
    /// Token ceiling; negative means unlimited.
    #[serde(default)]
    pub max_tokens: Option<i64>,
    #[serde(default)]
    pub max_claims: Option<u32>,
    #[serde(default)]
    pub max_fallbacks: Option<u32>,
    #[serde(default)]
    pub worker_concurrency: Option<u32>,
}

impl PolicyOverrides {
    pub fn is_empty(&self) -> bool {
        self.max_tokens.is_none()
            && self.max_claims.is_none()
            && self.max_fallbacks.is_none()
            && self.worker_concurrency.is_none()
    }
}

/// A claim submitted for evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    /// Caller-assigned identity; a UUID is assigned when absent.
    #[serde(default)]
    pub claim_id: Option<String>,
    pub claim_text: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub policy_overrides: Option<PolicyOverrides>,
}

impl ClaimRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            claim_id: None,
            claim_text: text.into(),
            language: None,
            topic: None,
            policy_overrides: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.claim_id = Some(id.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_overrides(mut self, overrides: PolicyOverrides) -> Self {
        self.policy_overrides = Some(overrides);
        self
    }

    /// Check the request before any provider is paid to look at it.
    pub fn validate(&self) -> Result<(), ClaimError> {
        if self.claim_text.trim().is_empty() {
            return Err(ClaimError::EmptyText);
        }
        if let Some(lang) = &self.language {
            if !LANGUAGE_PATTERN.is_match(lang) {
                return Err(ClaimError::InvalidLanguage(lang.clone()));
            }
        }
        Ok(())
    }

    /// The claim id, or a fresh UUID v4 when the caller supplied none.
    pub fn resolve_id(&self) -> String {
        self.claim_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_order_matches_index() {
        for (i, v) in Verdict::ORDER.iter().enumerate() {
            assert_eq!(v.index(), i);
        }
    }

    #[test]
    fn test_verdict_parse() {
        assert_eq!("TRUE".parse::<Verdict>(), Ok(Verdict::True));
        assert_eq!(" disputed ".parse::<Verdict>(), Ok(Verdict::Disputed));
        assert!("maybe".parse::<Verdict>().is_err());
    }

    #[test]
    fn test_verdict_serializes_lowercase() {
        let json = serde_json::to_string(&Verdict::Disputed).unwrap();
        assert_eq!(json, "\"disputed\"");
    }

    #[test]
    fn test_domain_derivation() {
        assert_eq!(
            domain_of("https://www.Destatis.de/DE/Themen/index.html"),
            Some("destatis.de".to_string())
        );
        assert_eq!(
            domain_of("http://user@example.org:8080/x?y"),
            Some("example.org".to_string())
        );
        assert_eq!(domain_of("not a url"), None);

        let source = Source::from_url("https://www.who.int/news");
        assert_eq!(source.domain, "who.int");
    }

    #[test]
    fn test_claim_validation() {
        assert_eq!(ClaimRequest::new("   ").validate(), Err(ClaimError::EmptyText));
        assert!(ClaimRequest::new("Die Erde ist rund").with_language("de").validate().is_ok());
        assert!(ClaimRequest::new("x").with_language("en-US").validate().is_ok());
        assert!(matches!(
            ClaimRequest::new("x").with_language("english!").validate(),
            Err(ClaimError::InvalidLanguage(_))
        ));
    }

    #[test]
    fn test_claim_id_resolution() {
        assert_eq!(ClaimRequest::new("x").with_id("c-1").resolve_id(), "c-1");
        let generated = ClaimRequest::new("x").resolve_id();
        assert_eq!(generated.len(), 36);
    }

    #[test]
    fn test_claim_request_wire_shape() {
        let json = r#"{
            "claimText": "Laut offizieller Studie sinkt die Arbeitslosigkeit",
            "language": "de",
            "policyOverrides": { "maxTokens": -1, "maxFallbacks": 2 }
        }"#;
        let req: ClaimRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.language.as_deref(), Some("de"));
        let overrides = req.policy_overrides.unwrap();
        assert_eq!(overrides.max_tokens, Some(-1));
        assert_eq!(overrides.max_fallbacks, Some(2));
        assert!(overrides.max_claims.is_none());
    }
}
