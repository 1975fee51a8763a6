//! Deterministic offline providers.
//!
//! In mock mode every configured provider id is backed by a keyword-driven
//! [`MockProvider`]: claims citing studies or official statistics come back
//! `true`, claims flagged as rumours come back `false`, everything else is a
//! low-confidence `disputed`. Tests use the scripted constructors to force
//! specific outcomes, failures and delays.

use async_trait::async_trait;
use claimtrust_core::Verdict;
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{
    factory::ProviderFactory, FactCheckProvider, ProviderError, RawProviderResponse, RawSource,
};

/// Markers of claims backed by studies or official figures.
const EVIDENCE_MARKERS: &[&str] = &[
    "studie",
    "offiziell",
    "statistik",
    "study",
    "official",
    "statistics",
];

/// Markers of claims circulating as rumours.
const DUBIOUS_MARKERS: &[&str] = &[
    "angeblich",
    "gerücht",
    "verschwörung",
    "hoax",
    "rumor",
    "conspiracy",
];

/// Confidence levels a heuristic mock answers with.
#[derive(Debug, Clone, PartialEq)]
pub struct MockProfile {
    /// Confidence for claims with evidence markers (verdict `true`)
    pub evidence_confidence: f64,

    /// Confidence for claims with rumour markers (verdict `false`)
    pub dubious_confidence: f64,

    /// Confidence for anything else (verdict `disputed`)
    pub fallback_confidence: f64,

    /// Sources cited on a `true` or `false` answer
    pub sources: Vec<String>,
}

impl MockProfile {
    /// Built-in profile for a provider id.
    pub fn for_provider(id: &str) -> Self {
        let (evidence, dubious, fallback, sources): (f64, f64, f64, &[&str]) = match id {
            "claude" => (
                0.88,
                0.84,
                0.35,
                &["https://www.destatis.de/DE/Presse/Pressemitteilungen/", "https://correctiv.org/faktencheck/"],
            ),
            "gpt" => (
                0.82,
                0.80,
                0.40,
                &["https://www.reuters.com/fact-check/"],
            ),
            "gemini" => (
                0.80,
                0.78,
                0.40,
                &["https://www.tagesschau.de/faktenfinder/"],
            ),
            _ => (0.75, 0.75, 0.40, &[]),
        };

        Self {
            evidence_confidence: evidence,
            dubious_confidence: dubious,
            fallback_confidence: fallback,
            sources: sources.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
enum Script {
    Heuristic(MockProfile),
    Fixed(RawProviderResponse),
    Malformed,
    Unavailable,
}

/// Offline provider with deterministic answers.
#[derive(Debug)]
pub struct MockProvider {
    id: String,
    script: Script,
    delay: Option<Duration>,
    cost_tokens: Option<u64>,
    transient_failures: AtomicU32,
    calls: AtomicU32,
    in_flight: AtomicU32,
    peak_in_flight: AtomicU32,
}

impl MockProvider {
    fn with_script(id: impl Into<String>, script: Script) -> Self {
        Self {
            id: id.into(),
            script,
            delay: None,
            cost_tokens: None,
            transient_failures: AtomicU32::new(0),
            calls: AtomicU32::new(0),
            in_flight: AtomicU32::new(0),
            peak_in_flight: AtomicU32::new(0),
        }
    }

    /// Keyword-driven provider using the built-in profile for `id`.
    pub fn heuristic(id: impl Into<String>) -> Self {
        let id = id.into();
        let profile = MockProfile::for_provider(&id);
        Self::with_script(id, Script::Heuristic(profile))
    }

    pub fn with_profile(id: impl Into<String>, profile: MockProfile) -> Self {
        Self::with_script(id, Script::Heuristic(profile))
    }

    /// Always answers `verdict` with `confidence`.
    pub fn fixed(id: impl Into<String>, verdict: Verdict, confidence: f64) -> Self {
        Self::with_script(
            id,
            Script::Fixed(RawProviderResponse::new(verdict.as_str(), confidence)),
        )
    }

    /// Always answers with the given raw response.
    pub fn raw(id: impl Into<String>, response: RawProviderResponse) -> Self {
        Self::with_script(id, Script::Fixed(response))
    }

    /// Answers with a verdict string no adapter accepts.
    pub fn malformed(id: impl Into<String>) -> Self {
        Self::with_script(id, Script::Malformed)
    }

    /// Fails every call with a transport error.
    pub fn unavailable(id: impl Into<String>) -> Self {
        Self::with_script(id, Script::Unavailable)
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Report this cost instead of leaving it to the estimate.
    pub fn with_cost(mut self, cost_tokens: u64) -> Self {
        self.cost_tokens = Some(cost_tokens);
        self
    }

    /// Fail the first `n` calls with a transient transport error.
    pub fn failing_first(self, n: u32) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Number of `evaluate` calls so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent `evaluate` calls observed.
    pub fn peak_in_flight(&self) -> u32 {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn answer(&self, claim_text: &str) -> Result<RawProviderResponse, ProviderError> {
        let mut response = match &self.script {
            Script::Heuristic(profile) => heuristic_answer(&self.id, profile, claim_text),
            Script::Fixed(response) => response.clone(),
            Script::Malformed => RawProviderResponse::new("probably-true", 0.5),
            Script::Unavailable => {
                return Err(ProviderError::HttpError(format!(
                    "{} unreachable",
                    self.id
                )))
            }
        };
        if self.cost_tokens.is_some() {
            response.cost_tokens = self.cost_tokens;
        }
        Ok(response)
    }
}

fn heuristic_answer(id: &str, profile: &MockProfile, claim_text: &str) -> RawProviderResponse {
    let lower = claim_text.to_lowercase();
    let matched = |markers: &[&'static str]| -> Option<&'static str> {
        markers.iter().find(|m| lower.contains(**m)).copied()
    };

    let (verdict, confidence, marker) = if let Some(m) = matched(EVIDENCE_MARKERS) {
        (Verdict::True, profile.evidence_confidence, Some(m))
    } else if let Some(m) = matched(DUBIOUS_MARKERS) {
        (Verdict::False, profile.dubious_confidence, Some(m))
    } else {
        (Verdict::Disputed, profile.fallback_confidence, None)
    };

    let mut response = RawProviderResponse::new(verdict.as_str(), confidence);
    if marker.is_some() {
        response.sources = profile.sources.iter().map(RawSource::url).collect();
    }
    response.raw = serde_json::json!({
        "mock": true,
        "provider": id,
        "marker": marker,
    });
    response
}

struct InFlight<'a>(&'a AtomicU32);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl FactCheckProvider for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn evaluate(
        &self,
        claim_text: &str,
        _language: Option<&str>,
    ) -> Result<RawProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failed = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(ProviderError::HttpError("connection reset".to_string()));
        }

        self.answer(claim_text)
    }
}

/// Creates heuristic mocks for any provider id.
pub struct MockProviderFactory;

impl ProviderFactory for MockProviderFactory {
    fn provider_type(&self) -> &'static str {
        "mock"
    }

    fn create(
        &self,
        id: &str,
        _config: &JsonValue,
    ) -> Result<Arc<dyn FactCheckProvider>, ProviderError> {
        Ok(Arc::new(MockProvider::heuristic(id)))
    }

    fn validate_config(&self, _config: &JsonValue) -> Result<(), ProviderError> {
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Deterministic offline provider for tests and demos"
    }
}
