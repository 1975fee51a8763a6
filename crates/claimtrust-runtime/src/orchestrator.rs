//! Provider chain orchestrator.
//!
//! Drives one claim through the providers strictly in policy order:
//! - budget pre-check and fallback cap before every call after the first
//! - per-attempt timeout, linear-backoff retry of transient errors
//! - every call and backoff sleep raced against cancellation
//! - the policy gate consulted after every call
//!
//! Failed providers are logged and left out of the outcome list; the chain
//! always completes with whatever outcomes it got, possibly none.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use backon::Retryable;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use claimtrust_core::{
    assess, ClaimError, ClaimRequest, ClaimTrustRecord, GateDecision, GateStop, PolicyConfig,
    PolicyError, PolicyGate, ProviderOutcome,
};

use crate::config::RuntimeConfig;
use crate::providers::{
    normalize, FactCheckProvider, ProviderChain, ProviderError, ProviderRegistry,
};
use crate::resilience::{CancellationToken, ChainBudget, LinearBackoffBuilder, UsageLedger};

/// Errors from the runtime.
///
/// Provider failures are not in here: they end up in [`ChainRun::failures`].
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Claim evaluation cancelled")]
    Cancelled,

    #[error("Invalid claim: {0}")]
    InvalidClaim(#[from] ClaimError),

    #[error("Invalid policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Provider setup failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Claim {index} rejected: batch limit is {max} claims")]
    ClaimLimitExceeded { index: usize, max: u32 },

    #[error("Worker failed: {0}")]
    Worker(String),
}

/// Why a chain run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The first answer met its provider's threshold
    HardGate,
    /// The gate judged further calls not worth it
    Converged,
    /// The next call would exceed the token budget
    BudgetExhausted,
    /// `max_fallbacks` providers were consulted
    FallbackCap,
    /// Every provider was consulted
    ChainExhausted,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::HardGate => "hard_gate",
            StopReason::Converged => "converged",
            StopReason::BudgetExhausted => "budget_exhausted",
            StopReason::FallbackCap => "fallback_cap",
            StopReason::ChainExhausted => "chain_exhausted",
        }
    }
}

impl From<GateStop> for StopReason {
    fn from(stop: GateStop) -> Self {
        match stop {
            GateStop::HardGate => StopReason::HardGate,
            GateStop::Converged => StopReason::Converged,
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider that was consulted but produced no outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub provider: String,
    pub error: String,
}

/// What happened while walking the chain for one claim.
#[derive(Debug, Clone)]
pub struct ChainRun {
    pub claim_id: String,
    /// Outcomes in invocation order
    pub outcomes: Vec<ProviderOutcome>,
    pub failures: Vec<ProviderFailure>,
    /// Providers consulted, failed ones included
    pub calls: u32,
    pub tokens_used: u64,
    pub stop_reason: StopReason,
}

/// A record together with the run that produced it.
#[derive(Debug, Clone)]
pub struct ClaimReport {
    pub record: ClaimTrustRecord,
    pub run: ChainRun,
}

/// Walks the provider chain for claims.
///
/// Holds no per-claim state, so one orchestrator serves any number of
/// concurrent claims.
pub struct ChainOrchestrator {
    policy: PolicyConfig,
    chain: ProviderChain,
    config: RuntimeConfig,
    ledger: Arc<UsageLedger>,
}

impl std::fmt::Debug for ChainOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainOrchestrator")
            .field("chain", &self.chain)
            .field("mode", &self.config.mode)
            .finish()
    }
}

impl ChainOrchestrator {
    pub fn builder(policy: PolicyConfig) -> ChainOrchestratorBuilder {
        ChainOrchestratorBuilder::new(policy)
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    pub fn chain(&self) -> &ProviderChain {
        &self.chain
    }

    pub fn ledger(&self) -> &Arc<UsageLedger> {
        &self.ledger
    }

    /// Evaluate one claim into its audit record.
    pub async fn evaluate(
        &self,
        claim: &ClaimRequest,
        cancel: &CancellationToken,
    ) -> Result<ClaimTrustRecord, RuntimeError> {
        Ok(self.evaluate_with_report(claim, cancel).await?.record)
    }

    /// Evaluate one claim, keeping the chain run alongside the record.
    pub async fn evaluate_with_report(
        &self,
        claim: &ClaimRequest,
        cancel: &CancellationToken,
    ) -> Result<ClaimReport, RuntimeError> {
        claim.validate()?;

        let policy = match &claim.policy_overrides {
            Some(overrides) if !overrides.is_empty() => {
                Cow::Owned(self.policy.with_overrides(overrides)?)
            }
            _ => Cow::Borrowed(&self.policy),
        };

        let claim_id = claim.resolve_id();
        let run = self.run_chain(&claim_id, claim, &policy, cancel).await?;

        self.ledger.record_claim(run.stop_reason.as_str());
        let record = assess(claim, &claim_id, run.outcomes.clone(), &policy, Utc::now());

        tracing::info!(
            claim_id = %claim_id,
            verdict = %record.consensus.verdict,
            confidence = record.consensus.confidence,
            calls = run.calls,
            cost_tokens = run.tokens_used,
            decision = %run.stop_reason,
            "Claim evaluated"
        );

        Ok(ClaimReport { record, run })
    }

    /// Walk the chain for one claim under `policy`.
    pub async fn run_chain(
        &self,
        claim_id: &str,
        claim: &ClaimRequest,
        policy: &PolicyConfig,
        cancel: &CancellationToken,
    ) -> Result<ChainRun, RuntimeError> {
        let gate = PolicyGate::new(policy);
        let mut budget = ChainBudget::new(policy.max_tokens_per_job);
        let mut outcomes: Vec<ProviderOutcome> = Vec::new();
        let mut failures = Vec::new();
        let mut calls = 0u32;
        let mut stop_reason = StopReason::ChainExhausted;

        for provider in self.chain.iter() {
            if cancel.is_cancelled() {
                return Err(RuntimeError::Cancelled);
            }

            if calls >= policy.max_fallbacks {
                stop_reason = StopReason::FallbackCap;
                break;
            }

            // The first provider is always consulted.
            let estimate = provider.estimate_cost(&claim.claim_text);
            if calls > 0 && !budget.can_afford(estimate) {
                tracing::info!(
                    claim_id,
                    provider = provider.id(),
                    cost_tokens = estimate,
                    used = budget.used(),
                    "Budget pre-check refused next provider"
                );
                stop_reason = StopReason::BudgetExhausted;
                break;
            }

            calls += 1;
            match self.consult(provider, claim_id, claim, cancel).await? {
                Ok(outcome) => {
                    budget.record(outcome.cost_tokens);
                    self.ledger.record_call(&outcome.provider, outcome.cost_tokens);
                    outcomes.push(outcome);
                }
                Err(error) => {
                    tracing::warn!(
                        claim_id,
                        provider = provider.id(),
                        error = %error,
                        "Provider failed, excluding from outcomes"
                    );
                    self.ledger.record_failure();
                    failures.push(ProviderFailure {
                        provider: provider.id().to_string(),
                        error: error.to_string(),
                    });
                }
            }

            if let GateDecision::Stop(stop) = gate.decide(&outcomes, budget.used()) {
                stop_reason = stop.into();
                break;
            }
        }

        tracing::debug!(
            claim_id,
            calls,
            outcomes = outcomes.len(),
            cost_tokens = budget.used(),
            decision = %stop_reason,
            "Provider chain finished"
        );

        Ok(ChainRun {
            claim_id: claim_id.to_string(),
            outcomes,
            failures,
            calls,
            tokens_used: budget.used(),
            stop_reason,
        })
    }

    /// One provider call with timeout and retry, raced against cancellation.
    ///
    /// The outer error is fatal to the claim; the inner one only to this
    /// provider.
    async fn consult(
        &self,
        provider: &Arc<dyn FactCheckProvider>,
        claim_id: &str,
        claim: &ClaimRequest,
        cancel: &CancellationToken,
    ) -> Result<Result<ProviderOutcome, ProviderError>, RuntimeError> {
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;
        let backend = provider.as_ref();
        let provider_id = provider.id();
        let text = claim.claim_text.as_str();
        let language = claim.language.as_deref();
        let timeout = self.config.provider_timeout;

        let call = move || async move {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::debug!(claim_id, provider = provider_id, attempt, "Consulting provider");
            match tokio::time::timeout(timeout, backend.evaluate(text, language)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(timeout)),
            }
        };

        let retrying = call
            .retry(LinearBackoffBuilder::new(
                self.config.backoff_step,
                self.config.retry_attempts,
            ))
            .sleep(tokio::time::sleep)
            .when(ProviderError::is_transient)
            .notify(|error: &ProviderError, delay: Duration| {
                tracing::warn!(
                    claim_id,
                    provider = provider_id,
                    attempt = attempts.load(Ordering::SeqCst),
                    error = %error,
                    delay = ?delay,
                    "Transient provider error, retrying"
                );
            });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(claim_id, provider = provider_id, "Claim cancelled mid-call");
                Err(RuntimeError::Cancelled)
            }
            result = retrying => {
                let outcome = result.and_then(|raw| normalize(provider_id, text, raw));
                if let Ok(outcome) = &outcome {
                    tracing::debug!(
                        claim_id,
                        provider = provider_id,
                        verdict = %outcome.verdict,
                        confidence = outcome.confidence,
                        cost_tokens = outcome.cost_tokens,
                        "Provider answered"
                    );
                }
                Ok(outcome)
            }
        }
    }
}

/// Builder for [`ChainOrchestrator`].
///
/// Providers given explicitly are put into policy order; without any, the
/// chain is built from the registry for the configured mode.
pub struct ChainOrchestratorBuilder {
    policy: PolicyConfig,
    config: RuntimeConfig,
    registry: Option<ProviderRegistry>,
    providers: Vec<Arc<dyn FactCheckProvider>>,
    ledger: Option<Arc<UsageLedger>>,
}

impl ChainOrchestratorBuilder {
    pub fn new(policy: PolicyConfig) -> Self {
        Self {
            policy,
            config: RuntimeConfig::default(),
            registry: None,
            providers: Vec::new(),
            ledger: None,
        }
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Add a provider explicitly.
    pub fn provider(mut self, provider: Arc<dyn FactCheckProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn ledger(mut self, ledger: Arc<UsageLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn build(self) -> Result<ChainOrchestrator, RuntimeError> {
        self.policy.validate()?;

        let chain = if self.providers.is_empty() {
            let registry = self.registry.unwrap_or_else(ProviderRegistry::with_defaults);
            registry.build_chain(self.config.mode, &self.policy, &self.config.providers)?
        } else {
            order_by_policy(&self.policy, self.providers)?
        };

        Ok(ChainOrchestrator {
            policy: self.policy,
            chain,
            config: self.config,
            ledger: self.ledger.unwrap_or_default(),
        })
    }
}

fn order_by_policy(
    policy: &PolicyConfig,
    providers: Vec<Arc<dyn FactCheckProvider>>,
) -> Result<ProviderChain, RuntimeError> {
    let mut by_id: BTreeMap<String, Arc<dyn FactCheckProvider>> = providers
        .into_iter()
        .map(|p| (p.id().to_string(), p))
        .collect();

    let ordered = policy
        .provider_ids()
        .map(|id| {
            by_id.remove(id).ok_or_else(|| {
                RuntimeError::ProviderNotConfigured(format!("no provider registered for '{}'", id))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(extra) = by_id.keys().next() {
        return Err(RuntimeError::ProviderNotConfigured(format!(
            "provider '{}' is not in the policy",
            extra
        )));
    }

    Ok(ProviderChain::new(ordered))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockProvider;
    use claimtrust_core::{
        ConsensusEngine, ConsensusInput, PolicyOverrides, ProviderPolicy, TokenLimit, Verdict,
    };

    const EVIDENCE_CLAIM: &str = "Laut offizieller Studie ist die Arbeitslosenquote gesunken";

    fn orchestrator(
        policy: PolicyConfig,
        providers: Vec<Arc<dyn FactCheckProvider>>,
    ) -> ChainOrchestrator {
        providers
            .into_iter()
            .fold(ChainOrchestrator::builder(policy), |b, p| b.provider(p))
            .build()
            .unwrap()
    }

    fn no_retry() -> RuntimeConfig {
        RuntimeConfig {
            retry_attempts: 0,
            ..RuntimeConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_confident_first_provider_stops_chain() {
        let claude = Arc::new(MockProvider::heuristic("claude"));
        let gpt = Arc::new(MockProvider::heuristic("gpt"));
        let gemini = Arc::new(MockProvider::heuristic("gemini"));
        let orch = orchestrator(
            PolicyConfig::default(),
            vec![gemini.clone(), claude.clone(), gpt.clone()],
        );

        let report = orch
            .evaluate_with_report(
                &ClaimRequest::new(EVIDENCE_CLAIM).with_language("de"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.run.stop_reason, StopReason::HardGate);
        assert_eq!(report.run.calls, 1);
        assert_eq!(claude.calls(), 1);
        assert_eq!(gpt.calls(), 0);
        assert_eq!(gemini.calls(), 0);

        let record = &report.record;
        assert_eq!(record.providers.len(), 1);
        assert_eq!(record.consensus.method, "claude");
        assert_eq!(record.consensus.verdict, Verdict::True);
        assert!((0.0..=1.0).contains(&record.consensus.confidence));

        let policy = PolicyConfig::default();
        let tally = ConsensusEngine::new(&policy).tally(&ConsensusInput::new(report.run.outcomes));
        assert_eq!(tally.share(Verdict::True), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_threshold_stops_after_one_call() {
        let policy = PolicyConfig {
            providers: vec![ProviderPolicy::new("solo", 0.0, 1.0)],
            ..PolicyConfig::default()
        };
        let solo = Arc::new(MockProvider::fixed("solo", Verdict::Disputed, 0.1));
        let orch = orchestrator(policy, vec![solo.clone()]);

        let report = orch
            .evaluate_with_report(&ClaimRequest::new("Irgendwas"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.run.stop_reason, StopReason::HardGate);
        assert_eq!(solo.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_stops_after_first_provider() {
        let policy = PolicyConfig {
            max_tokens_per_job: TokenLimit::Limited(100),
            ..PolicyConfig::default()
        };
        let claude = Arc::new(MockProvider::fixed("claude", Verdict::Disputed, 0.4));
        let gpt = Arc::new(MockProvider::fixed("gpt", Verdict::True, 0.9));
        let gemini = Arc::new(MockProvider::fixed("gemini", Verdict::True, 0.9));
        let orch = orchestrator(policy, vec![claude.clone(), gpt.clone(), gemini]);

        let run = orch
            .evaluate_with_report(&ClaimRequest::new("Kurze Behauptung"), &CancellationToken::new())
            .await
            .unwrap()
            .run;

        assert_eq!(run.stop_reason, StopReason::BudgetExhausted);
        assert_eq!(run.calls, 1);
        assert_eq!(claude.calls(), 1);
        assert_eq!(gpt.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_budget_override_still_consults_first_provider() {
        // A lone disputed answer under threshold would keep the chain going.
        let claude = Arc::new(MockProvider::fixed("claude", Verdict::Disputed, 0.4));
        let gpt = Arc::new(MockProvider::fixed("gpt", Verdict::True, 0.9));
        let gemini = Arc::new(MockProvider::fixed("gemini", Verdict::True, 0.9));
        let orch = orchestrator(
            PolicyConfig::default(),
            vec![claude.clone(), gpt.clone(), gemini.clone()],
        );

        let claim = ClaimRequest::new("Kurze Behauptung").with_overrides(PolicyOverrides {
            max_tokens: Some(0),
            ..Default::default()
        });
        let report = orch
            .evaluate_with_report(&claim, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.run.stop_reason, StopReason::BudgetExhausted);
        assert_eq!(report.run.calls, 1);
        assert_eq!(report.run.outcomes.len(), 1);
        assert!(report.run.tokens_used > 0);
        assert_eq!(claude.calls(), 1);
        assert_eq!(gpt.calls(), 0);
        assert_eq!(gemini.calls(), 0);
        assert_eq!(report.record.consensus.method, "claude");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_provider_is_skipped() {
        let claude = Arc::new(MockProvider::unavailable("claude"));
        let gpt = Arc::new(MockProvider::fixed("gpt", Verdict::False, 0.9));
        let gemini = Arc::new(MockProvider::heuristic("gemini"));
        let orch = orchestrator(PolicyConfig::default(), vec![claude.clone(), gpt, gemini.clone()]);

        let report = orch
            .evaluate_with_report(&ClaimRequest::new("Angeblich X"), &CancellationToken::new())
            .await
            .unwrap();

        // gpt is the first outcome and meets its own threshold
        assert_eq!(report.run.stop_reason, StopReason::HardGate);
        assert_eq!(report.run.calls, 2);
        assert_eq!(report.run.failures.len(), 1);
        assert_eq!(report.run.failures[0].provider, "claude");
        assert_eq!(claude.calls(), 3);
        assert_eq!(gemini.calls(), 0);
        assert_eq!(report.record.consensus.method, "gpt");
        assert_eq!(report.record.consensus.verdict, Verdict::False);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_providers_failing_yields_pending() {
        let orch = ChainOrchestrator::builder(PolicyConfig::default())
            .config(no_retry())
            .provider(Arc::new(MockProvider::malformed("claude")))
            .provider(Arc::new(MockProvider::unavailable("gpt")))
            .provider(Arc::new(MockProvider::unavailable("gemini")))
            .build()
            .unwrap();

        let report = orch
            .evaluate_with_report(&ClaimRequest::new("Irgendwas"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.run.stop_reason, StopReason::ChainExhausted);
        assert_eq!(report.run.failures.len(), 3);
        assert!(report.record.providers.is_empty());
        assert_eq!(report.record.consensus.verdict, Verdict::Pending);
        assert_eq!(report.record.consensus.confidence, 0.0);
        assert_eq!(report.record.consensus.method, "none");
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_retried_with_linear_backoff() {
        let claude = Arc::new(MockProvider::fixed("claude", Verdict::True, 0.9).failing_first(2));
        let orch = orchestrator(
            PolicyConfig::default(),
            vec![
                claude.clone(),
                Arc::new(MockProvider::heuristic("gpt")),
                Arc::new(MockProvider::heuristic("gemini")),
            ],
        );

        let started = tokio::time::Instant::now();
        let report = orch
            .evaluate_with_report(&ClaimRequest::new("Irgendwas"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(claude.calls(), 3);
        assert!(report.run.failures.is_empty());
        assert_eq!(report.run.stop_reason, StopReason::HardGate);
        // 300ms + 600ms
        assert!(started.elapsed() >= Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let claude = Arc::new(MockProvider::fixed("claude", Verdict::True, 0.9).failing_first(3));
        let gpt = Arc::new(MockProvider::fixed("gpt", Verdict::True, 0.9));
        let orch = orchestrator(
            PolicyConfig::default(),
            vec![claude.clone(), gpt.clone(), Arc::new(MockProvider::heuristic("gemini"))],
        );

        let report = orch
            .evaluate_with_report(&ClaimRequest::new("Irgendwas"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(claude.calls(), 3);
        assert_eq!(report.run.failures.len(), 1);
        assert_eq!(gpt.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_output_not_retried() {
        let claude = Arc::new(MockProvider::malformed("claude"));
        let orch = orchestrator(
            PolicyConfig::default(),
            vec![
                claude.clone(),
                Arc::new(MockProvider::fixed("gpt", Verdict::True, 0.95)),
                Arc::new(MockProvider::heuristic("gemini")),
            ],
        );

        let report = orch
            .evaluate_with_report(&ClaimRequest::new("Irgendwas"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(claude.calls(), 1);
        assert!(report.run.failures[0].error.contains("Malformed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out() {
        let claude = Arc::new(
            MockProvider::fixed("claude", Verdict::True, 0.99).with_delay(Duration::from_secs(60)),
        );
        let gpt = Arc::new(MockProvider::fixed("gpt", Verdict::False, 0.85));
        let orch = ChainOrchestrator::builder(PolicyConfig::default())
            .config(no_retry())
            .provider(claude)
            .provider(gpt)
            .provider(Arc::new(MockProvider::heuristic("gemini")))
            .build()
            .unwrap();

        let started = tokio::time::Instant::now();
        let report = orch
            .evaluate_with_report(&ClaimRequest::new("Irgendwas"), &CancellationToken::new())
            .await
            .unwrap();

        assert!(report.run.failures[0].error.contains("Timeout"));
        assert_eq!(report.record.consensus.verdict, Verdict::False);
        assert!(started.elapsed() >= Duration::from_secs(20));
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_aborts_in_flight_call() {
        let claude = Arc::new(
            MockProvider::fixed("claude", Verdict::True, 0.99).with_delay(Duration::from_secs(10)),
        );
        let gpt = Arc::new(MockProvider::heuristic("gpt"));
        let orch = orchestrator(
            PolicyConfig::default(),
            vec![claude, gpt.clone(), Arc::new(MockProvider::heuristic("gemini"))],
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let result = orch.evaluate(&ClaimRequest::new("Irgendwas"), &cancel).await;
        assert!(matches!(result, Err(RuntimeError::Cancelled)));
        assert_eq!(gpt.calls(), 0);
        assert_eq!(orch.ledger().summary().claims, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start() {
        let claude = Arc::new(MockProvider::heuristic("claude"));
        let orch = orchestrator(
            PolicyConfig::default(),
            vec![
                claude.clone(),
                Arc::new(MockProvider::heuristic("gpt")),
                Arc::new(MockProvider::heuristic("gemini")),
            ],
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = orch.evaluate(&ClaimRequest::new(EVIDENCE_CLAIM), &cancel).await;
        assert!(matches!(result, Err(RuntimeError::Cancelled)));
        assert_eq!(claude.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_cap() {
        let policy = PolicyConfig {
            max_fallbacks: 2,
            ..PolicyConfig::default()
        };
        let gemini = Arc::new(MockProvider::fixed("gemini", Verdict::True, 0.3));
        let orch = orchestrator(
            policy,
            vec![
                Arc::new(MockProvider::fixed("claude", Verdict::True, 0.3)),
                Arc::new(MockProvider::fixed("gpt", Verdict::False, 0.3)),
                gemini.clone(),
            ],
        );

        let run = orch
            .evaluate_with_report(&ClaimRequest::new("Irgendwas"), &CancellationToken::new())
            .await
            .unwrap()
            .run;
        assert_eq!(run.stop_reason, StopReason::FallbackCap);
        assert_eq!(run.calls, 2);
        assert_eq!(gemini.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_overrides_derive_policy() {
        let gpt = Arc::new(MockProvider::fixed("gpt", Verdict::False, 0.3));
        let orch = orchestrator(
            PolicyConfig::default(),
            vec![
                Arc::new(MockProvider::fixed("claude", Verdict::True, 0.3)),
                gpt.clone(),
                Arc::new(MockProvider::heuristic("gemini")),
            ],
        );
        let claim = ClaimRequest::new("Irgendwas").with_overrides(PolicyOverrides {
            max_fallbacks: Some(1),
            ..Default::default()
        });

        let run = orch
            .evaluate_with_report(&claim, &CancellationToken::new())
            .await
            .unwrap()
            .run;
        assert_eq!(run.stop_reason, StopReason::FallbackCap);
        assert_eq!(gpt.calls(), 0);
        assert_eq!(orch.policy().max_fallbacks, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_agreeing_outcomes_converge() {
        let gemini = Arc::new(MockProvider::fixed("gemini", Verdict::True, 0.5));
        let orch = orchestrator(
            PolicyConfig::default(),
            vec![
                Arc::new(MockProvider::fixed("claude", Verdict::True, 0.6)),
                Arc::new(MockProvider::fixed("gpt", Verdict::True, 0.75)),
                gemini.clone(),
            ],
        );

        let report = orch
            .evaluate_with_report(&ClaimRequest::new("Irgendwas"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.run.stop_reason, StopReason::Converged);
        assert_eq!(gemini.calls(), 0);
        assert_eq!(report.record.consensus.method, "multi-ki");
    }

    #[tokio::test]
    async fn test_invalid_claim_rejected_before_any_call() {
        let claude = Arc::new(MockProvider::heuristic("claude"));
        let orch = orchestrator(
            PolicyConfig::default(),
            vec![
                claude.clone(),
                Arc::new(MockProvider::heuristic("gpt")),
                Arc::new(MockProvider::heuristic("gemini")),
            ],
        );
        let result = orch.evaluate(&ClaimRequest::new("   "), &CancellationToken::new()).await;
        assert!(matches!(result, Err(RuntimeError::InvalidClaim(ClaimError::EmptyText))));
        assert_eq!(claude.calls(), 0);
    }

    #[test]
    fn test_builder_requires_every_policy_provider() {
        let result = ChainOrchestrator::builder(PolicyConfig::default())
            .provider(Arc::new(MockProvider::heuristic("claude")))
            .build();
        assert!(matches!(result, Err(RuntimeError::ProviderNotConfigured(_))));
    }

    #[test]
    fn test_builder_rejects_unknown_provider() {
        let policy = PolicyConfig {
            providers: vec![ProviderPolicy::new("claude", 0.85, 1.0)],
            ..PolicyConfig::default()
        };
        let result = ChainOrchestrator::builder(policy)
            .provider(Arc::new(MockProvider::heuristic("claude")))
            .provider(Arc::new(MockProvider::heuristic("grok")))
            .build();
        match result {
            Err(RuntimeError::ProviderNotConfigured(msg)) => assert!(msg.contains("grok")),
            other => panic!("expected ProviderNotConfigured, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_builder_uses_registry_in_mock_mode() {
        let orch = ChainOrchestrator::builder(PolicyConfig::default())
            .build()
            .unwrap();
        assert_eq!(orch.chain().ids(), vec!["claude", "gpt", "gemini"]);
    }
}
