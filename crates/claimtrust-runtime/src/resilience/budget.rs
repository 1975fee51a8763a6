//! Token budget for one claim's provider chain, and the cross-claim usage
//! ledger.
//!
//! The budget is owned by a single chain run and decides whether the next
//! provider may be consulted. The ledger only reports; gate and consensus
//! never read it.

use claimtrust_core::TokenLimit;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-claim token budget.
#[derive(Debug, Clone)]
pub struct ChainBudget {
    limit: TokenLimit,
    used: u64,
}

impl ChainBudget {
    pub fn new(limit: TokenLimit) -> Self {
        Self { limit, used: 0 }
    }

    /// Whether a call estimated at `tokens` still fits.
    pub fn can_afford(&self, tokens: u64) -> bool {
        match self.limit {
            TokenLimit::Unlimited => true,
            TokenLimit::Limited(max) => self.used.saturating_add(tokens) <= max,
        }
    }

    pub fn record(&mut self, tokens: u64) {
        self.used = self.used.saturating_add(tokens);
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    /// Remaining tokens; `None` when unlimited.
    pub fn remaining(&self) -> Option<u64> {
        self.limit.remaining(self.used)
    }

    pub fn limit(&self) -> TokenLimit {
        self.limit
    }
}

/// Aggregated usage across a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    /// Claims that produced a record
    pub claims: u64,

    /// Claims that failed or were rejected
    pub rejected_claims: u64,

    /// Provider calls attempted (a retried call counts once)
    pub provider_calls: u64,

    /// Provider calls that ended in an error
    pub provider_failures: u64,

    pub total_tokens: u64,

    pub tokens_by_provider: BTreeMap<String, u64>,

    /// How chain runs ended, keyed by stop reason
    pub stop_reasons: BTreeMap<String, u64>,
}

/// Thread-safe usage ledger shared by the worker pool.
#[derive(Debug, Default)]
pub struct UsageLedger {
    summary: RwLock<UsageSummary>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one provider outcome's cost.
    pub fn record_call(&self, provider: &str, cost_tokens: u64) {
        let mut summary = self.summary.write();
        summary.provider_calls += 1;
        summary.total_tokens += cost_tokens;
        *summary
            .tokens_by_provider
            .entry(provider.to_string())
            .or_default() += cost_tokens;
    }

    pub fn record_failure(&self) {
        let mut summary = self.summary.write();
        summary.provider_calls += 1;
        summary.provider_failures += 1;
    }

    pub fn record_claim(&self, stop_reason: &str) {
        let mut summary = self.summary.write();
        summary.claims += 1;
        *summary
            .stop_reasons
            .entry(stop_reason.to_string())
            .or_default() += 1;
    }

    pub fn record_rejected(&self) {
        self.summary.write().rejected_claims += 1;
    }

    pub fn summary(&self) -> UsageSummary {
        self.summary.read().clone()
    }
}
