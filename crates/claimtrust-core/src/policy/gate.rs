//! Policy gate: decides after every provider call whether the chain keeps
//! paying for more opinions.
//!
//! The rules, in order:
//! 1. No outcomes yet → continue (the first provider is always called).
//! 2. Hard gate: the first outcome's confidence reached its provider's
//!    threshold → stop.
//! 3. Otherwise look at the signals:
//!    - `confidence_gap = |first.confidence − last.confidence|` (1.0 with a
//!      single outcome),
//!    - `alignment`: at least two outcomes and all share one verdict,
//!    - `cost_efficiency = tokens_used / max_tokens` (0 when unlimited).
//! 4. Continue iff `!alignment || (gap < 0.07 && cost_efficiency < 0.9)`.
//!
//! The gate is a pure function of its inputs.

use serde::{Deserialize, Serialize};

use super::config::PolicyConfig;
use crate::types::ProviderOutcome;

/// Gap between first and last confidence below which outcomes count as converged.
pub const CONVERGENCE_GAP: f64 = 0.07;

/// Share of the token budget above which the chain stops spending.
pub const BUDGET_HEADROOM: f64 = 0.9;

/// Why the gate stopped the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStop {
    /// First provider was confident enough on its own
    HardGate,
    /// Outcomes agree and more calls are not worth it
    Converged,
}

/// Gate output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Continue,
    Stop(GateStop),
}

impl GateDecision {
    pub fn should_continue(&self) -> bool {
        matches!(self, GateDecision::Continue)
    }
}

/// The soft-gate signals, exposed for logging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateSignals {
    pub confidence_gap: f64,
    pub alignment: bool,
    pub cost_efficiency: f64,
}

impl GateSignals {
    /// Compute the signals over a non-empty outcome list.
    pub fn compute(outcomes: &[ProviderOutcome], policy: &PolicyConfig, tokens_used: u64) -> Self {
        let confidence_gap = match (outcomes.first(), outcomes.last()) {
            (Some(first), Some(last)) if outcomes.len() > 1 => {
                (first.confidence - last.confidence).abs()
            }
            _ => 1.0,
        };

        let alignment = outcomes.len() > 1
            && outcomes
                .iter()
                .all(|o| o.verdict == outcomes[0].verdict);

        Self {
            confidence_gap,
            alignment,
            cost_efficiency: policy.max_tokens_per_job.utilization(tokens_used),
        }
    }
}

/// Decision function over the outcomes accumulated so far.
pub struct PolicyGate<'a> {
    policy: &'a PolicyConfig,
}

impl<'a> PolicyGate<'a> {
    pub fn new(policy: &'a PolicyConfig) -> Self {
        Self { policy }
    }

    pub fn decide(&self, outcomes: &[ProviderOutcome], tokens_used: u64) -> GateDecision {
        let Some(first) = outcomes.first() else {
            return GateDecision::Continue;
        };

        if first.confidence >= self.policy.threshold(&first.provider) {
            return GateDecision::Stop(GateStop::HardGate);
        }

        let signals = GateSignals::compute(outcomes, self.policy, tokens_used);
        let keep_going = !signals.alignment
            || (signals.confidence_gap < CONVERGENCE_GAP
                && signals.cost_efficiency < BUDGET_HEADROOM);

        if keep_going {
            GateDecision::Continue
        } else {
            GateDecision::Stop(GateStop::Converged)
        }
    }
}
