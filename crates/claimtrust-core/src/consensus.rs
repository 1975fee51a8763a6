//! Consensus engine: fuses provider outcomes into one calibrated verdict.
//!
//! 1. No outcomes, or only `pending` ones → neutral result
//!    (`pending`, confidence 0, balance 0.5, diversity 0.5).
//! 2. `score[v] = Σ weight(provider) × confidence × trust` per verdict.
//! 3. Best verdict by score; ties go to the verdict that comes first in
//!    [`Verdict::ORDER`] (`true`, `false`, `disputed`, `pending`).
//! 4. `raw = score[best] / max(1, Σ score)`.
//! 5. `diversity = 1 − HHI(domains)`.
//! 6. `balance = 1 − |for − against| / max(1, for + against)`.
//! 7. `confidence = clamp01(raw + (diversity − 0.5)·0.08 + (balance − 0.5)·0.08)`.
//!
//! Input is assumed clean: confidences in [0,1] and well-formed verdicts are
//! enforced at the provider adapter boundary, not here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::policy::PolicyConfig;
use crate::trust::TrustScorer;
use crate::types::{ProviderOutcome, Verdict};

/// Scale of each calibration term.
pub const CALIBRATION_STEP: f64 = 0.08;

/// Neutral value for diversity and balance when there is no signal.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Everything the engine needs for one claim.
#[derive(Debug, Clone, Default)]
pub struct ConsensusInput {
    pub outcomes: Vec<ProviderOutcome>,

    /// Trust multiplier per outcome, by index; missing entries count as 1.0
    pub trust_multipliers: Vec<f64>,

    pub evidence_for: u32,
    pub evidence_against: u32,

    /// Domains of all sources across all outcomes
    pub domains: Vec<String>,
}

impl ConsensusInput {
    pub fn new(outcomes: Vec<ProviderOutcome>) -> Self {
        Self {
            outcomes,
            ..Default::default()
        }
    }

    pub fn with_trust(mut self, multipliers: Vec<f64>) -> Self {
        self.trust_multipliers = multipliers;
        self
    }

    pub fn with_evidence(mut self, evidence_for: u32, evidence_against: u32) -> Self {
        self.evidence_for = evidence_for;
        self.evidence_against = evidence_against;
        self
    }

    pub fn with_domains(mut self, domains: Vec<String>) -> Self {
        self.domains = domains;
        self
    }

    /// Derive the full input from a chain's outcomes.
    ///
    /// Trust per outcome is the scorer's view of its sources; an outcome
    /// citing none gets the scorer's default trust for an unknown domain. Sources cited by `true` outcomes count as supporting
    /// evidence, those cited by `false` outcomes as contradicting.
    pub fn from_outcomes(
        outcomes: Vec<ProviderOutcome>,
        scorer: &TrustScorer,
        now: DateTime<Utc>,
    ) -> Self {
        let trust_multipliers = outcomes
            .iter()
            .map(|o| {
                if o.sources.is_empty() {
                    scorer.default_trust()
                } else {
                    scorer.score_sources(&o.sources, now)
                }
            })
            .collect();

        let count_for = |verdict: Verdict| -> u32 {
            outcomes
                .iter()
                .filter(|o| o.verdict == verdict)
                .map(|o| o.sources.len() as u32)
                .sum()
        };
        let evidence_for = count_for(Verdict::True);
        let evidence_against = count_for(Verdict::False);

        let domains = outcomes
            .iter()
            .flat_map(|o| o.sources.iter().map(|s| s.domain.clone()))
            .collect();

        Self {
            outcomes,
            trust_multipliers,
            evidence_for,
            evidence_against,
            domains,
        }
    }

    fn trust(&self, index: usize) -> f64 {
        self.trust_multipliers.get(index).copied().unwrap_or(1.0)
    }
}

/// The fused verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusResult {
    pub verdict: Verdict,
    pub confidence: f64,
    pub balance_score: f64,
    pub diversity_index: f64,
}

impl ConsensusResult {
    /// Result when there is nothing to fuse.
    pub fn no_signal() -> Self {
        Self {
            verdict: Verdict::Pending,
            confidence: 0.0,
            balance_score: NEUTRAL_SCORE,
            diversity_index: NEUTRAL_SCORE,
        }
    }
}

/// Weighted score per verdict, indexed by [`Verdict::index`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VerdictTally {
    scores: [f64; 4],
}

impl VerdictTally {
    pub fn add(&mut self, verdict: Verdict, score: f64) {
        self.scores[verdict.index()] += score;
    }

    pub fn score(&self, verdict: Verdict) -> f64 {
        self.scores[verdict.index()]
    }

    pub fn total(&self) -> f64 {
        self.scores.iter().sum()
    }

    /// Highest-scoring verdict. Walks [`Verdict::ORDER`] and keeps the first
    /// maximum, so ties resolve toward `true`, then `false`, then `disputed`.
    pub fn best(&self) -> Verdict {
        let mut best = Verdict::ORDER[0];
        for verdict in Verdict::ORDER {
            if self.score(verdict) > self.score(best) {
                best = verdict;
            }
        }
        best
    }

    /// Fraction of the total score held by `verdict`; 0 when the tally is empty.
    pub fn share(&self, verdict: Verdict) -> f64 {
        let total = self.total();
        if total > 0.0 {
            self.score(verdict) / total
        } else {
            0.0
        }
    }
}

/// 1 − Herfindahl–Hirschman index of the domain multiset.
///
/// 0 when every mention is the same domain, approaching 1 as mentions spread
/// over many domains. An empty list yields 1.
pub fn diversity_index(domains: &[String]) -> f64 {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for domain in domains {
        *counts.entry(domain.as_str()).or_insert(0) += 1;
    }

    let n = domains.len().max(1) as f64;
    let hhi: f64 = counts
        .values()
        .map(|&c| {
            let share = c as f64 / n;
            share * share
        })
        .sum();

    (1.0 - hhi).clamp(0.0, 1.0)
}

/// Evenness of supporting vs. contradicting evidence; 1 = perfectly split.
pub fn balance_score(evidence_for: u32, evidence_against: u32) -> f64 {
    let diff = (evidence_for as f64 - evidence_against as f64).abs();
    let total = (evidence_for as f64 + evidence_against as f64).max(1.0);
    (1.0 - diff / total).clamp(0.0, 1.0)
}

/// Shift raw confidence by the diversity and balance terms, then clamp.
pub fn calibrate(raw_confidence: f64, diversity: f64, balance: f64) -> f64 {
    let adjusted = raw_confidence
        + (diversity - NEUTRAL_SCORE) * CALIBRATION_STEP
        + (balance - NEUTRAL_SCORE) * CALIBRATION_STEP;
    adjusted.clamp(0.0, 1.0)
}

/// Fuses outcomes using the static provider weights of a policy.
pub struct ConsensusEngine<'a> {
    policy: &'a PolicyConfig,
}

impl<'a> ConsensusEngine<'a> {
    pub fn new(policy: &'a PolicyConfig) -> Self {
        Self { policy }
    }

    /// Weighted vote over the outcomes.
    pub fn tally(&self, input: &ConsensusInput) -> VerdictTally {
        let mut tally = VerdictTally::default();
        for (i, outcome) in input.outcomes.iter().enumerate() {
            let score = self.policy.weight(&outcome.provider) * outcome.confidence * input.trust(i);
            tally.add(outcome.verdict, score);
        }
        tally
    }

    pub fn evaluate(&self, input: &ConsensusInput) -> ConsensusResult {
        if input.outcomes.iter().all(|o| o.verdict == Verdict::Pending) {
            return ConsensusResult::no_signal();
        }

        let tally = self.tally(input);
        let best = tally.best();
        let raw_confidence = tally.score(best) / tally.total().max(1.0);

        let diversity = diversity_index(&input.domains);
        let balance = balance_score(input.evidence_for, input.evidence_against);

        ConsensusResult {
            verdict: best,
            confidence: calibrate(raw_confidence, diversity, balance),
            balance_score: balance,
            diversity_index: diversity,
        }
    }
}
