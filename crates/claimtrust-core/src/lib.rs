//! # claimtrust-core
//!
//! Deterministic fact-check consensus engine.
//!
//! This crate holds the parts of ClaimTrust that make decisions:
//! - Should the provider chain keep paying for opinions? ([`PolicyGate`])
//! - What do the collected opinions add up to? ([`ConsensusEngine`])
//! - How credible are the cited sources? ([`TrustScorer`])
//! - What goes into the audit trail? ([`ClaimTrustExporter`])
//!
//! ## Key Guarantees
//!
//! 1. **Pure**: no I/O, no async, no hidden state; timestamps are passed in
//! 2. **Bounded**: confidences and scores always lie in [0,1]
//! 3. **Reproducible**: verdict ties resolve in a fixed, documented order
//! 4. **Infallible consensus**: no outcomes is a valid `pending` result
//!
//! ## Example
//!
//! ```rust
//! use chrono::Utc;
//! use claimtrust_core::{assess, ClaimRequest, PolicyConfig, ProviderOutcome, Verdict};
//!
//! let policy = PolicyConfig::default();
//! let claim = ClaimRequest::new("Laut offizieller Studie ist X gesunken").with_language("de");
//! let outcomes = vec![ProviderOutcome::new("claude", Verdict::True, 0.88)];
//!
//! let record = assess(&claim, "c-1", outcomes, &policy, Utc::now());
//! assert_eq!(record.consensus.verdict, Verdict::True);
//! ```

pub mod consensus;
pub mod policy;
pub mod record;
pub mod trust;
pub mod types;

pub use consensus::{ConsensusEngine, ConsensusInput, ConsensusResult, VerdictTally};
pub use policy::{
    GateDecision, GateStop, PolicyConfig, PolicyError, PolicyGate, ProviderPolicy, TokenLimit,
};
pub use record::{ClaimBlock, ClaimTrustExporter, ClaimTrustRecord};
pub use trust::{EvidenceItem, TrustScorer};
pub use types::{
    ClaimError, ClaimRequest, PolicyOverrides, ProviderOutcome, Source, Verdict,
};

use chrono::{DateTime, Utc};

/// Fuse a chain's outcomes and export the audit record.
///
/// This is the pure tail of a claim evaluation: consensus input derivation,
/// consensus, and export.
pub fn assess(
    claim: &ClaimRequest,
    claim_id: &str,
    outcomes: Vec<ProviderOutcome>,
    policy: &PolicyConfig,
    now: DateTime<Utc>,
) -> ClaimTrustRecord {
    let input = ConsensusInput::from_outcomes(outcomes, &TrustScorer::new(), now);
    let consensus = ConsensusEngine::new(policy).evaluate(&input);

    tracing::debug!(
        claim_id,
        verdict = %consensus.verdict,
        confidence = consensus.confidence,
        providers = input.outcomes.len(),
        "Consensus reached"
    );

    let block = ClaimBlock {
        id: claim_id.to_string(),
        text: claim.claim_text.clone(),
        lang: claim.language.clone(),
        topic: claim.topic.clone(),
    };

    ClaimTrustExporter::new().export(block, &input.outcomes, &consensus, now)
}
