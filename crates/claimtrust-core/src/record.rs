//! ClaimTrust audit record: the immutable, exported trail of one claim's
//! fact-check.
//!
//! A record is assembled once and never edited afterwards; re-evaluating a
//! claim produces a new record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::consensus::ConsensusResult;
use crate::types::{ProviderOutcome, Verdict};

/// Record format version.
pub const RECORD_VERSION: &str = "claimtrust/1.0";

/// Consensus method label when more than one provider contributed.
pub const MULTI_PROVIDER_METHOD: &str = "multi-ki";

/// Consensus method label when no provider produced an outcome.
pub const NO_PROVIDER_METHOD: &str = "none";

/// Fixed explanation attached to every consensus block.
pub const CONSENSUS_EXPLANATION: &str =
    "Weighted provider vote, calibrated by source diversity and evidence balance.";

/// Claim identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimBlock {
    pub id: String,
    pub text: String,
    pub lang: Option<String>,
    pub topic: Option<String>,
}

/// One surviving provider's result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResult {
    pub provider: String,
    pub verdict: Verdict,
    pub confidence: f64,
    pub cost_tokens: u64,
    pub raw: serde_json::Value,
}

impl From<&ProviderOutcome> for ProviderResult {
    fn from(outcome: &ProviderOutcome) -> Self {
        Self {
            provider: outcome.provider.clone(),
            verdict: outcome.verdict,
            confidence: outcome.confidence,
            cost_tokens: outcome.cost_tokens,
            raw: outcome.raw.clone(),
        }
    }
}

/// The fused verdict as exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusBlock {
    pub method: String,
    pub verdict: Verdict,
    pub confidence: f64,
    pub balance_score: f64,
    pub diversity_index: f64,
    pub explanation: String,
}

/// A deduplicated source. Trust and content hash are filled by a later
/// enrichment stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceEntry {
    pub url: String,
    pub domain: String,
    pub trust_score: Option<f64>,
    pub content_hash: Option<String>,
}

/// Audit metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditBlock {
    pub created_at: DateTime<Utc>,
    pub version: String,
    /// Reserved for cryptographic attestation; always empty on export.
    pub signatures: Vec<String>,
}

/// The exported record for one claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimTrustRecord {
    pub claim: ClaimBlock,
    pub providers: Vec<ProviderResult>,
    pub consensus: ConsensusBlock,
    pub sources: Vec<SourceEntry>,
    pub audit: AuditBlock,
}

impl ClaimTrustRecord {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Method label for a set of outcomes.
pub fn consensus_method(outcomes: &[ProviderOutcome]) -> String {
    match outcomes {
        [] => NO_PROVIDER_METHOD.to_string(),
        [single] => single.provider.clone(),
        _ => MULTI_PROVIDER_METHOD.to_string(),
    }
}

/// Flatten all cited sources, keeping the first occurrence of each URL.
pub fn dedup_sources(outcomes: &[ProviderOutcome]) -> Vec<SourceEntry> {
    let mut seen = HashSet::new();
    outcomes
        .iter()
        .flat_map(|o| o.sources.iter())
        .filter(|s| seen.insert(s.url.as_str()))
        .map(|s| SourceEntry {
            url: s.url.clone(),
            domain: s.domain.clone(),
            trust_score: None,
            content_hash: None,
        })
        .collect()
}

/// Assembles [`ClaimTrustRecord`]s.
pub struct ClaimTrustExporter {
    version: String,
}

impl ClaimTrustExporter {
    pub fn new() -> Self {
        Self {
            version: RECORD_VERSION.to_string(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Build the record. `created_at` is passed in so export stays pure.
    pub fn export(
        &self,
        claim: ClaimBlock,
        outcomes: &[ProviderOutcome],
        consensus: &ConsensusResult,
        created_at: DateTime<Utc>,
    ) -> ClaimTrustRecord {
        ClaimTrustRecord {
            claim,
            providers: outcomes.iter().map(ProviderResult::from).collect(),
            consensus: ConsensusBlock {
                method: consensus_method(outcomes),
                verdict: consensus.verdict,
                confidence: consensus.confidence,
                balance_score: consensus.balance_score,
                diversity_index: consensus.diversity_index,
                explanation: CONSENSUS_EXPLANATION.to_string(),
            },
            sources: dedup_sources(outcomes),
            audit: AuditBlock {
                created_at,
                version: self.version.clone(),
                signatures: Vec::new(),
            },
        }
    }
}

impl Default for ClaimTrustExporter {
    fn default() -> Self {
        Self::new()
    }
}
