//! Source credibility scoring.
//!
//! Averages per-source trust (explicit override or a static per-domain base),
//! adjusted for recency, then rewards the number of distinct domains.
//! Used for display and for the per-outcome trust multiplier in consensus.
//! This is a different measure from the HHI-based diversity index in
//! [`crate::consensus`]: that one measures concentration, this one counts.

use chrono::{DateTime, Duration, Utc};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::types::{normalize_domain, Source};

/// Base trust for domains missing from the table.
pub const DEFAULT_DOMAIN_TRUST: f64 = 0.6;

/// Upper bound of the distinct-domain bonus.
pub const MAX_DIVERSITY_BONUS: f64 = 1.12;

/// Bonus per distinct domain.
pub const DIVERSITY_STEP: f64 = 0.02;

lazy_static! {
    static ref BASE_DOMAIN_TRUST: BTreeMap<&'static str, f64> = BTreeMap::from([
        ("who.int", 0.95),
        ("rki.de", 0.93),
        ("destatis.de", 0.92),
        ("nature.com", 0.92),
        ("europa.eu", 0.90),
        ("science.org", 0.90),
        ("reuters.com", 0.90),
        ("apnews.com", 0.90),
        ("dpa.com", 0.88),
        ("correctiv.org", 0.88),
        ("tagesschau.de", 0.85),
        ("bbc.co.uk", 0.85),
        ("bbc.com", 0.85),
        ("factcheck.org", 0.85),
        ("nytimes.com", 0.82),
        ("zeit.de", 0.80),
        ("spiegel.de", 0.80),
        ("faz.net", 0.80),
        ("sueddeutsche.de", 0.80),
        ("theguardian.com", 0.80),
        ("snopes.com", 0.80),
        ("wikipedia.org", 0.70),
    ]);
}

/// One piece of evidence to score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub domain: String,

    /// Explicit trust, bypassing the domain table
    #[serde(default)]
    pub trust_override: Option<f64>,

    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl EvidenceItem {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: normalize_domain(&domain.into()),
            trust_override: None,
            published_at: None,
        }
    }

    pub fn with_override(mut self, trust: f64) -> Self {
        self.trust_override = Some(trust);
        self
    }

    pub fn published(mut self, at: DateTime<Utc>) -> Self {
        self.published_at = Some(at);
        self
    }
}

impl From<&Source> for EvidenceItem {
    fn from(source: &Source) -> Self {
        EvidenceItem::new(source.domain.clone())
    }
}

/// Multiplier for evidence age relative to `now`.
pub fn recency_multiplier(published_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(published) = published_at else {
        return 1.0;
    };
    let age = now.signed_duration_since(published);

    if age < Duration::days(30) {
        1.05
    } else if age < Duration::days(180) {
        1.02
    } else if age > Duration::days(4 * 365) {
        0.95
    } else {
        1.0
    }
}

/// Aggregates source credibility.
#[derive(Debug, Clone)]
pub struct TrustScorer {
    domain_trust: BTreeMap<String, f64>,
    default_trust: f64,
}

impl TrustScorer {
    /// Scorer backed by the built-in domain table.
    pub fn new() -> Self {
        Self {
            domain_trust: BASE_DOMAIN_TRUST
                .iter()
                .map(|(d, t)| (d.to_string(), *t))
                .collect(),
            default_trust: DEFAULT_DOMAIN_TRUST,
        }
    }

    /// Add or replace base trust for a domain.
    pub fn with_domain_trust(mut self, domain: &str, trust: f64) -> Self {
        self.domain_trust
            .insert(normalize_domain(domain), trust.clamp(0.0, 1.0));
        self
    }

    /// Trust given to domains missing from the table.
    pub fn default_trust(&self) -> f64 {
        self.default_trust
    }

    /// Base trust for a domain. Subdomains inherit from their closest listed
    /// parent, so `de.wikipedia.org` resolves via `wikipedia.org`.
    pub fn base_trust(&self, domain: &str) -> f64 {
        let domain = normalize_domain(domain);
        let mut candidate = domain.as_str();
        loop {
            if let Some(trust) = self.domain_trust.get(candidate) {
                return *trust;
            }
            match candidate.split_once('.') {
                Some((_, parent)) if parent.contains('.') => candidate = parent,
                _ => return self.default_trust,
            }
        }
    }

    /// Trust of one item, before averaging.
    pub fn item_trust(&self, item: &EvidenceItem, now: DateTime<Utc>) -> f64 {
        let base = item
            .trust_override
            .map(|t| t.clamp(0.0, 1.0))
            .unwrap_or_else(|| self.base_trust(&item.domain));
        base * recency_multiplier(item.published_at, now)
    }

    /// Aggregate trust in [0,1]. No evidence scores 0.
    pub fn score(&self, items: &[EvidenceItem], now: DateTime<Utc>) -> f64 {
        if items.is_empty() {
            return 0.0;
        }

        let mean = items
            .iter()
            .map(|item| self.item_trust(item, now))
            .sum::<f64>()
            / items.len() as f64;

        let unique_domains: BTreeSet<&str> = items.iter().map(|i| i.domain.as_str()).collect();
        let bonus = (1.0 + unique_domains.len() as f64 * DIVERSITY_STEP).min(MAX_DIVERSITY_BONUS);

        (mean * bonus).clamp(0.0, 1.0)
    }

    /// Score the sources a provider cited.
    pub fn score_sources(&self, sources: &[Source], now: DateTime<Utc>) -> f64 {
        let items: Vec<EvidenceItem> = sources.iter().map(EvidenceItem::from).collect();
        self.score(&items, now)
    }
}

impl Default for TrustScorer {
    fn default() -> Self {
        Self::new()
    }
}
