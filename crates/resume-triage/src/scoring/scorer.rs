use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::config::{JobSpec, ScoringConfig};
use crate::matching::{default_synonyms, FormationMatcher, PhraseMatcher, TextNormalizer};

use super::tfidf::SemanticModel;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub keyword: u32,
    pub optional: u32,
    pub formation: u32,
    pub semantic: u32,
    pub total: u32,
}

/// Why a candidate was not approved. Only the first failing condition is
/// recorded, in evaluation order. `StoreFailed` is set after scoring, when
/// an approved file could not be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    NoPositiveHit,
    FormationNotFound,
    NegativeTerm { term: String },
    BelowThreshold { score: u32, threshold: u32 },
    StoreFailed { error: String },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPositiveHit => write!(f, "no positive term found"),
            Self::FormationNotFound => write!(f, "no formation term found"),
            Self::NegativeTerm { term } => write!(f, "negative term '{}' present", term),
            Self::BelowThreshold { score, threshold } => {
                write!(f, "score {} below threshold {}", score, threshold)
            }
            Self::StoreFailed { error } => write!(f, "approved but not stored: {}", error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected(RejectReason),
}

impl Decision {
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }

    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            Self::Approved => None,
            Self::Rejected(reason) => Some(reason),
        }
    }
}

/// Outcome of scoring one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub breakdown: ScoreBreakdown,
    pub decision: Decision,
    pub matched_formations: Vec<String>,
    pub matched_keywords: Vec<String>,
}

/// Scores normalized document text against a job.
///
/// Positive terms are the job title plus the required keywords. Negative
/// terms are always matched exactly; fuzzy matching, when configured, only
/// widens the positive, required and desired lookups.
#[derive(Debug, Clone)]
pub struct CandidateScorer {
    positive: Vec<PhraseMatcher>,
    required: Vec<PhraseMatcher>,
    desired: Vec<PhraseMatcher>,
    negative: Vec<PhraseMatcher>,
    formations: FormationMatcher,
    semantic: SemanticModel,
    threshold: Option<u32>,
    config: ScoringConfig,
}

fn compile(terms: &[String]) -> Vec<PhraseMatcher> {
    terms.iter().filter_map(|t| PhraseMatcher::new(t)).collect()
}

impl CandidateScorer {
    pub fn new(job: &JobSpec, config: &ScoringConfig) -> Self {
        let mut synonyms = default_synonyms();
        synonyms.extend(job.formation_synonyms.clone());

        let mut positive_terms = vec![job.title.clone()];
        positive_terms.extend(job.required_keywords.iter().cloned());

        Self {
            positive: compile(&positive_terms),
            required: compile(&job.required_keywords),
            desired: compile(&job.desired_keywords),
            negative: compile(&job.negative_keywords),
            formations: FormationMatcher::new(&job.formations, &synonyms),
            semantic: SemanticModel::new(&TextNormalizer::new().normalize(&job.description)),
            threshold: job.threshold,
            config: config.clone(),
        }
    }

    fn hit(&self, matcher: &PhraseMatcher, text: &str) -> bool {
        match self.config.fuzzy_threshold {
            Some(threshold) => matcher.is_fuzzy_match(text, threshold),
            None => matcher.is_match(text),
        }
    }

    /// `text` must already be normalized.
    pub fn evaluate(&self, text: &str) -> Evaluation {
        let matched_keywords: Vec<String> = self
            .required
            .iter()
            .filter(|m| self.hit(m, text))
            .map(|m| m.phrase().to_string())
            .collect();
        let desired_hits = self.desired.iter().filter(|m| self.hit(m, text)).count();
        let matched_formations = self.formations.find(text);

        let breakdown = self.breakdown(
            text,
            matched_keywords.len(),
            desired_hits,
            matched_formations.len(),
        );
        let decision = self.decide(text, &breakdown, &matched_formations);

        Evaluation {
            breakdown,
            decision,
            matched_formations,
            matched_keywords,
        }
    }

    fn breakdown(
        &self,
        text: &str,
        required_hits: usize,
        desired_hits: usize,
        formation_hits: usize,
    ) -> ScoreBreakdown {
        let weighted = |hits: usize, weight: u32| {
            u32::try_from(hits)
                .unwrap_or(u32::MAX)
                .saturating_mul(weight)
        };
        let keyword = weighted(required_hits, self.config.required_weight);
        let optional = weighted(desired_hits, self.config.desired_weight);
        let formation = weighted(formation_hits, self.config.formation_weight);

        let semantic = if self.semantic.is_empty() || text.is_empty() {
            0
        } else {
            let tokens = text.unicode_words().count() as f64;
            let raw = self.semantic.similarity(text) * self.config.semantic_weight * tokens;
            if raw.is_finite() && raw > 0.0 {
                (raw.floor().min(f64::from(self.config.semantic_cap))) as u32
            } else {
                0
            }
        };

        let total = keyword
            .saturating_add(optional)
            .saturating_add(formation)
            .saturating_add(semantic)
            .min(self.config.ceiling);

        ScoreBreakdown {
            keyword,
            optional,
            formation,
            semantic,
            total,
        }
    }

    fn decide(
        &self,
        text: &str,
        breakdown: &ScoreBreakdown,
        matched_formations: &[String],
    ) -> Decision {
        if !self.positive.iter().any(|m| self.hit(m, text)) {
            return Decision::Rejected(RejectReason::NoPositiveHit);
        }

        if !self.formations.is_empty() && matched_formations.is_empty() {
            return Decision::Rejected(RejectReason::FormationNotFound);
        }

        if let Some(negative) = self.negative.iter().find(|m| m.is_match(text)) {
            return Decision::Rejected(RejectReason::NegativeTerm {
                term: negative.phrase().to_string(),
            });
        }

        if let Some(threshold) = self.threshold {
            if breakdown.total < threshold {
                return Decision::Rejected(RejectReason::BelowThreshold {
                    score: breakdown.total,
                    threshold,
                });
            }
        }

        Decision::Approved
    }

    pub fn ceiling(&self) -> u32 {
        self.config.ceiling
    }
}
