use embedding::EmbedError;
use rationale::{RationaleError, RationaleResult};
use refindex::IndexError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Policy for turning the top-k neighbor list into one candidate conference
/// plus a similarity confidence in [0, 1].
///
/// Pluggable so deployments can trade robustness (weighted vote) against
/// interpretability (top-1) without touching the engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LabelVote {
    /// Sum the non-negative similarities per label and pick the argmax;
    /// confidence is the winner's share of the total. The default.
    #[default]
    WeightedSum,
    /// Count neighbors per label; confidence is the winner's vote fraction.
    /// Similarity only breaks ties.
    Majority,
    /// Take the single nearest neighbor; confidence is its similarity
    /// clamped to [0, 1].
    TopOne,
}

/// Weights for fusing the similarity confidence with the rationale
/// confidence into the overall decision score.
///
/// `overall = (similarity * s + rationale * r) / (similarity + rationale)`,
/// which is monotonic in both inputs for non-negative weights. The exact
/// split is a tuning decision, not a law; 0.6/0.4 favors the retrieval
/// signal the way the reference corpus was curated for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FusionWeights {
    pub similarity: f32,
    pub rationale: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            similarity: 0.6,
            rationale: 0.4,
        }
    }
}

impl FusionWeights {
    /// Weighted average of the two confidence signals.
    pub fn combine(&self, similarity_confidence: f32, rationale_confidence: f32) -> f32 {
        let total = self.similarity + self.rationale;
        if total <= 0.0 {
            return 0.0;
        }
        (self.similarity * similarity_confidence + self.rationale * rationale_confidence) / total
    }
}

/// Configuration for the assigner engine. Fixed at construction; per-record
/// calls take no knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssignConfig {
    /// Number of reference neighbors consulted per paper.
    #[serde(default = "AssignConfig::default_k")]
    pub k: usize,
    /// How neighbor labels are aggregated into one candidate.
    #[serde(default)]
    pub vote: LabelVote,
    /// Confidence fusion weights.
    #[serde(default)]
    pub fusion: FusionWeights,
    /// Papers scoring below this publishability probability are rejected
    /// before any retrieval or rationale work happens.
    #[serde(default = "AssignConfig::default_publishability_threshold")]
    pub publishability_threshold: f32,
    /// Minimum fused confidence for an assignment; the boundary is
    /// inclusive (a score exactly at the threshold is accepted).
    #[serde(default = "AssignConfig::default_acceptance_threshold")]
    pub acceptance_threshold: f32,
    /// Cap on concurrently in-flight records during batch runs.
    #[serde(default = "AssignConfig::default_workers")]
    pub workers: usize,
}

impl AssignConfig {
    pub(crate) fn default_k() -> usize {
        5
    }

    pub(crate) fn default_publishability_threshold() -> f32 {
        0.5
    }

    pub(crate) fn default_acceptance_threshold() -> f32 {
        0.5
    }

    pub(crate) fn default_workers() -> usize {
        4
    }

    /// Validate the configuration. Called by the engine constructor so a
    /// bad config never reaches the per-record path.
    pub fn validate(&self) -> Result<(), AssignError> {
        if self.k == 0 {
            return Err(AssignError::InvalidConfig("k must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(AssignError::InvalidConfig(
                "workers must be at least 1".into(),
            ));
        }
        for (name, value) in [
            ("publishability_threshold", self.publishability_threshold),
            ("acceptance_threshold", self.acceptance_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AssignError::InvalidConfig(format!(
                    "{name} must be within [0.0, 1.0]"
                )));
            }
        }
        if self.fusion.similarity < 0.0 || self.fusion.rationale < 0.0 {
            return Err(AssignError::InvalidConfig(
                "fusion weights must be non-negative".into(),
            ));
        }
        if self.fusion.similarity + self.fusion.rationale <= 0.0 {
            return Err(AssignError::InvalidConfig(
                "at least one fusion weight must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for AssignConfig {
    fn default() -> Self {
        Self {
            k: Self::default_k(),
            vote: LabelVote::default(),
            fusion: FusionWeights::default(),
            publishability_threshold: Self::default_publishability_threshold(),
            acceptance_threshold: Self::default_acceptance_threshold(),
            workers: Self::default_workers(),
        }
    }
}

/// Terminal decision for one paper.
///
/// Three legitimate shapes: not publishable; publishable with an assigned
/// conference and rationale; publishable but inconclusive (no conference
/// cleared the acceptance threshold). Inconclusive is a valid outcome, not
/// a failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Decision {
    /// Identifier of the decided paper.
    pub paper_id: String,
    /// Publishability verdict from the external classifier gate.
    pub is_publishable: bool,
    /// Assigned conference; present only when publishable and the fused
    /// confidence reached the acceptance threshold.
    pub assigned_conference: Option<String>,
    /// Supporting rationale; present exactly when a conference is assigned.
    pub rationale: Option<RationaleResult>,
    /// Fused confidence for publishable papers; the raw publishability
    /// probability for rejected ones.
    pub overall_confidence: f32,
}

/// Errors produced by the assignment engine.
#[derive(Debug, Error)]
pub enum AssignError {
    /// Invalid engine configuration.
    #[error("invalid assigner config: {0}")]
    InvalidConfig(String),
    /// The publishability gate could not score the record.
    #[error("publishability error: {0}")]
    Publishability(String),
    /// Embedding stage failed.
    #[error("embedding error: {0}")]
    Embed(#[from] EmbedError),
    /// Index query failed.
    #[error("index error: {0}")]
    Index(#[from] IndexError),
    /// Rationale stage failed.
    #[error("rationale error: {0}")]
    Rationale(#[from] RationaleError),
    /// Batch plumbing failed (worker pool, joining tasks).
    #[error("pipeline error: {0}")]
    Pipeline(String),
}

impl AssignError {
    /// Whether this error signals a configuration bug that should halt a
    /// whole batch rather than skip a single record.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AssignError::InvalidConfig(_) | AssignError::Index(IndexError::DimensionMismatch { .. })
        )
    }
}
