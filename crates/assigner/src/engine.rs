use std::collections::HashMap;
use std::sync::Arc;

use embedding::{EmbeddingEngine, PaperEmbedding, TextRecord};
use rationale::{RationaleExtractor, RationaleResult};
use refindex::{NeighborResult, ReferenceIndex};
use tokio::sync::Semaphore;

use crate::types::{AssignConfig, AssignError, Decision, LabelVote};


/// Publishability gate. The binary classifier itself lives outside the core
/// pipeline; implementations adapt whatever probability source the
/// deployment has (a model service, a precomputed column, a constant for
/// experiments).
pub trait PublishabilityScorer: Send + Sync {
    fn score(&self, record: &TextRecord) -> Result<f32, AssignError>;
}

/// Embedding stage seam. [`EmbeddingEngine`] is the production
/// implementation; tests substitute counting or fixed-vector fakes.
pub trait EmbedStage: Send + Sync {
    fn embed(&self, record: &TextRecord) -> Result<PaperEmbedding, AssignError>;
}

/// Rationale stage seam. [`RationaleExtractor`] is the production
/// implementation.
pub trait RationaleStage: Send + Sync {
    fn extract(
        &self,
        record: &TextRecord,
        conference: &str,
    ) -> Result<RationaleResult, AssignError>;
}

impl EmbedStage for EmbeddingEngine {
    fn embed(&self, record: &TextRecord) -> Result<PaperEmbedding, AssignError> {
        Ok(EmbeddingEngine::embed(self, record)?)
    }
}

impl RationaleStage for RationaleExtractor {
    fn extract(
        &self,
        record: &TextRecord,
        conference: &str,
    ) -> Result<RationaleResult, AssignError> {
        Ok(RationaleExtractor::extract(self, record, conference)?)
    }
}

/// Publishability scores provided up front, keyed by record id, with an
/// optional fallback for records not in the map.
pub struct ProvidedScores {
    scores: HashMap<String, f32>,
    fallback: Option<f32>,
}

impl ProvidedScores {
    pub fn new(scores: HashMap<String, f32>) -> Self {
        Self {
            scores,
            fallback: None,
        }
    }

    /// One probability for every record; convenient for experiments.
    pub fn uniform(probability: f32) -> Self {
        Self {
            scores: HashMap::new(),
            fallback: Some(probability),
        }
    }

    pub fn with_fallback(mut self, probability: f32) -> Self {
        self.fallback = Some(probability);
        self
    }
}

impl PublishabilityScorer for ProvidedScores {
    fn score(&self, record: &TextRecord) -> Result<f32, AssignError> {
        self.scores
            .get(&record.id)
            .copied()
            .or(self.fallback)
            .ok_or_else(|| {
                AssignError::Publishability(format!(
                    "no publishability score provided for record '{}'",
                    record.id
                ))
            })
    }
}

/// Conference assignment engine.
///
/// Owns nothing mutable: the stages and the index are shared read-only
/// handles, so the engine is cheap to clone and safe to call from any
/// number of workers at once.
#[derive(Clone)]
pub struct Assigner {
    scorer: Arc<dyn PublishabilityScorer>,
    embedder: Arc<dyn EmbedStage>,
    index: Arc<ReferenceIndex>,
    extractor: Arc<dyn RationaleStage>,
    cfg: AssignConfig,
}

impl std::fmt::Debug for Assigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assigner")
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

impl Assigner {
    /// Wire the stages together. Fails fast on configuration problems,
    /// including a `k` the reference corpus cannot satisfy.
    pub fn new(
        scorer: Arc<dyn PublishabilityScorer>,
        embedder: Arc<dyn EmbedStage>,
        index: Arc<ReferenceIndex>,
        extractor: Arc<dyn RationaleStage>,
        cfg: AssignConfig,
    ) -> Result<Self, AssignError> {
        cfg.validate()?;
        if cfg.k > index.len() {
            return Err(AssignError::InvalidConfig(format!(
                "k ({}) exceeds the reference corpus size ({})",
                cfg.k,
                index.len()
            )));
        }
        Ok(Self {
            scorer,
            embedder,
            index,
            extractor,
            cfg,
        })
    }

    pub fn config(&self) -> &AssignConfig {
        &self.cfg
    }

    /// Decide one paper.
    ///
    /// Sequential by design: the publishability gate runs first and skips
    /// all retrieval and rationale work for rejected papers; a failure in
    /// any stage aborts the record with a typed error and discards the
    /// partial results. No retries happen here.
    pub fn assign(&self, record: &TextRecord) -> Result<Decision, AssignError> {
        let publishability = self.scorer.score(record)?;
        if publishability < self.cfg.publishability_threshold {
            tracing::debug!(paper = %record.id, publishability, "rejected at publishability gate");
            return Ok(Decision {
                paper_id: record.id.clone(),
                is_publishable: false,
                assigned_conference: None,
                rationale: None,
                overall_confidence: publishability.clamp(0.0, 1.0),
            });
        }

        let embedded = self.embedder.embed(record)?;
        let neighbors = self.index.query(&embedded.vector, self.cfg.k)?;

        let Some((candidate, similarity_confidence)) =
            aggregate_neighbors(&neighbors, self.cfg.vote)
        else {
            // Nothing in the corpus pulled toward any label; publishable
            // but inconclusive.
            return Ok(Decision {
                paper_id: record.id.clone(),
                is_publishable: true,
                assigned_conference: None,
                rationale: None,
                overall_confidence: 0.0,
            });
        };

        let rationale = self.extractor.extract(record, &candidate)?;
        let overall_confidence = self
            .cfg
            .fusion
            .combine(similarity_confidence, rationale.confidence)
            .clamp(0.0, 1.0);

        tracing::debug!(
            paper = %record.id,
            candidate = %candidate,
            similarity_confidence,
            rationale_confidence = rationale.confidence,
            overall_confidence,
            "fused assignment confidence"
        );

        if overall_confidence >= self.cfg.acceptance_threshold {
            Ok(Decision {
                paper_id: record.id.clone(),
                is_publishable: true,
                assigned_conference: Some(candidate),
                rationale: Some(rationale),
                overall_confidence,
            })
        } else {
            Ok(Decision {
                paper_id: record.id.clone(),
                is_publishable: true,
                assigned_conference: None,
                rationale: None,
                overall_confidence,
            })
        }
    }

    /// Decide a batch of papers under the configured worker cap.
    ///
    /// Records are independent: per-record failures are logged with the
    /// record id and excluded from the output, which keeps one malformed
    /// paper from sinking the batch. Configuration-level failures
    /// (dimension mismatch, invalid config) abort the whole batch instead —
    /// every subsequent record would fail the same way. Output order
    /// follows input order regardless of completion order.
    pub async fn assign_batch(
        &self,
        records: Vec<TextRecord>,
    ) -> Result<Vec<Decision>, AssignError> {
        let total = records.len();
        let semaphore = Arc::new(Semaphore::new(self.cfg.workers));
        let mut handles = Vec::with_capacity(total);

        for (position, record) in records.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let engine = self.clone();
            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            position,
                            record.id.clone(),
                            Err(AssignError::Pipeline("worker pool closed".into())),
                        )
                    }
                };
                let record_id = record.id.clone();
                let result = tokio::task::spawn_blocking(move || engine.assign(&record))
                    .await
                    .unwrap_or_else(|e| Err(AssignError::Pipeline(e.to_string())));
                (position, record_id, result)
            }));
        }

        let mut indexed = Vec::with_capacity(total);
        for handle in handles {
            let (position, record_id, result) = handle
                .await
                .map_err(|e| AssignError::Pipeline(e.to_string()))?;
            match result {
                Ok(decision) => indexed.push((position, decision)),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    tracing::warn!(record = %record_id, error = %err, "record excluded from batch");
                }
            }
        }

        indexed.sort_by_key(|(position, _)| *position);
        tracing::info!(
            total,
            decided = indexed.len(),
            excluded = total - indexed.len(),
            "batch assignment finished"
        );
        Ok(indexed.into_iter().map(|(_, decision)| decision).collect())
    }
}

/// Collapse the neighbor list into one candidate label plus a similarity
/// confidence in [0, 1], under the configured vote policy.
///
/// Returns `None` when no label has positive similarity mass — retrieval
/// found nothing pulling toward any conference, which the engine maps to
/// the inconclusive decision.
fn aggregate_neighbors(neighbors: &[NeighborResult], vote: LabelVote) -> Option<(String, f32)> {
    if neighbors.is_empty() {
        return None;
    }

    match vote {
        LabelVote::TopOne => {
            let top = &neighbors[0];
            if top.similarity <= 0.0 {
                return None;
            }
            Some((top.conference.clone(), top.similarity.clamp(0.0, 1.0)))
        }
        LabelVote::WeightedSum => {
            // First-seen order keeps the argmax tie-break deterministic.
            let mut sums: Vec<(&str, f32)> = Vec::new();
            for n in neighbors {
                let weight = n.similarity.max(0.0);
                match sums.iter_mut().find(|(label, _)| *label == n.conference) {
                    Some((_, sum)) => *sum += weight,
                    None => sums.push((n.conference.as_str(), weight)),
                }
            }
            let total: f32 = sums.iter().map(|(_, sum)| *sum).sum();
            if total <= 0.0 {
                return None;
            }
            let mut best: Option<(&str, f32)> = None;
            for &(label, sum) in &sums {
                // Strict comparison: equal sums keep the earlier label.
                if best.map_or(true, |(_, b)| sum > b) {
                    best = Some((label, sum));
                }
            }
            let (label, best_sum) = best?;
            Some((label.to_string(), (best_sum / total).clamp(0.0, 1.0)))
        }
        LabelVote::Majority => {
            struct Tally<'a> {
                label: &'a str,
                count: usize,
                positive_sum: f32,
            }
            let mut tallies: Vec<Tally> = Vec::new();
            for n in neighbors {
                match tallies.iter_mut().find(|t| t.label == n.conference) {
                    Some(t) => {
                        t.count += 1;
                        t.positive_sum += n.similarity.max(0.0);
                    }
                    None => tallies.push(Tally {
                        label: n.conference.as_str(),
                        count: 1,
                        positive_sum: n.similarity.max(0.0),
                    }),
                }
            }
            let mut winner: Option<&Tally> = None;
            for t in &tallies {
                let better = match winner {
                    None => true,
                    // Ties on count fall back to similarity mass; full ties
                    // keep the earlier label.
                    Some(best) => {
                        t.count > best.count
                            || (t.count == best.count && t.positive_sum > best.positive_sum)
                    }
                };
                if better {
                    winner = Some(t);
                }
            }
            let winner = winner?;
            if winner.positive_sum <= 0.0 {
                return None;
            }
            Some((
                winner.label.to_string(),
                (winner.count as f32 / neighbors.len() as f32).clamp(0.0, 1.0),
            ))
        }
    }
}
