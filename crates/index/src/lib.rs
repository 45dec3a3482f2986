//! # Paper Triage Reference Index
//!
//! This crate stores the embeddings of the labeled reference corpus (papers
//! with known target conferences) and answers top-k cosine similarity
//! queries against them. It is the retrieval half of conference assignment:
//! a candidate paper's embedding comes in, the conferences of its nearest
//! reference papers come out.
//!
//! ## Core properties
//!
//! - **Build once, query forever**: [`ReferenceIndex::build`] consumes the
//!   corpus and returns an immutable index. There is no insert/delete API;
//!   rebuilding means building a new index. Because nothing mutates after
//!   build, `query` takes `&self` with no interior locking and the index is
//!   freely shared across worker threads behind an `Arc`.
//! - **Exact by default, approximate at scale**: below
//!   [`AnnConfig::min_entries_for_ann`] every query is an exact linear scan
//!   (deterministic, and the top-1 result is provably the nearest entry).
//!   Larger corpora switch to an HNSW graph built at construction time.
//! - **Deterministic ordering**: results sort by descending similarity;
//!   equal similarities break ties by the insertion order of the reference
//!   entries, so runs are reproducible.
//!
//! ## Failure modes
//!
//! An empty corpus or mixed dimensionality is a configuration bug and fails
//! the build; a bad `k` or a query vector of the wrong width fails the
//! individual query.
//!
//! ## Example
//!
//! ```
//! use refindex::{IndexConfig, ReferenceEntry, ReferenceIndex};
//!
//! let entries = vec![
//!     ReferenceEntry::new("CVPR", vec![1.0, 0.0], "ref-1"),
//!     ReferenceEntry::new("EMNLP", vec![0.0, 1.0], "ref-2"),
//! ];
//! let index = ReferenceIndex::build(entries, IndexConfig::new()).unwrap();
//!
//! let neighbors = index.query(&[0.9, 0.1], 1).unwrap();
//! assert_eq!(neighbors[0].conference, "CVPR");
//! ```

pub mod ann;
mod query;

pub use crate::ann::AnnConfig;
pub use crate::query::NeighborResult;

use crate::ann::AnnGraph;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One labeled reference paper: its conference, embedding, and provenance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferenceEntry {
    /// Conference label this paper was published at.
    pub conference: String,
    /// Embedding vector; must share one dimensionality across the corpus.
    pub vector: Vec<f32>,
    /// Identifier of the source reference paper.
    pub paper_id: String,
}

impl ReferenceEntry {
    pub fn new(
        conference: impl Into<String>,
        vector: Vec<f32>,
        paper_id: impl Into<String>,
    ) -> Self {
        Self {
            conference: conference.into(),
            vector,
            paper_id: paper_id.into(),
        }
    }
}

/// Config for building the index.
#[derive(Clone, Debug, Default)]
pub struct IndexConfig {
    /// ANN (Approximate Nearest Neighbor) configuration. Only engages above
    /// `min_entries_for_ann`; small corpora always scan exactly.
    pub ann: AnnConfig,
}

impl IndexConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ann(mut self, ann: AnnConfig) -> Self {
        self.ann = ann;
        self
    }
}

/// Errors produced by index build and query.
#[derive(Error, Debug, Clone)]
pub enum IndexError {
    /// The reference corpus is empty. A fatal configuration error at build
    /// time, never a per-query condition.
    #[error("reference corpus is empty: the index requires at least one labeled entry")]
    EmptyCorpus,
    /// Vector dimensionality disagreement, either across reference entries
    /// at build time or between a query vector and the index. Signals a
    /// configuration bug and should halt the run.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    /// Malformed query parameters (k of zero, k larger than the corpus).
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// Immutable similarity index over the reference corpus.
///
/// Entry vectors are L2-normalized at build time so cosine similarity
/// reduces to a dot product on the hot path.
#[derive(Debug)]
pub struct ReferenceIndex {
    entries: Vec<ReferenceEntry>,
    dim: usize,
    ann: Option<AnnGraph>,
    cfg: IndexConfig,
}

impl ReferenceIndex {
    /// Build the index from the reference corpus. One-time cost, off the
    /// query hot path.
    pub fn build(mut entries: Vec<ReferenceEntry>, cfg: IndexConfig) -> Result<Self, IndexError> {
        if entries.is_empty() {
            return Err(IndexError::EmptyCorpus);
        }

        let dim = entries[0].vector.len();
        if dim == 0 {
            return Err(IndexError::DimensionMismatch {
                expected: 1,
                got: 0,
            });
        }
        for entry in &entries {
            if entry.vector.len() != dim {
                return Err(IndexError::DimensionMismatch {
                    expected: dim,
                    got: entry.vector.len(),
                });
            }
        }

        // Normalize defensively; upstream embeddings are normalized already
        // but the corpus loader is an external collaborator.
        for entry in &mut entries {
            l2_normalize_in_place(&mut entry.vector);
        }

        let ann = if cfg.ann.should_use_ann(entries.len()) {
            let vectors: Vec<Vec<f32>> = entries.iter().map(|e| e.vector.clone()).collect();
            Some(AnnGraph::build(&vectors, &cfg.ann))
        } else {
            None
        };

        tracing::info!(
            entries = entries.len(),
            dim,
            ann = ann.is_some(),
            "built reference index"
        );

        Ok(Self {
            entries,
            dim,
            ann,
            cfg,
        })
    }

    /// Number of reference entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a successfully built index; kept for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embedding dimensionality the index was built with.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Distinct conference labels present in the corpus.
    pub fn conferences(&self) -> Vec<String> {
        let mut seen = hashbrown::HashSet::new();
        let mut labels = Vec::new();
        for entry in &self.entries {
            if seen.insert(entry.conference.as_str()) {
                labels.push(entry.conference.clone());
            }
        }
        labels
    }

    pub(crate) fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }

    pub(crate) fn ann(&self) -> Option<&AnnGraph> {
        self.ann.as_ref()
    }

    /// Configuration the index was built with.
    pub fn config(&self) -> &IndexConfig {
        &self.cfg
    }
}

/// In-place L2 normalization; zero vectors are left untouched.
fn l2_normalize_in_place(v: &mut [f32]) {
    let norm_sq: f32 = v.iter().map(|x| x * x).sum();
    if norm_sq > 0.0 {
        let inv_norm = norm_sq.sqrt().recip();
        for x in v.iter_mut() {
            *x *= inv_norm;
        }
    }
}
