use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::{IndexError, ReferenceIndex};

/// Result entry for a similarity query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NeighborResult {
    /// Conference label of the matched reference paper.
    pub conference: String,
    /// Cosine similarity to the query vector, in [-1, 1].
    pub similarity: f32,
    /// Identifier of the matched reference paper.
    pub paper_id: String,
}

impl ReferenceIndex {
    /// Top-k nearest reference entries by cosine similarity.
    ///
    /// Results are sorted by descending similarity; ties break by the
    /// insertion order of the reference entries so repeated runs agree.
    /// `k` must be between 1 and the corpus size.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<NeighborResult>, IndexError> {
        if k == 0 {
            return Err(IndexError::InvalidQuery("k must be at least 1".into()));
        }
        if k > self.len() {
            return Err(IndexError::InvalidQuery(format!(
                "k ({k}) exceeds the reference corpus size ({})",
                self.len()
            )));
        }
        if vector.len() != self.dim() {
            return Err(IndexError::DimensionMismatch {
                expected: self.dim(),
                got: vector.len(),
            });
        }

        let mut scored = match self.ann() {
            Some(graph) => {
                // Oversample so the deterministic tie-break still has the
                // candidates it needs, then rescore exactly.
                let hits = graph.search(vector, (k * 2).min(self.len()));
                let mut scored: Vec<(usize, f32)> = hits
                    .into_iter()
                    .map(|hit| {
                        let entry = &self.entries()[hit.index];
                        (hit.index, cosine_similarity(vector, &entry.vector))
                    })
                    .collect();
                // HNSW can return fewer hits than asked for on degenerate
                // graphs; fall back to the exact scan rather than under-fill.
                if scored.len() < k {
                    scored = self.scan_all(vector);
                }
                scored
            }
            None => self.scan_all(vector),
        };

        scored.sort_unstable_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(idx, similarity)| {
                let entry = &self.entries()[idx];
                NeighborResult {
                    conference: entry.conference.clone(),
                    similarity,
                    paper_id: entry.paper_id.clone(),
                }
            })
            .collect())
    }

    fn scan_all(&self, vector: &[f32]) -> Vec<(usize, f32)> {
        self.entries()
            .iter()
            .enumerate()
            .map(|(idx, entry)| (idx, cosine_similarity(vector, &entry.vector)))
            .collect()
    }
}

/// Cosine similarity between two equal-length vectors, clamped to [-1, 1].
/// Entry vectors are normalized at build time; the query side is normalized
/// here through the norm division, so callers get a true cosine either way.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AnnConfig, IndexConfig, ReferenceEntry};

    fn seed_index(entries: Vec<ReferenceEntry>) -> ReferenceIndex {
        ReferenceIndex::build(entries, IndexConfig::new()).expect("index build")
    }

    #[test]
    fn results_sorted_descending() {
        let index = seed_index(vec![
            ReferenceEntry::new("A", vec![1.0, 0.0, 0.0], "r1"),
            ReferenceEntry::new("B", vec![0.0, 1.0, 0.0], "r2"),
            ReferenceEntry::new("C", vec![0.7, 0.7, 0.0], "r3"),
        ]);

        let hits = index.query(&[1.0, 0.0, 0.0], 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits[0].similarity >= hits[1].similarity);
        assert!(hits[1].similarity >= hits[2].similarity);
        assert_eq!(hits[0].paper_id, "r1");
    }

    #[test]
    fn top1_is_the_global_maximum() {
        let index = seed_index(vec![
            ReferenceEntry::new("A", vec![0.9, 0.1, 0.0], "r1"),
            ReferenceEntry::new("B", vec![0.5, 0.5, 0.0], "r2"),
            ReferenceEntry::new("C", vec![0.0, 0.0, 1.0], "r3"),
        ]);

        let query = [1.0, 0.0, 0.0];
        let top = &index.query(&query, 1).unwrap()[0];
        for hit in index.query(&query, 3).unwrap() {
            assert!(top.similarity >= hit.similarity);
        }
    }

    #[test]
    fn ties_break_by_insertion_order() {
        // Two identical vectors under different labels: the earlier insert
        // must always sort first.
        let index = seed_index(vec![
            ReferenceEntry::new("B", vec![1.0, 0.0], "second-label-first-insert"),
            ReferenceEntry::new("A", vec![1.0, 0.0], "first-label-second-insert"),
            ReferenceEntry::new("C", vec![0.0, 1.0], "other"),
        ]);

        for _ in 0..5 {
            let hits = index.query(&[1.0, 0.0], 2).unwrap();
            assert_eq!(hits[0].paper_id, "second-label-first-insert");
            assert_eq!(hits[1].paper_id, "first-label-second-insert");
            assert!((hits[0].similarity - hits[1].similarity).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn zero_k_rejected() {
        let index = seed_index(vec![ReferenceEntry::new("A", vec![1.0, 0.0], "r1")]);
        let err = index.query(&[1.0, 0.0], 0).expect_err("k=0");
        assert!(matches!(err, IndexError::InvalidQuery(_)));
    }

    #[test]
    fn oversized_k_rejected() {
        let index = seed_index(vec![ReferenceEntry::new("A", vec![1.0, 0.0], "r1")]);
        let err = index.query(&[1.0, 0.0], 2).expect_err("k > len");
        match err {
            IndexError::InvalidQuery(msg) => assert!(msg.contains("exceeds")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn query_dimension_mismatch_rejected() {
        let index = seed_index(vec![ReferenceEntry::new("A", vec![1.0, 0.0], "r1")]);
        let err = index.query(&[1.0, 0.0, 0.0], 1).expect_err("wrong dim");
        match err {
            IndexError::DimensionMismatch { expected, got } => {
                assert_eq!(expected, 2);
                assert_eq!(got, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn similarity_stays_in_range() {
        let index = seed_index(vec![
            ReferenceEntry::new("A", vec![1.0, 0.0], "r1"),
            ReferenceEntry::new("B", vec![-1.0, 0.0], "r2"),
        ]);
        let hits = index.query(&[1.0, 0.0], 2).unwrap();
        for hit in &hits {
            assert!((-1.0..=1.0).contains(&hit.similarity));
        }
        assert!((hits[0].similarity - 1.0).abs() < 1e-6);
        assert!((hits[1].similarity + 1.0).abs() < 1e-6);
    }

    #[test]
    fn unnormalized_query_still_scores_cosine() {
        let index = seed_index(vec![ReferenceEntry::new("A", vec![1.0, 0.0], "r1")]);
        // Magnitude must not matter for cosine.
        let short = index.query(&[0.1, 0.0], 1).unwrap();
        let long = index.query(&[10.0, 0.0], 1).unwrap();
        assert!((short[0].similarity - long[0].similarity).abs() < 1e-6);
    }

    #[test]
    fn ann_path_agrees_with_exact_scan_on_top1() {
        let entries: Vec<ReferenceEntry> = (0..64)
            .map(|i| {
                let angle = i as f32 * 0.09;
                ReferenceEntry::new(
                    if i % 2 == 0 { "A" } else { "B" },
                    vec![angle.cos(), angle.sin(), 0.1],
                    format!("r{i}"),
                )
            })
            .collect();

        let exact = ReferenceIndex::build(
            entries.clone(),
            IndexConfig::new().with_ann(AnnConfig::default().with_enabled(false)),
        )
        .unwrap();
        let approx = ReferenceIndex::build(
            entries,
            IndexConfig::new().with_ann(AnnConfig::default().with_min_entries_for_ann(16)),
        )
        .unwrap();

        let query = [0.95f32, 0.05, 0.1];
        let exact_top = &exact.query(&query, 1).unwrap()[0];
        let approx_top = &approx.query(&query, 1).unwrap()[0];
        assert_eq!(exact_top.paper_id, approx_top.paper_id);
    }

    #[test]
    fn concurrent_queries_share_the_index() {
        use std::sync::Arc;

        let entries: Vec<ReferenceEntry> = (0..16)
            .map(|i| {
                let angle = i as f32 * 0.4;
                ReferenceEntry::new("A", vec![angle.cos(), angle.sin()], format!("r{i}"))
            })
            .collect();
        let index = Arc::new(seed_index(entries));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let index = Arc::clone(&index);
                std::thread::spawn(move || {
                    let angle = t as f32 * 0.4;
                    let hits = index.query(&[angle.cos(), angle.sin()], 3).unwrap();
                    assert_eq!(hits.len(), 3);
                    hits[0].paper_id.clone()
                })
            })
            .collect();

        for (t, handle) in handles.into_iter().enumerate() {
            let top = handle.join().expect("query thread");
            assert_eq!(top, format!("r{t}"));
        }
    }
}
