//! Paper Triage Embeddings
//!
//! This crate turns normalized paper text into meaning-aware vectors. Given a
//! [`TextRecord`] (title, abstract, optional keywords), it produces a dense
//! embedding you can use for the reference-corpus similarity search that
//! drives conference assignment.
//!
//! Two modes:
//!
//! - **ONNX mode** - Run a scientific-domain encoder (SciBERT by default)
//!   locally. Requires model files.
//! - **Stub mode** - For testing. Generates fake but consistent vectors with
//!   no assets on disk.
//!
//! Unlike a general-purpose embedder, this one is strict about its input: a
//! record without a usable title and abstract is rejected with
//! [`EmbedError::EmptyInput`] rather than silently embedded as noise. Longer
//! text, on the other hand, is truncated (keywords drop off first), never
//! rejected.
//!
//! ## Threading notes
//!
//! Tokenizers and ONNX sessions get cached per-thread. First call on any
//! thread does the expensive setup. After that, it's fast. The engine itself
//! is cheap to share behind an `Arc`.
//!
//! ## Quick example
//!
//! ```
//! use embedding::{EmbeddingConfig, EmbeddingEngine, TextRecord};
//!
//! let engine = EmbeddingEngine::new(EmbeddingConfig::stub()).unwrap();
//! let record = TextRecord::new("p1", "Sparse Attention", "We study sparse attention ...");
//! let emb = engine.embed(&record).unwrap();
//! assert_eq!(emb.dim, 768);
//! ```

pub mod config;
pub mod error;
pub mod types;

mod cache;
mod compose;
mod normalize;
mod onnx;
mod stub;

pub use crate::config::EmbeddingConfig;
pub use crate::error::EmbedError;
pub use crate::types::{PaperEmbedding, TextRecord};

use crate::cache::get_or_load_model_handle;
use crate::compose::compose_input;
use crate::normalize::l2_normalize_in_place;
use crate::onnx::run_embeddings;
use crate::stub::make_stub_embedding;

/// Embedding engine: validated configuration plus lazily-loaded model state.
///
/// Construct once at pipeline startup and share (`Arc`) across workers; the
/// underlying session is cached per thread. Construction fails fast on
/// configuration problems (unknown mode, missing assets) so a misconfigured
/// deployment never reaches the per-record path.
#[derive(Debug)]
pub struct EmbeddingEngine {
    cfg: EmbeddingConfig,
}

impl EmbeddingEngine {
    /// Validate the configuration and build an engine.
    pub fn new(cfg: EmbeddingConfig) -> Result<Self, EmbedError> {
        match cfg.mode.as_str() {
            "stub" => {}
            "onnx" => {
                if cfg.max_sequence_length == 0 {
                    return Err(EmbedError::InvalidConfig(
                        "max_sequence_length must be greater than zero".into(),
                    ));
                }
                if !cfg.model_path.exists() {
                    return Err(EmbedError::ModelNotFound(
                        cfg.model_path.display().to_string(),
                    ));
                }
                if !cfg.tokenizer_path.exists() {
                    return Err(EmbedError::TokenizerMissing(
                        cfg.tokenizer_path.display().to_string(),
                    ));
                }
            }
            other => {
                return Err(EmbedError::InvalidConfig(format!(
                    "unknown embedding mode '{other}' (expected \"onnx\" or \"stub\")"
                )));
            }
        }
        Ok(Self { cfg })
    }

    pub fn config(&self) -> &EmbeddingConfig {
        &self.cfg
    }

    /// Embedding dimensionality this engine produces.
    ///
    /// For stub mode this is exact; for ONNX mode it reflects the configured
    /// expectation and the first real inference confirms it.
    pub fn dim(&self) -> usize {
        self.cfg.stub_dim
    }

    /// Embed a single record.
    ///
    /// Fails with [`EmbedError::EmptyInput`] when title or abstract is
    /// missing; everything else about the input is accepted and truncated to
    /// the token budget as needed.
    pub fn embed(&self, record: &TextRecord) -> Result<PaperEmbedding, EmbedError> {
        if !record.has_required_fields() {
            return Err(EmbedError::EmptyInput(record.id.clone()));
        }

        let text = compose_input(record);
        if self.cfg.mode == "stub" {
            return Ok(make_stub_embedding(&record.id, &text, &self.cfg));
        }

        let handle = get_or_load_model_handle(&self.cfg.model_path, &self.cfg.tokenizer_path)?;
        let texts = [text.as_str()];
        let mut vectors = run_embeddings(handle.as_ref(), &texts, self.cfg.max_sequence_length)?;
        let mut vector = vectors
            .pop()
            .ok_or_else(|| EmbedError::Inference("model returned no outputs".into()))?;

        if self.cfg.normalize {
            l2_normalize_in_place(&mut vector);
        }
        let dim = vector.len();

        Ok(PaperEmbedding {
            paper_id: record.id.clone(),
            vector,
            model_name: self.cfg.model_name.clone(),
            dim,
            normalized: self.cfg.normalize,
        })
    }

    /// Batch variant of [`embed`](Self::embed). ONNX mode shares the cached
    /// session and executes a single padded inference so callers pay the
    /// setup cost only once per batch.
    pub fn embed_batch(&self, records: &[TextRecord]) -> Result<Vec<PaperEmbedding>, EmbedError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        for record in records {
            if !record.has_required_fields() {
                return Err(EmbedError::EmptyInput(record.id.clone()));
            }
        }

        let texts: Vec<String> = records.iter().map(compose_input).collect();

        if self.cfg.mode == "stub" {
            return Ok(records
                .iter()
                .zip(&texts)
                .map(|(record, text)| make_stub_embedding(&record.id, text, &self.cfg))
                .collect());
        }

        let handle = get_or_load_model_handle(&self.cfg.model_path, &self.cfg.tokenizer_path)?;
        let vectors = run_embeddings(handle.as_ref(), &texts, self.cfg.max_sequence_length)?;
        if vectors.len() != records.len() {
            return Err(EmbedError::Inference(format!(
                "model returned {} embeddings for {} inputs",
                vectors.len(),
                records.len()
            )));
        }

        let mut results = Vec::with_capacity(records.len());
        for (record, mut vector) in records.iter().zip(vectors.into_iter()) {
            if self.cfg.normalize {
                l2_normalize_in_place(&mut vector);
            }
            let dim = vector.len();
            results.push(PaperEmbedding {
                paper_id: record.id.clone(),
                vector,
                model_name: self.cfg.model_name.clone(),
                dim,
                normalized: self.cfg.normalize,
            });
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn stub_engine() -> EmbeddingEngine {
        EmbeddingEngine::new(EmbeddingConfig::stub()).expect("stub engine")
    }

    fn record(id: &str, title: &str, abstract_text: &str) -> TextRecord {
        TextRecord::new(id, title, abstract_text)
    }

    #[test]
    fn unknown_mode_rejected_at_construction() {
        let cfg = EmbeddingConfig {
            mode: "remote".into(),
            ..Default::default()
        };
        let err = EmbeddingEngine::new(cfg).expect_err("mode should be rejected");
        assert!(matches!(err, EmbedError::InvalidConfig(_)));
    }

    #[test]
    fn missing_model_rejected_at_construction() {
        let cfg = EmbeddingConfig {
            model_path: PathBuf::from("./missing/model.onnx"),
            tokenizer_path: PathBuf::from("./missing/tokenizer.json"),
            ..Default::default()
        };
        let err = EmbeddingEngine::new(cfg).expect_err("missing assets should fail fast");
        assert!(matches!(err, EmbedError::ModelNotFound(_)));
    }

    #[test]
    fn empty_title_is_a_record_error() {
        let engine = stub_engine();
        let err = engine
            .embed(&record("p1", "  ", "an abstract"))
            .expect_err("blank title");
        match err {
            EmbedError::EmptyInput(id) => assert_eq!(id, "p1"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_abstract_is_a_record_error() {
        let engine = stub_engine();
        let err = engine
            .embed(&record("p2", "a title", ""))
            .expect_err("blank abstract");
        assert!(matches!(err, EmbedError::EmptyInput(_)));
    }

    #[test]
    fn stub_embedding_deterministic() {
        let engine = stub_engine();
        let rec = record("p1", "Sparse Attention", "We study sparse attention.");
        let e1 = engine.embed(&rec).unwrap();
        let e2 = engine.embed(&rec).unwrap();
        assert_eq!(e1.vector, e2.vector);
    }

    #[test]
    fn stub_embedding_unit_norm() {
        let engine = stub_engine();
        let emb = engine
            .embed(&record("p1", "Title", "Abstract text"))
            .unwrap();
        let norm: f32 = emb.vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4, "expected unit norm, got {norm}");
    }

    #[test]
    fn different_papers_embed_differently() {
        let engine = stub_engine();
        let e1 = engine
            .embed(&record("p1", "Graph Networks", "Message passing on graphs."))
            .unwrap();
        let e2 = engine
            .embed(&record("p2", "Speech Synthesis", "Neural vocoders."))
            .unwrap();
        assert_ne!(e1.vector, e2.vector);
    }

    #[test]
    fn keywords_change_the_embedding() {
        let engine = stub_engine();
        let base = record("p1", "Title", "Abstract");
        let with_kw = base.clone().with_keywords(vec!["robotics".into()]);
        let e1 = engine.embed(&base).unwrap();
        let e2 = engine.embed(&with_kw).unwrap();
        assert_ne!(e1.vector, e2.vector);
    }

    #[test]
    fn batch_empty_input() {
        let engine = stub_engine();
        let embeddings = engine.embed_batch(&[]).unwrap();
        assert!(embeddings.is_empty());
    }

    #[test]
    fn batch_preserves_order_and_ids() {
        let engine = stub_engine();
        let records = vec![
            record("first", "A", "one"),
            record("second", "B", "two"),
            record("third", "C", "three"),
        ];
        let embeddings = engine.embed_batch(&records).unwrap();
        assert_eq!(embeddings.len(), 3);
        assert_eq!(embeddings[0].paper_id, "first");
        assert_eq!(embeddings[1].paper_id, "second");
        assert_eq!(embeddings[2].paper_id, "third");
    }

    #[test]
    fn batch_rejects_invalid_record_before_inference() {
        let engine = stub_engine();
        let records = vec![record("ok", "A", "one"), record("bad", "", "two")];
        let err = engine.embed_batch(&records).expect_err("bad record");
        match err {
            EmbedError::EmptyInput(id) => assert_eq!(id, "bad"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn batch_matches_single_calls() {
        let engine = stub_engine();
        let records = vec![record("p1", "A", "one"), record("p2", "B", "two")];
        let batched = engine.embed_batch(&records).unwrap();
        for (rec, emb) in records.iter().zip(&batched) {
            let single = engine.embed(rec).unwrap();
            assert_eq!(single.vector, emb.vector);
        }
    }

    #[test]
    #[ignore = "requires local ONNX + tokenizer assets under models/"]
    fn real_model_inference() {
        let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        let workspace_root = manifest_dir
            .parent()
            .and_then(|p| p.parent())
            .expect("workspace root");

        let cfg = EmbeddingConfig {
            model_path: workspace_root
                .join("models")
                .join("scibert_scivocab_uncased")
                .join("model.onnx"),
            tokenizer_path: workspace_root
                .join("models")
                .join("scibert_scivocab_uncased")
                .join("tokenizer.json"),
            ..Default::default()
        };

        let engine = EmbeddingEngine::new(cfg).expect("engine with real model");
        let emb = engine
            .embed(&record(
                "p1",
                "Deep Residual Learning",
                "We present residual networks.",
            ))
            .expect("inference should succeed with real model");

        assert!(emb.dim > 0 && !emb.vector.is_empty());
        let norm: f32 = emb.vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }
}
