use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Runtime configuration for the embedding engine: which encoder to load and
/// how to post-process its vectors.
///
/// # Example
/// ```no_run
/// use embedding::{EmbeddingConfig, EmbeddingEngine};
///
/// let cfg = EmbeddingConfig {
///     model_path: "./models/scibert_scivocab_uncased/model.onnx".into(),
///     tokenizer_path: "./models/scibert_scivocab_uncased/tokenizer.json".into(),
///     ..Default::default()
/// };
/// let engine = EmbeddingEngine::new(cfg).unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Inference mode selector: `"onnx"` (local model) or `"stub"`
    /// (deterministic hash-derived vectors, no assets required).
    pub mode: String,
    /// Friendly label surfaced on every [`PaperEmbedding`](crate::PaperEmbedding).
    pub model_name: String,
    /// Path to the exported ONNX encoder.
    pub model_path: PathBuf,
    /// Path to the matching `tokenizer.json`.
    pub tokenizer_path: PathBuf,
    /// Token budget per paper. Longer input is truncated, never rejected;
    /// the composed input puts title and abstract first so trailing
    /// keywords are what truncation drops.
    pub max_sequence_length: usize,
    /// Vector width of the stub mode. Matches SciBERT's hidden size so
    /// stub and real vectors are interchangeable dimension-wise.
    pub stub_dim: usize,
    /// Normalize vectors to unit length (required for cosine similarity
    /// downstream; leave on unless you know why you are turning it off).
    pub normalize: bool,
    /// Compute device (currently only `"cpu"` is implemented; the field
    /// keeps the config forward-compatible).
    pub device: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            mode: "onnx".into(),
            model_name: "scibert_scivocab_uncased".into(),
            model_path: PathBuf::from("./models/scibert_scivocab_uncased/model.onnx"),
            tokenizer_path: PathBuf::from("./models/scibert_scivocab_uncased/tokenizer.json"),
            max_sequence_length: 512,
            stub_dim: 768,
            normalize: true,
            device: "cpu".into(),
        }
    }
}

impl EmbeddingConfig {
    /// Deterministic stub configuration for tests and asset-free runs.
    pub fn stub() -> Self {
        Self {
            mode: "stub".into(),
            ..Default::default()
        }
    }
}
