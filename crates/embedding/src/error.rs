use std::io;
use thiserror::Error;

/// Errors surfaced by the embedding engine.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// The record is missing the required title or abstract text.
    /// Fatal for the record, harmless for the rest of a batch.
    #[error("empty input for record '{0}': title and abstract are required")]
    EmptyInput(String),
    /// The ONNX model file does not exist at the configured path.
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    /// The tokenizer JSON does not exist at the configured path.
    #[error("tokenizer missing: {0}")]
    TokenizerMissing(String),
    /// Configuration is inconsistent (unknown mode, zero token budget, ...).
    #[error("invalid embedding config: {0}")]
    InvalidConfig(String),
    /// Low-level IO failures while touching the filesystem.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// ONNX Runtime or tokenizer failures during inference.
    #[error("inference failure: {0}")]
    Inference(String),
}

impl Clone for EmbedError {
    fn clone(&self) -> Self {
        match self {
            EmbedError::EmptyInput(s) => EmbedError::EmptyInput(s.clone()),
            EmbedError::ModelNotFound(s) => EmbedError::ModelNotFound(s.clone()),
            EmbedError::TokenizerMissing(s) => EmbedError::TokenizerMissing(s.clone()),
            EmbedError::InvalidConfig(s) => EmbedError::InvalidConfig(s.clone()),
            EmbedError::Io(_) => EmbedError::Inference("IO error occurred".to_string()),
            EmbedError::Inference(s) => EmbedError::Inference(s.clone()),
        }
    }
}
