use std::io;
use thiserror::Error;

/// Errors surfaced by the rationale extractor.
#[derive(Debug, Error)]
pub enum RationaleError {
    /// The QA model file does not exist at the configured path.
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    /// The tokenizer JSON does not exist at the configured path.
    #[error("tokenizer missing: {0}")]
    TokenizerMissing(String),
    /// Configuration is inconsistent (unknown mode, stride wider than the
    /// window, template without a conference placeholder, ...).
    #[error("invalid rationale config: {0}")]
    InvalidConfig(String),
    /// Low-level IO failures while touching the filesystem.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// ONNX Runtime or tokenizer failures during inference.
    #[error("inference failure: {0}")]
    Inference(String),
}

impl Clone for RationaleError {
    fn clone(&self) -> Self {
        match self {
            RationaleError::ModelNotFound(s) => RationaleError::ModelNotFound(s.clone()),
            RationaleError::TokenizerMissing(s) => RationaleError::TokenizerMissing(s.clone()),
            RationaleError::InvalidConfig(s) => RationaleError::InvalidConfig(s.clone()),
            RationaleError::Io(_) => RationaleError::Inference("IO error occurred".to_string()),
            RationaleError::Inference(s) => RationaleError::Inference(s.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_carries_detail() {
        let err = RationaleError::InvalidConfig("window_stride must be smaller".into());
        assert!(err.to_string().contains("invalid rationale config"));
        assert!(err.to_string().contains("window_stride"));
    }

    #[test]
    fn error_clone_io_converts_to_inference() {
        let err: RationaleError = io::Error::other("test").into();
        let cloned = err.clone();
        assert!(cloned.to_string().contains("IO error occurred"));
    }
}
