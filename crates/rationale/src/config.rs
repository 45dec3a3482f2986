use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Placeholder the question template must contain; replaced per call with
/// the candidate conference label.
pub const CONFERENCE_PLACEHOLDER: &str = "{conference}";

/// Runtime configuration for the rationale extractor: which QA model to
/// load, how to phrase the question, and how to window long papers.
///
/// All values are fixed pipeline configuration, not per-call knobs; two runs
/// with the same config and model produce identical rationales.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RationaleConfig {
    /// Inference mode selector: `"onnx"` (local model) or `"stub"`
    /// (deterministic asset-free extraction for tests).
    pub mode: String,
    /// Friendly label for the QA model.
    pub model_name: String,
    /// Path to the exported ONNX question-answering model.
    pub model_path: PathBuf,
    /// Path to the matching `tokenizer.json`.
    pub tokenizer_path: PathBuf,
    /// Question template; must contain [`CONFERENCE_PLACEHOLDER`].
    pub question_template: String,
    /// Token budget per (question, window) pair.
    pub max_sequence_length: usize,
    /// Token overlap between consecutive context windows.
    pub window_stride: usize,
    /// Longest span the extractor will return, in tokens.
    pub max_answer_tokens: usize,
    /// Spans scoring below this start*end probability come back as the
    /// empty "no rationale found" result.
    pub min_span_score: f32,
}

impl Default for RationaleConfig {
    fn default() -> Self {
        Self {
            mode: "onnx".into(),
            model_name: "roberta-base-squad2".into(),
            model_path: PathBuf::from("./models/roberta-base-squad2/model.onnx"),
            tokenizer_path: PathBuf::from("./models/roberta-base-squad2/tokenizer.json"),
            question_template:
                "What specific technical contributions make this paper relevant to {conference}?"
                    .into(),
            max_sequence_length: 384,
            window_stride: 128,
            max_answer_tokens: 30,
            min_span_score: 0.1,
        }
    }
}

impl RationaleConfig {
    /// Deterministic stub configuration for tests and asset-free runs.
    pub fn stub() -> Self {
        Self {
            mode: "stub".into(),
            ..Default::default()
        }
    }

    /// Instantiate the question for a candidate conference.
    pub fn format_question(&self, conference: &str) -> String {
        self.question_template
            .replace(CONFERENCE_PLACEHOLDER, conference)
    }
}
