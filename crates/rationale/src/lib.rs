//! Paper Triage Rationale Extraction
//!
//! Once the similarity search has nominated a candidate conference for a
//! paper, this crate answers the follow-up question: *where in the paper is
//! the evidence?* It runs extractive question answering (RoBERTa fine-tuned
//! on SQuAD2 by default) with a fixed question template parameterized by the
//! candidate conference, and returns a verbatim span of the paper's own text
//! plus a confidence probability.
//!
//! "No rationale found" is a first-class outcome: when no span clears the
//! internal score threshold the extractor returns an empty span with
//! confidence 0.0 rather than an error, and the assigner folds that into
//! its accept/decline decision.
//!
//! Papers longer than the model's context window are handled with a
//! deterministic sliding token window (overlapping, max-confidence merge),
//! so the same paper always yields the same rationale.
//!
//! Two modes, mirroring the embedding crate:
//!
//! - **ONNX mode** - local QA model, requires model files.
//! - **Stub mode** - deterministic asset-free extraction for tests.
//!
//! ## Quick example
//!
//! ```
//! use embedding::TextRecord;
//! use rationale::{RationaleConfig, RationaleExtractor};
//!
//! let extractor = RationaleExtractor::new(RationaleConfig::stub()).unwrap();
//! let record = TextRecord::new("p1", "Masked Pretraining", "We study masked objectives.");
//! let result = extractor.extract(&record, "NeurIPS").unwrap();
//! assert!(result.confidence >= 0.0 && result.confidence <= 1.0);
//! ```

pub mod config;
pub mod error;
pub mod types;

mod cache;
mod onnx;
mod stub;
mod window;

pub use crate::config::{RationaleConfig, CONFERENCE_PLACEHOLDER};
pub use crate::error::RationaleError;
pub use crate::types::RationaleResult;

use embedding::TextRecord;

use crate::cache::get_or_load_model_handle;
use crate::onnx::extract_span;
use crate::stub::make_stub_rationale;

/// Rationale extractor: validated configuration plus lazily-loaded QA model
/// state. Construct once, share behind an `Arc`; sessions are cached per
/// thread like the embedding engine's.
#[derive(Debug)]
pub struct RationaleExtractor {
    cfg: RationaleConfig,
}

impl RationaleExtractor {
    /// Validate the configuration and build an extractor. Configuration
    /// problems (unknown mode, stride wider than the window, missing assets,
    /// template without the conference placeholder) fail here, before any
    /// record is processed.
    pub fn new(cfg: RationaleConfig) -> Result<Self, RationaleError> {
        if !cfg.question_template.contains(config::CONFERENCE_PLACEHOLDER) {
            return Err(RationaleError::InvalidConfig(format!(
                "question_template must contain the {} placeholder",
                config::CONFERENCE_PLACEHOLDER
            )));
        }
        if cfg.max_answer_tokens < 2 {
            return Err(RationaleError::InvalidConfig(
                "max_answer_tokens must be at least 2".into(),
            ));
        }
        match cfg.mode.as_str() {
            "stub" => {}
            "onnx" => {
                if cfg.max_sequence_length == 0 {
                    return Err(RationaleError::InvalidConfig(
                        "max_sequence_length must be greater than zero".into(),
                    ));
                }
                if cfg.window_stride >= cfg.max_sequence_length {
                    return Err(RationaleError::InvalidConfig(
                        "window_stride must be smaller than max_sequence_length".into(),
                    ));
                }
                if !cfg.model_path.exists() {
                    return Err(RationaleError::ModelNotFound(
                        cfg.model_path.display().to_string(),
                    ));
                }
                if !cfg.tokenizer_path.exists() {
                    return Err(RationaleError::TokenizerMissing(
                        cfg.tokenizer_path.display().to_string(),
                    ));
                }
            }
            other => {
                return Err(RationaleError::InvalidConfig(format!(
                    "unknown rationale mode '{other}' (expected \"onnx\" or \"stub\")"
                )));
            }
        }
        Ok(Self { cfg })
    }

    pub fn config(&self) -> &RationaleConfig {
        &self.cfg
    }

    /// Extract a supporting span for `candidate_conference` from the paper.
    ///
    /// The context is the paper's full text when the extractor upstream
    /// produced one, otherwise the title and abstract. The returned span is
    /// always a verbatim substring of that context (or empty).
    pub fn extract(
        &self,
        record: &TextRecord,
        candidate_conference: &str,
    ) -> Result<RationaleResult, RationaleError> {
        let context = Self::context_for(record);
        let context = context.trim();
        if context.is_empty() {
            return Ok(RationaleResult::none());
        }

        if self.cfg.mode == "stub" {
            return Ok(make_stub_rationale(context, candidate_conference));
        }

        let question = self.cfg.format_question(candidate_conference);
        let handle = get_or_load_model_handle(&self.cfg.model_path, &self.cfg.tokenizer_path)?;
        let result = extract_span(handle.as_ref(), &question, context, &self.cfg)?;

        tracing::debug!(
            paper = %record.id,
            conference = candidate_conference,
            confidence = result.confidence,
            found = result.has_span(),
            "rationale extraction finished"
        );
        Ok(result)
    }

    /// The text the question is asked against: the full body when available,
    /// else title plus abstract.
    pub fn context_for(record: &TextRecord) -> String {
        if !record.full_text.trim().is_empty() {
            record.full_text.clone()
        } else {
            format!("{} {}", record.title.trim(), record.abstract_text.trim())
                .trim()
                .to_string()
        }
    }
}
