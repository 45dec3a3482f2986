use serde::{Deserialize, Serialize};

/// Result of span extraction for one (paper, candidate conference) pair.
///
/// An empty span with confidence 0.0 is the legitimate "no rationale found"
/// outcome, not an error; the assigner folds it into the fused confidence
/// and may still decline the assignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RationaleResult {
    /// Supporting span, a verbatim substring of the paper text. Empty when
    /// no span cleared the internal threshold.
    pub span: String,
    /// Probability-like confidence in [0, 1], derived from the product of
    /// the model's span-start and span-end probabilities.
    pub confidence: f32,
}

impl RationaleResult {
    /// The "no rationale found" result.
    pub fn none() -> Self {
        Self {
            span: String::new(),
            confidence: 0.0,
        }
    }

    /// Whether a span was found.
    pub fn has_span(&self) -> bool {
        !self.span.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_empty_with_zero_confidence() {
        let r = RationaleResult::none();
        assert!(!r.has_span());
        assert_eq!(r.confidence, 0.0);
    }

    #[test]
    fn serde_roundtrip() {
        let r = RationaleResult {
            span: "a novel contrastive objective".into(),
            confidence: 0.83,
        };
        let serialized = serde_json::to_string(&r).unwrap();
        let deserialized: RationaleResult = serde_json::from_str(&serialized).unwrap();
        assert_eq!(r, deserialized);
    }
}
