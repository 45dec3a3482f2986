use serde::{Deserialize, Serialize};

/// Normalized paper text as produced by the upstream PDF extraction and
/// cleanup stage. Immutable once created; the pipeline never edits it.
///
/// `title` and `abstract_text` are required for embedding; `keywords` and
/// `full_text` are optional enrichments (the rationale stage prefers
/// `full_text` when present).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextRecord {
    /// Stable identifier of the paper (file stem, submission id, ...).
    pub id: String,
    /// Paper title.
    pub title: String,
    /// Paper abstract.
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    /// Author keywords, possibly empty.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Full body text when the extractor produced one; empty otherwise.
    #[serde(default)]
    pub full_text: String,
}

impl TextRecord {
    /// Build a record from the required fields.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        abstract_text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            abstract_text: abstract_text.into(),
            keywords: Vec::new(),
            full_text: String::new(),
        }
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_full_text(mut self, full_text: impl Into<String>) -> Self {
        self.full_text = full_text.into();
        self
    }

    /// Whether the record carries the fields the embedding stage requires.
    pub fn has_required_fields(&self) -> bool {
        !self.title.trim().is_empty() && !self.abstract_text.trim().is_empty()
    }
}

/// Embedding output for a single paper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaperEmbedding {
    /// Identifier of the embedded paper.
    pub paper_id: String,
    /// Final embedding values (either model output or deterministic stub).
    pub vector: Vec<f32>,
    /// Name of the model used to produce the vector.
    pub model_name: String,
    /// Dimension of `vector`.
    pub dim: usize,
    /// Whether [`vector`](Self::vector) was L2-normalized.
    pub normalized: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_required_fields() {
        let rec = TextRecord::new("p1", "Attention Is All You Need", "We propose ...");
        assert!(rec.has_required_fields());

        let blank_title = TextRecord::new("p2", "   ", "We propose ...");
        assert!(!blank_title.has_required_fields());

        let blank_abstract = TextRecord::new("p3", "Title", "");
        assert!(!blank_abstract.has_required_fields());
    }

    #[test]
    fn record_builders() {
        let rec = TextRecord::new("p1", "t", "a")
            .with_keywords(vec!["vision".into(), "detection".into()])
            .with_full_text("body text");
        assert_eq!(rec.keywords.len(), 2);
        assert_eq!(rec.full_text, "body text");
    }

    #[test]
    fn record_serde_renames_abstract() {
        let rec = TextRecord::new("p1", "t", "a");
        let json = serde_json::to_value(&rec).unwrap();
        assert!(json.get("abstract").is_some());
        assert!(json.get("abstract_text").is_none());

        let parsed: TextRecord =
            serde_json::from_str(r#"{"id":"p2","title":"t","abstract":"a"}"#).unwrap();
        assert_eq!(parsed.abstract_text, "a");
        assert!(parsed.keywords.is_empty());
        assert!(parsed.full_text.is_empty());
    }

    #[test]
    fn embedding_serde_roundtrip() {
        let emb = PaperEmbedding {
            paper_id: "p1".into(),
            vector: vec![0.1, 0.2, 0.3],
            model_name: "scibert_scivocab_uncased".into(),
            dim: 3,
            normalized: true,
        };
        let serialized = serde_json::to_string(&emb).unwrap();
        let deserialized: PaperEmbedding = serde_json::from_str(&serialized).unwrap();
        assert_eq!(emb, deserialized);
    }
}
