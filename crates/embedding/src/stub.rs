use fxhash::hash64;

use crate::normalize::l2_normalize_in_place;
use crate::{EmbeddingConfig, PaperEmbedding};

/// Deterministic stub used when mode is `"stub"`. Generates sinusoid values
/// derived from a hash of the input text to guarantee reproducible vectors
/// with minimal CPU cost and no model assets.
pub(crate) fn make_stub_embedding(
    paper_id: &str,
    text: &str,
    cfg: &EmbeddingConfig,
) -> PaperEmbedding {
    let dim = cfg.stub_dim.max(1);
    let mut v = vec![0f32; dim];
    let h = hash64(text.as_bytes());
    for (idx, value) in v.iter_mut().enumerate() {
        *value = ((h >> (idx % 32)) as f32 * 0.0001).sin();
    }
    if cfg.normalize {
        l2_normalize_in_place(&mut v);
    }
    PaperEmbedding {
        paper_id: paper_id.to_string(),
        vector: v,
        model_name: cfg.model_name.clone(),
        dim,
        normalized: cfg.normalize,
    }
}
