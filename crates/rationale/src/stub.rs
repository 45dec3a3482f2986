use fxhash::hash64;

use crate::types::RationaleResult;

/// Deterministic stub used when mode is `"stub"`. Returns the leading
/// sentence of the context as the span and a hash-derived confidence, so
/// tests exercise the full decision path without QA model assets.
pub(crate) fn make_stub_rationale(context: &str, conference: &str) -> RationaleResult {
    let trimmed = context.trim();
    if trimmed.is_empty() {
        return RationaleResult::none();
    }

    let sentence_end = trimmed
        .char_indices()
        .find(|&(_, c)| c == '.' || c == '!' || c == '?')
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(trimmed.len());
    let mut cap = sentence_end.min(200);
    while cap > 0 && !trimmed.is_char_boundary(cap) {
        cap -= 1;
    }
    let span = trimmed[..cap].trim().to_string();

    let h = hash64(format!("{conference}\u{1f}{trimmed}").as_bytes());
    let confidence = 0.25 + (h % 1000) as f32 / 2000.0;

    RationaleResult { span, confidence }
}
