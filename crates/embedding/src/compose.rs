use crate::TextRecord;

/// Build the encoder input for one paper.
///
/// Title and abstract lead, keywords trail. The tokenizer truncates from the
/// tail at the configured budget, so over-long input loses keywords first,
/// then abstract body — the title always survives.
pub(crate) fn compose_input(record: &TextRecord) -> String {
    let mut out = String::with_capacity(
        record.title.len() + record.abstract_text.len() + 32 * record.keywords.len(),
    );
    push_sentence(&mut out, record.title.trim());
    push_sentence(&mut out, record.abstract_text.trim());

    let keywords = record
        .keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .collect::<Vec<_>>();
    if !keywords.is_empty() {
        out.push(' ');
        out.push_str(&keywords.join(", "));
    }
    out
}

fn push_sentence(out: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !out.is_empty() {
        out.push(' ');
    }
    out.push_str(text);
    if !text.ends_with(['.', '!', '?']) {
        out.push('.');
    }
}
