use onnxruntime::ndarray::Array;
use tokenizers::Tokenizer;

use crate::cache::CachedModel;
use crate::config::RationaleConfig;
use crate::types::RationaleResult;
use crate::window::plan_windows;
use crate::RationaleError;

/// RoBERTa-style pair encoding spends four special tokens around question
/// and context; budgeted up front when sizing context windows.
const SPECIAL_TOKEN_BUDGET: usize = 4;

/// Run extractive QA for one (question, context) pair.
///
/// The context is tokenized once, split into overlapping windows sized to
/// leave room for the question, and each window is scored independently.
/// The highest-confidence span across windows wins; on equal confidence the
/// earlier window wins, so the result is deterministic. A best span below
/// `min_span_score` yields the empty result.
pub(crate) fn extract_span(
    handle: &CachedModel,
    question: &str,
    context: &str,
    cfg: &RationaleConfig,
) -> Result<RationaleResult, RationaleError> {
    let context_encoding = handle
        .tokenizer
        .encode(context, false)
        .map_err(|e| RationaleError::Inference(e.to_string()))?;
    let context_offsets = context_encoding.get_offsets().to_vec();
    if context_offsets.is_empty() {
        return Ok(RationaleResult::none());
    }

    let question_tokens = handle
        .tokenizer
        .encode(question, false)
        .map_err(|e| RationaleError::Inference(e.to_string()))?
        .get_ids()
        .len();

    let window_budget = cfg
        .max_sequence_length
        .saturating_sub(question_tokens + SPECIAL_TOKEN_BUDGET);
    if window_budget == 0 {
        return Err(RationaleError::InvalidConfig(format!(
            "question consumes the entire {}-token window",
            cfg.max_sequence_length
        )));
    }

    let windows = plan_windows(context_offsets.len(), window_budget, cfg.window_stride);

    let mut best: Option<(f32, String)> = None;
    for window in windows {
        let byte_start = context_offsets[window.start].0;
        let byte_end = context_offsets[window.end - 1].1;
        if byte_start >= byte_end || byte_end > context.len() {
            continue;
        }
        let window_text = &context[byte_start..byte_end];

        let scored = score_window(handle, question, window_text, cfg)?;
        if let Some((confidence, span)) = scored {
            // Strictly greater: the earliest window keeps ties, which makes
            // the merge order-independent of how many windows follow.
            let replace = match &best {
                Some((best_conf, _)) => confidence > *best_conf,
                None => true,
            };
            if replace {
                best = Some((confidence, span));
            }
        }
    }

    match best {
        Some((confidence, span)) if confidence >= cfg.min_span_score => Ok(RationaleResult {
            span,
            confidence: confidence.clamp(0.0, 1.0),
        }),
        _ => Ok(RationaleResult::none()),
    }
}

/// Score one context window; returns the best (confidence, span text) pair
/// or `None` when the window has no usable candidate positions.
fn score_window(
    handle: &CachedModel,
    question: &str,
    window_text: &str,
    cfg: &RationaleConfig,
) -> Result<Option<(f32, String)>, RationaleError> {
    let encoding = handle
        .tokenizer
        .encode((question, window_text), true)
        .map_err(|e| RationaleError::Inference(e.to_string()))?;

    let mut ids: Vec<i64> = encoding.get_ids().iter().map(|&x| x as i64).collect();
    let mut mask: Vec<i64> = encoding
        .get_attention_mask()
        .iter()
        .map(|&x| x as i64)
        .collect();
    let sequence_ids = encoding.get_sequence_ids();
    let offsets = encoding.get_offsets();

    if ids.len() > cfg.max_sequence_length {
        ids.truncate(cfg.max_sequence_length);
        mask.truncate(cfg.max_sequence_length);
    }
    let seq_len = ids.len();
    if seq_len == 0 {
        return Ok(None);
    }

    // Candidate positions: context tokens (second sequence) that are real
    // input, not padding or specials, and carry a non-empty byte range.
    let context_positions: Vec<usize> = (0..seq_len)
        .filter(|&i| {
            mask[i] == 1
                && sequence_ids.get(i).copied().flatten() == Some(1)
                && offsets[i].0 < offsets[i].1
        })
        .collect();
    if context_positions.is_empty() {
        return Ok(None);
    }

    let (start_logits, end_logits) = run_qa_session(handle, ids, mask)?;
    let start_probs = softmax_over(&start_logits, &context_positions);
    let end_probs = softmax_over(&end_logits, &context_positions);

    let best = best_span(
        &start_probs,
        &end_probs,
        &context_positions,
        cfg.max_answer_tokens,
    );

    Ok(best.and_then(|(start_tok, end_tok, score)| {
        let span_start = offsets[start_tok].0;
        let span_end = offsets[end_tok].1;
        if span_start >= span_end || span_end > window_text.len() {
            return None;
        }
        Some((score, window_text[span_start..span_end].to_string()))
    }))
}

/// Softmax restricted to the allowed positions; all other positions get
/// probability zero. Max-subtraction keeps the exponentials finite.
pub(crate) fn softmax_over(logits: &[f32], allowed: &[usize]) -> Vec<f32> {
    let mut probs = vec![0.0f32; logits.len()];
    if allowed.is_empty() {
        return probs;
    }

    let max_logit = allowed
        .iter()
        .map(|&i| logits[i])
        .fold(f32::NEG_INFINITY, f32::max);
    let mut denom = 0.0f32;
    for &i in allowed {
        let e = (logits[i] - max_logit).exp();
        probs[i] = e;
        denom += e;
    }
    if denom > 0.0 {
        for &i in allowed {
            probs[i] /= denom;
        }
    }
    probs
}

/// Pick the best (start, end) token pair among context positions.
///
/// Requires end > start (spans of at least two tokens) and bounds the span
/// at `max_answer_tokens`. The score is the product of start and end
/// probabilities; strict comparison keeps the earliest maximum so the choice
/// is deterministic.
pub(crate) fn best_span(
    start_probs: &[f32],
    end_probs: &[f32],
    context_positions: &[usize],
    max_answer_tokens: usize,
) -> Option<(usize, usize, f32)> {
    let mut best: Option<(usize, usize, f32)> = None;

    for (i, &start_tok) in context_positions.iter().enumerate() {
        let p_start = start_probs[start_tok];
        if p_start <= 0.0 {
            continue;
        }
        for &end_tok in context_positions.iter().skip(i + 1) {
            if end_tok - start_tok + 1 > max_answer_tokens {
                break;
            }
            let score = p_start * end_probs[end_tok];
            let replace = match best {
                Some((_, _, best_score)) => score > best_score,
                None => score > 0.0,
            };
            if replace {
                best = Some((start_tok, end_tok, score));
            }
        }
    }

    best
}

fn run_qa_session(
    handle: &CachedModel,
    ids: Vec<i64>,
    mask: Vec<i64>,
) -> Result<(Vec<f32>, Vec<f32>), RationaleError> {
    let seq_len = ids.len();
    let input_ids = Array::from_shape_vec((1, seq_len), ids)
        .map_err(|e| RationaleError::Inference(e.to_string()))?;
    let attn_mask = Array::from_shape_vec((1, seq_len), mask)
        .map_err(|e| RationaleError::Inference(e.to_string()))?;

    let mut guard = handle.session.borrow_mut();
    let session_ref = &mut *guard;
    let mut runtime_inputs = Vec::with_capacity(session_ref.inputs.len());
    let mut input_ids_tensor = Some(input_ids);
    let mut attn_mask_tensor = Some(attn_mask);

    for input in &session_ref.inputs {
        match input.name.as_str() {
            "input_ids" => {
                let tensor = input_ids_tensor.take().ok_or_else(|| {
                    RationaleError::InvalidConfig(
                        "model requested `input_ids` multiple times".into(),
                    )
                })?;
                runtime_inputs.push(tensor.into_dyn());
            }
            "attention_mask" => {
                let tensor = attn_mask_tensor.take().ok_or_else(|| {
                    RationaleError::InvalidConfig(
                        "model requested `attention_mask` multiple times".into(),
                    )
                })?;
                runtime_inputs.push(tensor.into_dyn());
            }
            "token_type_ids" => {
                let tensor = Array::from_elem((1, seq_len), 0_i64);
                runtime_inputs.push(tensor.into_dyn());
            }
            other => {
                return Err(RationaleError::Inference(format!(
                    "unsupported model input '{other}'"
                )))
            }
        }
    }

    if runtime_inputs.is_empty() {
        return Err(RationaleError::Inference(
            "model did not declare any inputs".into(),
        ));
    }

    let outputs = session_ref
        .run::<i64, f32, _>(runtime_inputs)
        .map_err(|e| RationaleError::Inference(e.to_string()))?;
    if outputs.len() < 2 {
        return Err(RationaleError::Inference(format!(
            "QA model returned {} outputs, expected start and end logits",
            outputs.len()
        )));
    }

    let start_logits: Vec<f32> = outputs[0].iter().copied().collect();
    let end_logits: Vec<f32> = outputs[1].iter().copied().collect();

    if start_logits.len() < seq_len || end_logits.len() < seq_len {
        return Err(RationaleError::Inference(format!(
            "QA logits shorter than the {seq_len}-token input"
        )));
    }

    Ok((start_logits, end_logits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_sums_to_one_over_allowed() {
        let logits = vec![1.0, 2.0, 3.0, 4.0];
        let allowed = vec![1, 2];
        let probs = softmax_over(&logits, &allowed);
        assert_eq!(probs[0], 0.0);
        assert_eq!(probs[3], 0.0);
        let total: f32 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(probs[2] > probs[1]);
    }

    #[test]
    fn softmax_handles_large_logits() {
        let logits = vec![1000.0, 1001.0];
        let probs = softmax_over(&logits, &[0, 1]);
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!(probs[1] > probs[0]);
    }

    #[test]
    fn softmax_empty_allowed_is_all_zero() {
        let probs = softmax_over(&[1.0, 2.0], &[]);
        assert_eq!(probs, vec![0.0, 0.0]);
    }

    #[test]
    fn best_span_picks_peak_pair() {
        // Positions 2..=5 are context; start peaks at 3, end at 5.
        let start = vec![0.0, 0.0, 0.1, 0.7, 0.1, 0.1];
        let end = vec![0.0, 0.0, 0.1, 0.1, 0.2, 0.6];
        let positions = vec![2, 3, 4, 5];
        let (s, e, score) = best_span(&start, &end, &positions, 30).unwrap();
        assert_eq!((s, e), (3, 5));
        assert!((score - 0.42).abs() < 1e-6);
    }

    #[test]
    fn best_span_requires_two_tokens() {
        // The single best end equals the best start; with end > start
        // enforced the pair (3, 3) is never produced.
        let start = vec![0.0, 0.0, 0.0, 0.9, 0.1];
        let end = vec![0.0, 0.0, 0.0, 0.9, 0.1];
        let positions = vec![2, 3, 4];
        let (s, e, _) = best_span(&start, &end, &positions, 30).unwrap();
        assert!(e > s);
    }

    #[test]
    fn best_span_respects_answer_length_cap() {
        let start = vec![0.9, 0.0, 0.0, 0.0, 0.0];
        let end = vec![0.0, 0.0, 0.0, 0.0, 0.9];
        let positions = vec![0, 1, 2, 3, 4];
        // Cap of 3 tokens: the 5-token span [0, 4] is out of reach.
        let best = best_span(&start, &end, &positions, 3);
        if let Some((s, e, _)) = best {
            assert!(e - s + 1 <= 3);
        }
    }

    #[test]
    fn best_span_none_when_no_positive_mass() {
        let start = vec![0.0, 0.0];
        let end = vec![0.0, 0.0];
        let best = best_span(&start, &end, &[0, 1], 30);
        assert!(best.is_none());
    }

    #[test]
    fn best_span_ties_keep_earliest() {
        // Two equally-scored candidate pairs; the earlier one must win.
        let start = vec![0.5, 0.0, 0.5, 0.0];
        let end = vec![0.0, 0.5, 0.0, 0.5];
        let positions = vec![0, 1, 2, 3];
        let (s, e, _) = best_span(&start, &end, &positions, 30).unwrap();
        assert_eq!((s, e), (0, 1));
    }
}
