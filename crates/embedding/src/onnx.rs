use onnxruntime::ndarray::{Array, Array2};
use tokenizers::Tokenizer;

use crate::cache::CachedModel;
use crate::EmbedError;

/// Run the encoder over a batch of composed inputs and return one vector per
/// input.
///
/// Sequences longer than `max_sequence_length` are truncated at the token
/// level; shorter ones are padded. The encoder's token-level output is mean
/// pooled with the attention mask so padding never contributes, matching the
/// pooling the reference corpus was embedded with.
pub(crate) fn run_embeddings<T>(
    handle: &CachedModel,
    texts: &[T],
    max_sequence_length: usize,
) -> Result<Vec<Vec<f32>>, EmbedError>
where
    T: AsRef<str>,
{
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let (encoded, max_len) = encode_documents(&handle.tokenizer, texts, max_sequence_length)?;
    let (input_ids, attn_mask) = build_padded_arrays(encoded, max_len)?;
    execute_session(handle, input_ids, attn_mask)
}

struct EncodedDoc {
    ids: Vec<i64>,
    mask: Vec<i64>,
}

fn encode_documents<T>(
    tokenizer: &Tokenizer,
    texts: &[T],
    max_sequence_length: usize,
) -> Result<(Vec<EncodedDoc>, usize), EmbedError>
where
    T: AsRef<str>,
{
    let mut encoded = Vec::with_capacity(texts.len());
    let mut max_len = 0usize;

    for text in texts {
        let encoding = tokenizer
            .encode(text.as_ref(), true)
            .map_err(|e| EmbedError::Inference(e.to_string()))?;
        let ids: Vec<i64> = encoding.get_ids().iter().map(|&x| x as i64).collect();
        let mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&x| x as i64)
            .collect();
        max_len = max_len.max(ids.len());
        encoded.push(EncodedDoc { ids, mask });
    }

    // Cap max_len at the configured budget; anything beyond it is dropped
    // from the tail (composed input puts keywords last on purpose).
    max_len = max_len.min(max_sequence_length);

    for doc in &mut encoded {
        if doc.ids.len() > max_sequence_length {
            doc.ids.truncate(max_sequence_length);
            doc.mask.truncate(max_sequence_length);
        }
    }

    Ok((encoded, max_len))
}

fn build_padded_arrays(
    encoded: Vec<EncodedDoc>,
    max_len: usize,
) -> Result<(Array2<i64>, Array2<i64>), EmbedError> {
    let seq_len = max_len.max(1);
    let batch = encoded.len();
    let mut id_storage = Vec::with_capacity(batch * seq_len);
    let mut mask_storage = Vec::with_capacity(batch * seq_len);

    for EncodedDoc { ids, mask } in encoded {
        if ids.len() != mask.len() {
            return Err(EmbedError::Inference(
                "tokenizer produced mismatched id/mask lengths".into(),
            ));
        }
        let len = ids.len();
        let pad = seq_len.saturating_sub(len);
        id_storage.extend(ids);
        mask_storage.extend(mask);
        if pad > 0 {
            id_storage.extend(std::iter::repeat(0).take(pad));
            mask_storage.extend(std::iter::repeat(0).take(pad));
        }
    }

    let input_ids = Array::from_shape_vec((batch, seq_len), id_storage)
        .map_err(|e| EmbedError::Inference(e.to_string()))?;
    let attn_mask = Array::from_shape_vec((batch, seq_len), mask_storage)
        .map_err(|e| EmbedError::Inference(e.to_string()))?;
    Ok((input_ids, attn_mask))
}

fn execute_session(
    handle: &CachedModel,
    input_ids: Array2<i64>,
    attn_mask: Array2<i64>,
) -> Result<Vec<Vec<f32>>, EmbedError> {
    let (batch, seq_len) = input_ids.dim();
    // Keep the mask on the Rust side for pooling; the session consumes its copy.
    let mask_values: Vec<i64> = attn_mask.iter().copied().collect();

    let mut guard = handle.session.borrow_mut();
    let session_ref = &mut *guard;
    let mut runtime_inputs = Vec::with_capacity(session_ref.inputs.len());
    let mut input_ids_tensor = Some(input_ids);
    let mut attn_mask_tensor = Some(attn_mask);

    for input in &session_ref.inputs {
        match input.name.as_str() {
            "input_ids" => {
                let tensor = input_ids_tensor.take().ok_or_else(|| {
                    EmbedError::InvalidConfig("model requested `input_ids` multiple times".into())
                })?;
                runtime_inputs.push(tensor.into_dyn());
            }
            "attention_mask" => {
                let tensor = attn_mask_tensor.take().ok_or_else(|| {
                    EmbedError::InvalidConfig(
                        "model requested `attention_mask` multiple times".into(),
                    )
                })?;
                runtime_inputs.push(tensor.into_dyn());
            }
            "token_type_ids" => {
                let tensor = Array::from_elem((batch, seq_len), 0_i64);
                runtime_inputs.push(tensor.into_dyn());
            }
            other => {
                return Err(EmbedError::Inference(format!(
                    "unsupported model input '{other}'"
                )))
            }
        }
    }

    if runtime_inputs.is_empty() {
        return Err(EmbedError::Inference(
            "model did not declare any inputs".into(),
        ));
    }

    let outputs = session_ref
        .run::<i64, f32, _>(runtime_inputs)
        .map_err(|e| EmbedError::Inference(e.to_string()))?;
    let output_tensor = outputs
        .into_iter()
        .next()
        .ok_or_else(|| EmbedError::Inference("model returned no outputs".into()))?;

    let flat: Vec<f32> = output_tensor.iter().copied().collect();
    if flat.is_empty() {
        return Err(EmbedError::Inference("model returned empty output".into()));
    }

    pool_hidden_states(&flat, &mask_values, batch, seq_len)
}

/// Reduce the encoder output to one vector per batch row.
///
/// Token-level output `[batch, seq, hidden]` is mean pooled under the
/// attention mask. Some exports bake the pooling into the graph and emit
/// `[batch, hidden]` directly; those pass through unchanged.
fn pool_hidden_states(
    flat: &[f32],
    mask: &[i64],
    batch: usize,
    seq_len: usize,
) -> Result<Vec<Vec<f32>>, EmbedError> {
    if batch == 0 {
        return Ok(Vec::new());
    }

    if flat.len() % (batch * seq_len) == 0 {
        let hidden = flat.len() / (batch * seq_len);
        let mut vectors = Vec::with_capacity(batch);
        for i in 0..batch {
            let mut pooled = vec![0.0f32; hidden];
            let mut token_count = 0.0f32;
            for j in 0..seq_len {
                if mask[i * seq_len + j] == 0 {
                    continue;
                }
                let offset = (i * seq_len + j) * hidden;
                for (d, p) in pooled.iter_mut().enumerate() {
                    *p += flat[offset + d];
                }
                token_count += 1.0;
            }
            if token_count > 0.0 {
                for p in &mut pooled {
                    *p /= token_count;
                }
            }
            vectors.push(pooled);
        }
        return Ok(vectors);
    }

    // Already-pooled export: one row of `hidden` values per batch entry.
    if flat.len() % batch == 0 {
        let chunk = flat.len() / batch;
        return Ok(flat.chunks(chunk).map(|slice| slice.to_vec()).collect());
    }

    Err(EmbedError::Inference(format!(
        "model output of {} values is not divisible by batch size {}",
        flat.len(),
        batch
    )))
}
