use once_cell::sync::OnceCell;
use onnxruntime::{environment::Environment, session::Session};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tokenizers::Tokenizer;

use crate::EmbedError;

static ORT_ENV: OnceCell<Environment> = OnceCell::new();

thread_local! {
    static MODEL_CACHE: RefCell<std::collections::HashMap<ModelCacheKey, Rc<CachedModel>>> =
        RefCell::new(std::collections::HashMap::new());
}

#[derive(Hash, PartialEq, Eq, Clone)]
struct ModelCacheKey {
    model_path: PathBuf,
    tokenizer_path: PathBuf,
}

/// Tokenizer plus ONNX session, cached per thread. ONNX sessions are not
/// Sync, so each worker thread pays the load cost once and reuses the
/// handle for every subsequent call.
pub(crate) struct CachedModel {
    pub(crate) tokenizer: Tokenizer,
    pub(crate) session: RefCell<Session<'static>>,
}

impl CachedModel {
    fn load(model_path: &Path, tokenizer_path: &Path) -> Result<Self, EmbedError> {
        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| EmbedError::Inference(e.to_string()))?;

        let env = ort_environment()?;
        let session = env
            .new_session_builder()
            .map_err(|e| EmbedError::Inference(e.to_string()))?
            .with_model_from_file(model_path.to_path_buf())
            .map_err(|e| EmbedError::Inference(e.to_string()))?;

        tracing::info!(model = %model_path.display(), "loaded embedding model");
        Ok(Self {
            tokenizer,
            session: RefCell::new(session),
        })
    }
}

pub(crate) fn get_or_load_model_handle(
    model_path: &Path,
    tokenizer_path: &Path,
) -> Result<Rc<CachedModel>, EmbedError> {
    let key = ModelCacheKey {
        model_path: model_path.to_path_buf(),
        tokenizer_path: tokenizer_path.to_path_buf(),
    };

    MODEL_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if let Some(handle) = cache.get(&key) {
            return Ok(handle.clone());
        }

        let handle = Rc::new(CachedModel::load(model_path, tokenizer_path)?);
        cache.insert(key, handle.clone());
        Ok(handle)
    })
}

fn ort_environment() -> Result<&'static Environment, EmbedError> {
    ORT_ENV.get_or_try_init(|| {
        Environment::builder()
            .with_name("triage-embedding")
            .build()
            .map_err(|e| EmbedError::Inference(e.to_string()))
    })
}
