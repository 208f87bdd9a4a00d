use std::path::Path;

use llamabridge_abi::{BackendError, InferenceBackend, ModelParams};

use crate::ffi;
use crate::model::LlamaModel;

/// Process-wide llama.cpp entry point.
#[derive(Debug, Default, Clone, Copy)]
pub struct LlamaBackend;

impl LlamaBackend {
    pub const fn new() -> Self {
        Self
    }
}

impl InferenceBackend for LlamaBackend {
    type Model = LlamaModel;

    fn init(&self) {
        ffi::init_backend();
    }

    fn shutdown(&self) {
        ffi::free_backend();
    }

    fn load_model(&self, path: &Path, params: &ModelParams) -> Result<LlamaModel, BackendError> {
        tracing::debug!(path = %path.display(), mmap = params.use_mmap, mlock = params.use_mlock, "loading model");
        let raw = ffi::load_model(path, ffi::model_params(params.use_mmap, params.use_mlock))
            .map_err(BackendError::ModelLoad)?;
        // SAFETY: `raw` was just returned non-null by the loader and is owned by nobody else.
        unsafe { LlamaModel::from_raw(raw) }
    }
}
