// crates/backends/llama/llama-backend/src/model.rs
//
// Owning wrapper around `llama_model*`. Contexts keep the handle alive
// through a shared reference count, so the weights can't be freed under them.

use std::ptr::NonNull;
use std::sync::Arc;

use llama_cpp_sys_2::llama_model;
use llamabridge_abi::{BackendError, ChatTurn, ContextParams, Model, SamplerStage};

use crate::context::LlamaContext;
use crate::ffi;
use crate::ffi::context as cffi;
use crate::ffi::model as mffi;
use crate::format;
use crate::sampling::LlamaSampler;
use crate::vocab::LlamaVocab;

pub(crate) struct ModelHandle {
    // Borrowed from the model; llama.cpp frees it together with the weights.
    vocab: LlamaVocab,
    ptr: NonNull<llama_model>,
}

impl ModelHandle {
    #[inline]
    pub(crate) fn as_ptr(&self) -> *mut llama_model {
        self.ptr.as_ptr()
    }
}

impl Drop for ModelHandle {
    fn drop(&mut self) {
        unsafe { ffi::free_model(self.ptr.as_ptr()) };
    }
}

// SAFETY: llama.cpp models are immutable after load; contexts are created
// from them but all mutable decode state lives in LlamaContext.
unsafe impl Send for ModelHandle {}
unsafe impl Sync for ModelHandle {}

/// Loaded weights plus their vocabulary.
pub struct LlamaModel {
    inner: Arc<ModelHandle>,
}

impl LlamaModel {
    /// Take ownership of a loaded model.
    ///
    /// # Safety
    /// `raw` must be a live model handle not owned by anything else.
    pub unsafe fn from_raw(raw: NonNull<llama_model>) -> Result<Self, BackendError> {
        let Some(vocab) = mffi::vocab(raw.as_ptr()) else {
            ffi::free_model(raw.as_ptr());
            return Err(BackendError::ModelLoad("model has no vocabulary".into()));
        };
        Ok(Self {
            inner: Arc::new(ModelHandle {
                vocab: LlamaVocab::from_raw(vocab),
                ptr: raw,
            }),
        })
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut llama_model {
        self.inner.as_ptr()
    }
}

impl Model for LlamaModel {
    type Vocab = LlamaVocab;
    type Context = LlamaContext;
    type Sampler = LlamaSampler;

    fn vocab(&self) -> &LlamaVocab {
        &self.inner.vocab
    }

    fn chat_template(&self) -> Option<String> {
        unsafe { mffi::chat_template(self.as_ptr()) }
    }

    fn apply_chat_template(
        &self,
        template: &str,
        turns: &[ChatTurn],
        add_assistant: bool,
        buf: &mut [u8],
    ) -> i32 {
        format::render(template, turns, add_assistant, buf)
    }

    fn new_context(&self, params: &ContextParams) -> Result<LlamaContext, BackendError> {
        let raw = cffi::context_params(params.n_ctx, params.n_threads, params.n_threads_batch);
        let ctx = unsafe { cffi::create_context(self.as_ptr(), raw) }
            .map_err(BackendError::ContextInit)?;
        // SAFETY: fresh handle from llama_init_from_model on this model.
        Ok(unsafe { LlamaContext::from_raw(ctx, self.inner.clone()) })
    }

    fn new_sampler(&self, stages: &[SamplerStage]) -> Result<LlamaSampler, BackendError> {
        LlamaSampler::new(stages)
    }
}
