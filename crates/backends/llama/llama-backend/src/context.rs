// crates/backends/llama/llama-backend/src/context.rs
//
// Owning context handle. All pointer-level work is delegated to ffi::context.

use std::ptr::NonNull;
use std::sync::Arc;

use llama_cpp_sys_2::llama_context;
use llamabridge_abi::{BackendError, Context};

use crate::batch::LlamaBatch;
use crate::ffi::context as cffi;
use crate::model::ModelHandle;

/// Decode state bound to one model. Holds the model alive until dropped.
pub struct LlamaContext {
    ctx: NonNull<llama_context>,
    n_ctx: u32,
    // Dropped after `ctx` is freed (see Drop).
    _model: Arc<ModelHandle>,
}

impl LlamaContext {
    /// # Safety
    /// `ctx` must be a fresh context created from `model`.
    pub(crate) unsafe fn from_raw(ctx: NonNull<llama_context>, model: Arc<ModelHandle>) -> Self {
        let n_ctx = cffi::n_ctx(ctx.as_ptr());
        tracing::debug!(n_ctx, "context created");
        Self {
            ctx,
            n_ctx,
            _model: model,
        }
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut llama_context {
        self.ctx.as_ptr()
    }
}

impl Context for LlamaContext {
    type Batch = LlamaBatch;

    fn n_ctx(&self) -> u32 {
        self.n_ctx
    }

    fn new_batch(&self, capacity: usize) -> LlamaBatch {
        LlamaBatch::new(capacity)
    }

    fn decode(&mut self, batch: &LlamaBatch) -> Result<(), BackendError> {
        let rc = unsafe { cffi::decode(self.as_ptr(), batch.raw()) };
        if rc != 0 {
            return Err(BackendError::Decode(rc));
        }
        Ok(())
    }
}

impl Drop for LlamaContext {
    fn drop(&mut self) {
        unsafe { cffi::free_context(self.ctx.as_ptr()) };
    }
}

// SAFETY: a context is only ever used through `&mut self` from one thread at a
// time; moving it between threads is fine for llama.cpp.
unsafe impl Send for LlamaContext {}
