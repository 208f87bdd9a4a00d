// crates/backends/llama/llama-backend/src/ffi/context.rs
//
// Context construction, decode and teardown.

use std::ptr::NonNull;

use llama_cpp_sys_2::{
    llama_batch, llama_context, llama_context_default_params, llama_context_params, llama_decode,
    llama_free, llama_init_from_model, llama_model, llama_n_ctx,
};

use super::trace;

/// Upstream defaults with window and thread counts applied. The batch limit
/// follows the window so a whole prompt fits in one decode.
pub fn context_params(n_ctx: u32, n_threads: i32, n_threads_batch: i32) -> llama_context_params {
    let mut p = unsafe { llama_context_default_params() };
    p.n_ctx = n_ctx;
    p.n_batch = p.n_batch.max(n_ctx);
    p.n_threads = n_threads;
    p.n_threads_batch = n_threads_batch;
    p
}

/// # Safety
/// `model` must be a live model handle that outlives the context.
pub unsafe fn create_context(
    model: *mut llama_model,
    params: llama_context_params,
) -> Result<NonNull<llama_context>, String> {
    trace(&format!("llama_init_from_model(n_ctx={})", params.n_ctx));
    let ptr = llama_init_from_model(model, params);
    NonNull::new(ptr).ok_or_else(|| "llama_init_from_model returned null".into())
}

/// # Safety
/// `ctx` must be live.
#[inline]
pub unsafe fn n_ctx(ctx: *mut llama_context) -> u32 {
    llama_n_ctx(ctx)
}

/// Returns llama.cpp's status code; 0 is success.
///
/// # Safety
/// `ctx` must be live and `batch` fully initialized for its `n_tokens`.
#[inline]
pub unsafe fn decode(ctx: *mut llama_context, batch: llama_batch) -> i32 {
    llama_decode(ctx, batch)
}

/// # Safety
/// `ctx` must be live; it is dangling afterwards.
pub unsafe fn free_context(ctx: *mut llama_context) {
    trace("llama_free(context)");
    llama_free(ctx);
}
