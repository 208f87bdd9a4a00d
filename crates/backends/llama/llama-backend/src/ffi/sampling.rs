// crates/backends/llama/llama-backend/src/ffi/sampling.rs
//
// llama_sampler_* chain construction and use.

use std::ptr::NonNull;

use llama_cpp_sys_2::{
    llama_context, llama_sampler, llama_sampler_accept, llama_sampler_chain_add,
    llama_sampler_chain_default_params, llama_sampler_chain_init, llama_sampler_free,
    llama_sampler_init_dist, llama_sampler_init_greedy, llama_sampler_init_temp,
    llama_sampler_init_top_p, llama_sampler_sample,
};
use llamabridge_abi::SamplerStage;

use super::trace;

/// Build a chain with `stages` in order. The chain owns every stage.
pub fn build_chain(stages: &[SamplerStage]) -> Result<NonNull<llama_sampler>, String> {
    let mut params = unsafe { llama_sampler_chain_default_params() };
    params.no_perf = true;
    let chain = NonNull::new(unsafe { llama_sampler_chain_init(params) })
        .ok_or_else(|| "llama_sampler_chain_init returned null".to_string())?;

    for stage in stages {
        let s = unsafe {
            match *stage {
                SamplerStage::TopP { p, min_keep } => llama_sampler_init_top_p(p, min_keep),
                SamplerStage::Temperature(t) => llama_sampler_init_temp(t),
                SamplerStage::Greedy => llama_sampler_init_greedy(),
                SamplerStage::Distribution { seed } => llama_sampler_init_dist(seed),
            }
        };
        if s.is_null() {
            unsafe { llama_sampler_free(chain.as_ptr()) };
            return Err(format!("sampler stage {stage:?} returned null"));
        }
        unsafe { llama_sampler_chain_add(chain.as_ptr(), s) };
    }
    trace(&format!("sampler chain built: {stages:?}"));
    Ok(chain)
}

/// # Safety
/// Both handles must be live; `idx` must be a logits slot of the last decode.
#[inline]
pub unsafe fn sample(smpl: *mut llama_sampler, ctx: *mut llama_context, idx: i32) -> i32 {
    llama_sampler_sample(smpl, ctx, idx)
}

/// # Safety
/// `smpl` must be live.
#[inline]
pub unsafe fn accept(smpl: *mut llama_sampler, token: i32) {
    llama_sampler_accept(smpl, token)
}

/// # Safety
/// `smpl` must be a chain from [`build_chain`]; it is dangling afterwards.
pub unsafe fn free(smpl: *mut llama_sampler) {
    trace("llama_sampler_free()");
    llama_sampler_free(smpl)
}
