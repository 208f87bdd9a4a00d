// crates/backends/llama/llama-backend/src/sampling.rs
//
// Owning wrapper over a llama_sampler chain.

use std::ptr::NonNull;

use llama_cpp_sys_2::llama_sampler;
use llamabridge_abi::{BackendError, Sampler, SamplerStage, Token};

use crate::context::LlamaContext;
use crate::ffi::sampling as sffi;

pub struct LlamaSampler {
    chain: NonNull<llama_sampler>,
}

impl LlamaSampler {
    pub fn new(stages: &[SamplerStage]) -> Result<Self, BackendError> {
        let chain = sffi::build_chain(stages).map_err(BackendError::Sampler)?;
        Ok(Self { chain })
    }
}

impl Sampler<LlamaContext> for LlamaSampler {
    fn sample(&mut self, ctx: &mut LlamaContext, idx: i32) -> Token {
        Token(unsafe { sffi::sample(self.chain.as_ptr(), ctx.as_ptr(), idx) })
    }

    fn accept(&mut self, token: Token) {
        unsafe { sffi::accept(self.chain.as_ptr(), token.0) }
    }
}

impl Drop for LlamaSampler {
    fn drop(&mut self) {
        unsafe { sffi::free(self.chain.as_ptr()) };
    }
}

// SAFETY: the chain is plain heap state, touched only through `&mut self`.
unsafe impl Send for LlamaSampler {}
