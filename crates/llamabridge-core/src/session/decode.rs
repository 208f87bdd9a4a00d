use llamabridge_abi::{Batch, Context, Model, Sampler, Token, Vocabulary};

use crate::cancel::CancelToken;
use crate::sink::SinkError;

/// Why the step loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum LoopEnd {
    Eog,
    MaxTokens,
    Cancelled,
    DecodeFailed { step: usize },
    SinkFailed(SinkError),
}

/// Token source for one request: the model, its freshly prefilled context
/// and the request's sampler.
pub(super) struct Generation<'a, M: Model> {
    pub(super) model: &'a M,
    pub(super) ctx: &'a mut M::Context,
    pub(super) sampler: &'a mut M::Sampler,
    pub(super) n_prompt: usize,
}

impl<M: Model> Generation<'_, M> {
    /// Autoregressive loop. Each step: check cancel (when a token is given),
    /// sample, stop on end-of-generation, hand the token to `emit`, accept
    /// it, then decode it as a single-slot batch.
    pub(super) fn run(
        &mut self,
        max_tokens: usize,
        cancel: Option<&CancelToken>,
        emit: &mut dyn FnMut(Token) -> Result<(), SinkError>,
    ) -> LoopEnd {
        let model = self.model;
        let vocab = model.vocab();
        let mut batch = self.ctx.new_batch(1);
        let mut n_past = self.n_prompt as i32;
        // Prefill left its logits on the last prompt slot; afterwards the
        // single-slot batch puts them at index 0.
        let mut i_last = self.n_prompt as i32 - 1;

        for step in 0..max_tokens {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                tracing::debug!(step, "generation cancelled");
                return LoopEnd::Cancelled;
            }

            let tok = self.sampler.sample(self.ctx, i_last);
            tracing::trace!(step, token = tok.0, "sampled");
            if vocab.is_eog(tok) {
                return LoopEnd::Eog;
            }

            if let Err(e) = emit(tok) {
                tracing::warn!(step, error = %e, "token sink failed");
                return LoopEnd::SinkFailed(e);
            }
            self.sampler.accept(tok);

            batch.clear();
            batch.add(tok, n_past, true);
            if let Err(e) = self.ctx.decode(&batch) {
                tracing::warn!(step, n_past, error = %e, "step decode failed");
                return LoopEnd::DecodeFailed { step };
            }
            n_past += 1;
            i_last = 0;
        }

        LoopEnd::MaxTokens
    }
}
