//! One inference session: a loaded model plus the per-request context and
//! sampler, driven through prefill and the step loop.

use llamabridge_abi::{Context, ContextParams, InferenceBackend, Model, Token};

use crate::cancel::CancelToken;
use crate::clamp::{clamp_with_keep, keep_prefix_for, reserve_for};
use crate::config::{GenerationParams, SessionConfig, DEFAULT_SYSTEM_PROMPT};
use crate::error::{BridgeError, Result};
use crate::format::format_prompt;
use crate::sampler::{build_sampler, DEFAULT_TOP_P};
use crate::sink::{SinkError, TokenSink};
use crate::tokenize::{detokenize, token_piece_bytes, tokenize_prompt};

mod decode;
mod prefill;
mod utils;

use decode::{Generation, LoopEnd};
use utils::Utf8Stage;

/// How a streaming request ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// End-of-generation or `max_tokens`; `on_completed` was called.
    Completed,
    /// Stopped by [`CancelToken`]; no terminal callback was made.
    Cancelled,
}

/// Engine objects of a ready session. Field order is drop order.
struct Loaded<M: Model> {
    sampler: Option<M::Sampler>,
    context: Option<M::Context>,
    model: M,
    ctx_params: ContextParams,
}

impl<M: Model> Loaded<M> {
    /// Fresh context, formatted and clamped prompt, prefill, fresh sampler.
    ///
    /// `Ok(None)` means the prompt tokenized to nothing.
    fn prepare(
        &mut self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Option<Generation<'_, M>>> {
        self.context = None;
        let ctx = self.context.insert(
            self.model
                .new_context(&self.ctx_params)
                .map_err(|e| BridgeError::ContextInit(e.to_string()))?,
        );

        let text = format_prompt(&self.model, prompt, Some(DEFAULT_SYSTEM_PROMPT));
        let tokens = tokenize_prompt(self.model.vocab(), &text);
        if tokens.is_empty() {
            tracing::debug!("prompt tokenized to nothing");
            return Ok(None);
        }

        let capacity = ctx.n_ctx() as usize;
        let reserved = reserve_for(params.max_tokens);
        let tokens = clamp_with_keep(&tokens, capacity, reserved, keep_prefix_for(tokens.len()));
        tracing::debug!(
            n_prompt = tokens.len(),
            capacity,
            reserved,
            "prompt clamped to context window"
        );
        if tokens.is_empty() {
            return Ok(None);
        }

        prefill::prefill(ctx, &tokens)?;

        self.sampler = None;
        let sampler = self
            .sampler
            .insert(build_sampler(&self.model, params.top_p, params.temperature)?);

        Ok(Some(Generation {
            model: &self.model,
            ctx,
            sampler,
            n_prompt: tokens.len(),
        }))
    }
}

/// Owns the engine backend and at most one loaded model.
///
/// States: uninitialized, ready (after a successful [`Session::init`]) and
/// released. Every request rebuilds the context and sampler; nothing carries
/// over between requests except the model.
pub struct Session<B: InferenceBackend> {
    backend: B,
    state: Option<Loaded<B::Model>>,
    cancel: CancelToken,
    backend_live: bool,
}

impl<B: InferenceBackend> Session<B> {
    pub fn new(backend: B) -> Self {
        Self::with_cancel_token(backend, CancelToken::new())
    }

    /// Use an externally held token, so cancel works without touching the session.
    pub fn with_cancel_token(backend: B, cancel: CancelToken) -> Self {
        Self {
            backend,
            state: None,
            cancel,
            backend_live: false,
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_some()
    }

    /// Load the model and build the initial context and greedy sampler.
    /// Any previous state is released first; on failure nothing stays loaded.
    pub fn init(&mut self, cfg: &SessionConfig) -> Result<()> {
        self.release();
        cfg.validate()?;

        tracing::info!(
            model = %cfg.model_path.display(),
            n_ctx = cfg.n_ctx,
            n_threads = cfg.n_threads,
            "initializing session"
        );
        self.backend.init();
        self.backend_live = true;

        match Self::load(&self.backend, cfg) {
            Ok(loaded) => {
                self.state = Some(loaded);
                self.cancel.reset();
                tracing::info!("session ready");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "session init failed");
                self.backend.shutdown();
                self.backend_live = false;
                Err(e)
            }
        }
    }

    fn load(backend: &B, cfg: &SessionConfig) -> Result<Loaded<B::Model>> {
        let model = backend.load_model(&cfg.model_path, &cfg.model_params())?;
        let ctx_params = cfg.context_params();
        let context = model
            .new_context(&ctx_params)
            .map_err(|e| BridgeError::ContextInit(e.to_string()))?;
        let sampler = build_sampler(&model, DEFAULT_TOP_P, 0.0)?;
        Ok(Loaded {
            sampler: Some(sampler),
            context: Some(context),
            model,
            ctx_params,
        })
    }

    /// Drop sampler, context and model in that order, then shut the backend
    /// down. Safe to call repeatedly.
    pub fn release(&mut self) {
        if let Some(mut loaded) = self.state.take() {
            drop(loaded.sampler.take());
            drop(loaded.context.take());
            drop(loaded);
            tracing::info!("session released");
        }
        if self.backend_live {
            self.backend.shutdown();
            self.backend_live = false;
        }
        self.cancel.reset();
    }

    /// Ask a running streaming request to stop at its next step.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Generate a complete reply.
    ///
    /// An empty prompt yields an empty string. A failed step decode ends the
    /// reply early and keeps what was generated.
    pub fn infer(&mut self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let loaded = self.state.as_mut().ok_or(BridgeError::NotInitialized)?;
        self.cancel.reset();
        tracing::info!(max_tokens = params.max_tokens, "infer");

        let Some(mut generation) = loaded.prepare(prompt, params)? else {
            return Ok(String::new());
        };
        let n_prompt = generation.n_prompt;

        let mut out: Vec<Token> = Vec::with_capacity(params.max_tokens.min(4096));
        let end = generation.run(params.max_tokens, None, &mut |tok| {
            out.push(tok);
            Ok(())
        });
        if let LoopEnd::DecodeFailed { step } = end {
            tracing::warn!(step, "returning partial reply after decode failure");
        }

        let text = detokenize(generation.model.vocab(), &out);
        tracing::info!(n_prompt, n_generated = out.len(), end = ?end, "infer done");
        Ok(text)
    }

    /// Generate a reply fragment by fragment into `sink`.
    ///
    /// The sink hears exactly one of `on_completed` or `on_error`, except on
    /// cancel, where it hears neither. The returned value mirrors what the
    /// sink was told.
    pub fn infer_streaming<S: TokenSink + ?Sized>(
        &mut self,
        prompt: &str,
        params: &GenerationParams,
        sink: &mut S,
    ) -> Result<StreamEnd> {
        let result = self.stream(prompt, params, sink);
        match &result {
            Ok(StreamEnd::Completed) => sink.on_completed(),
            Ok(StreamEnd::Cancelled) => {}
            Err(e) => sink.on_error(&e.to_string()),
        }
        result
    }

    fn stream<S: TokenSink + ?Sized>(
        &mut self,
        prompt: &str,
        params: &GenerationParams,
        sink: &mut S,
    ) -> Result<StreamEnd> {
        let loaded = self.state.as_mut().ok_or(BridgeError::NotInitialized)?;
        self.cancel.reset();
        tracing::info!(max_tokens = params.max_tokens, "infer_streaming");

        let mut generation = loaded
            .prepare(prompt, params)?
            .ok_or(BridgeError::EmptyPrompt)?;
        let vocab = generation.model.vocab();

        let mut stage = Utf8Stage::new();
        let mut n_fragments = 0usize;
        let mut emit = |tok: Token| -> std::result::Result<(), SinkError> {
            match stage.push(&token_piece_bytes(vocab, tok)) {
                Some(fragment) => {
                    n_fragments += 1;
                    sink.on_token(&fragment)
                }
                None => Ok(()),
            }
        };
        let end = generation.run(params.max_tokens, Some(&self.cancel), &mut emit);

        tracing::info!(n_prompt = generation.n_prompt, n_fragments, end = ?end, "infer_streaming done");
        match end {
            // A cancel that lands during the final step still suppresses completion.
            LoopEnd::Eog | LoopEnd::MaxTokens if self.cancel.is_cancelled() => {
                tracing::debug!("cancelled on the last step");
                Ok(StreamEnd::Cancelled)
            }
            LoopEnd::Eog | LoopEnd::MaxTokens => {
                if let Some(rest) = stage.finish() {
                    sink.on_token(&rest).map_err(|e| {
                        tracing::warn!(error = %e, "token sink failed on flush");
                        BridgeError::Interrupted
                    })?;
                }
                Ok(StreamEnd::Completed)
            }
            LoopEnd::Cancelled => Ok(StreamEnd::Cancelled),
            LoopEnd::DecodeFailed { .. } | LoopEnd::SinkFailed(_) => Err(BridgeError::Interrupted),
        }
    }
}

impl<B: InferenceBackend> Drop for Session<B> {
    fn drop(&mut self) {
        self.release();
    }
}
