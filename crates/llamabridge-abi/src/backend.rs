use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Role name as chat templates expect it.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    #[inline]
    pub fn system<S: Into<String>>(s: S) -> Self {
        Self {
            role: Role::System,
            content: s.into(),
        }
    }
    #[inline]
    pub fn user<S: Into<String>>(s: S) -> Self {
        Self {
            role: Role::User,
            content: s.into(),
        }
    }
}

/// Engine-level failure. Carries the engine's own description; the core maps
/// these onto its request outcomes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("model load failed: {0}")]
    ModelLoad(String),

    #[error("context construction failed: {0}")]
    ContextInit(String),

    #[error("decode failed with code {0}")]
    Decode(i32),

    #[error("sampler construction failed: {0}")]
    Sampler(String),
}

/// How the weights are mapped into memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelParams {
    pub use_mmap: bool,
    pub use_mlock: bool,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            use_mmap: true,
            use_mlock: false,
        }
    }
}

/// Generation-context sizing. The same thread count drives single and batched decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextParams {
    pub n_ctx: u32,
    pub n_threads: i32,
    pub n_threads_batch: i32,
}

/// One stage of a sampler chain, applied in order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamplerStage {
    /// Nucleus filter.
    TopP { p: f32, min_keep: usize },
    /// Logit temperature scaling.
    Temperature(f32),
    /// Terminal argmax.
    Greedy,
    /// Terminal weighted draw from a fixed seed.
    Distribution { seed: u32 },
}

// ─────────────────────────────────────────────
// Capability traits
// ─────────────────────────────────────────────

/// Process-wide entry point of an inference engine.
pub trait InferenceBackend {
    type Model: Model;

    /// Bring up engine globals. Paired with `shutdown`.
    fn init(&self);

    fn shutdown(&self);

    fn load_model(&self, path: &Path, params: &ModelParams) -> Result<Self::Model, BackendError>;
}

/// Loaded weights. Contexts and samplers are built from a model; the
/// vocabulary is borrowed from it and never outlives it.
pub trait Model {
    type Vocab: Vocabulary;
    type Context: Context;
    type Sampler: Sampler<Self::Context>;

    fn vocab(&self) -> &Self::Vocab;

    /// Default chat template from the model metadata, if any.
    fn chat_template(&self) -> Option<String>;

    /// Render `turns` with `template` into `buf`.
    ///
    /// Returns the number of bytes the full transcript needs. A value larger
    /// than `buf.len()` means the output was cut short; negative means failure.
    fn apply_chat_template(
        &self,
        template: &str,
        turns: &[ChatTurn],
        add_assistant: bool,
        buf: &mut [u8],
    ) -> i32;

    fn new_context(&self, params: &ContextParams) -> Result<Self::Context, BackendError>;

    fn new_sampler(&self, stages: &[SamplerStage]) -> Result<Self::Sampler, BackendError>;
}

/// Read-only token tables of a model.
pub trait Vocabulary {
    /// Tokenize into `out`. Returns the token count, or a negative number if
    /// `out` was too small (magnitude = needed) or tokenization failed.
    fn tokenize(&self, text: &str, out: &mut [Token], add_special: bool, parse_special: bool)
        -> i32;

    /// Render one token into `buf`. Returns the byte count, or the negated
    /// required size when `buf` is too small.
    fn token_to_piece(&self, token: Token, buf: &mut [u8], special: bool) -> i32;

    /// End-of-generation marker (EOS, EOT, ...).
    fn is_eog(&self, token: Token) -> bool;
}

/// Mutable decode state bound to one model.
pub trait Context {
    type Batch: Batch;

    /// Active context window.
    fn n_ctx(&self) -> u32;

    fn new_batch(&self, capacity: usize) -> Self::Batch;

    fn decode(&mut self, batch: &Self::Batch) -> Result<(), BackendError>;
}

/// Token batch for a single sequence.
pub trait Batch {
    /// Append one token at `pos`; `logits` requests a distribution for this slot.
    fn add(&mut self, token: Token, pos: i32, logits: bool);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self);
}

/// A built sampler chain.
pub trait Sampler<C> {
    /// Pick a token from the distribution at batch index `idx` of `ctx`.
    fn sample(&mut self, ctx: &mut C, idx: i32) -> Token;

    /// Feed an accepted token back into the chain state.
    fn accept(&mut self, token: Token);
}
