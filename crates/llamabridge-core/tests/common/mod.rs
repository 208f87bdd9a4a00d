//! Scripted in-memory backend for session tests.
//!
//! Byte-level vocabulary: every byte of the transcript is one token and a
//! token renders back to that byte. The sampler plays back `Script::reply`
//! and then emits [`EOG`]. Everything the session does to the engine is
//! recorded in a shared [`Log`].
#![allow(dead_code)]

use llamabridge_abi::{
    Batch, BackendError, ChatTurn, Context, ContextParams, InferenceBackend, Model, ModelParams,
    Sampler, SamplerStage, Token, Vocabulary,
};
use llamabridge_core::{CancelToken, TokenSink, SinkError};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const EOG: Token = Token(1000);
pub const TEMPLATE: &str = "mock-chatml";
/// Template the engine always refuses to render.
pub const BROKEN_TEMPLATE: &str = "broken";
/// Template that always claims to need one byte more than offered.
pub const OVERSIZED_TEMPLATE: &str = "oversized";

#[derive(Debug, Default)]
pub struct Log {
    pub backend_inits: usize,
    pub backend_shutdowns: usize,
    pub models_loaded: usize,
    pub loaded_paths: Vec<PathBuf>,
    pub model_params: Vec<ModelParams>,
    pub contexts_created: usize,
    pub ctx_params: Vec<ContextParams>,
    pub samplers: Vec<Vec<SamplerStage>>,
    /// Buffer sizes offered to the template engine, in order.
    pub template_attempts: Vec<usize>,
    /// Every prefill batch as `(token, pos, logits)`.
    pub prefills: Vec<Vec<(Token, i32, bool)>>,
    pub step_decodes: usize,
    pub sample_indices: Vec<i32>,
    /// Teardown order of engine objects.
    pub drops: Vec<&'static str>,
}

pub type SharedLog = Arc<Mutex<Log>>;

/// What the engine does. Cloned into each object it builds.
#[derive(Clone)]
pub struct Script {
    pub template: Option<String>,
    pub reply: Vec<u8>,
    /// Replay `reply` forever instead of ending with EOG.
    pub endless: bool,
    /// Report this window instead of the requested `n_ctx`.
    pub n_ctx: Option<u32>,
    pub fail_load: bool,
    /// Context constructions numbered from 1; this one and every later one fails.
    pub fail_context_from: Option<usize>,
    pub reject_tokenize: bool,
    /// Number of leading prefills that fail.
    pub fail_prefills: usize,
    /// The single-token decode feeding generation step N (1-based) fails.
    pub fail_decode_before_step: Option<usize>,
    pub cancel_on_prefill: Option<CancelToken>,
    /// Flip the token once this many step decodes have run.
    pub cancel_after_steps: Option<(usize, CancelToken)>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            template: Some(TEMPLATE.to_string()),
            reply: b"Hi there".to_vec(),
            endless: false,
            n_ctx: None,
            fail_load: false,
            fail_context_from: None,
            reject_tokenize: false,
            fail_prefills: 0,
            fail_decode_before_step: None,
            cancel_on_prefill: None,
            cancel_after_steps: None,
        }
    }
}

pub struct MockBackend {
    pub script: Script,
    pub log: SharedLog,
}

impl MockBackend {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            log: Arc::default(),
        }
    }

    pub fn log(&self) -> SharedLog {
        self.log.clone()
    }
}

impl InferenceBackend for MockBackend {
    type Model = MockModel;

    fn init(&self) {
        self.log.lock().backend_inits += 1;
    }

    fn shutdown(&self) {
        self.log.lock().backend_shutdowns += 1;
    }

    fn load_model(&self, path: &Path, params: &ModelParams) -> Result<MockModel, BackendError> {
        if self.script.fail_load {
            return Err(BackendError::ModelLoad(format!("cannot open {}", path.display())));
        }
        let mut log = self.log.lock();
        log.models_loaded += 1;
        log.loaded_paths.push(path.to_path_buf());
        log.model_params.push(*params);
        Ok(MockModel {
            script: self.script.clone(),
            log: self.log.clone(),
            vocab: MockVocab {
                reject: self.script.reject_tokenize,
            },
        })
    }
}

pub struct MockModel {
    script: Script,
    log: SharedLog,
    vocab: MockVocab,
}

impl Drop for MockModel {
    fn drop(&mut self) {
        self.log.lock().drops.push("model");
    }
}

/// The transcript the mock template renders.
pub fn render_mock_template(turns: &[ChatTurn], add_assistant: bool) -> String {
    let mut out = String::new();
    for t in turns {
        out.push_str(&format!("<|{}|>{}\n", t.role.as_str(), t.content));
    }
    if add_assistant {
        out.push_str("<|assistant|>");
    }
    out
}

impl Model for MockModel {
    type Vocab = MockVocab;
    type Context = MockContext;
    type Sampler = MockSampler;

    fn vocab(&self) -> &MockVocab {
        &self.vocab
    }

    fn chat_template(&self) -> Option<String> {
        self.script.template.clone()
    }

    fn apply_chat_template(
        &self,
        template: &str,
        turns: &[ChatTurn],
        add_assistant: bool,
        buf: &mut [u8],
    ) -> i32 {
        self.log.lock().template_attempts.push(buf.len());
        match template {
            BROKEN_TEMPLATE => -1,
            OVERSIZED_TEMPLATE => buf.len() as i32 + 1,
            _ => {
                let text = render_mock_template(turns, add_assistant);
                let n = text.len().min(buf.len());
                buf[..n].copy_from_slice(&text.as_bytes()[..n]);
                text.len() as i32
            }
        }
    }

    fn new_context(&self, params: &ContextParams) -> Result<MockContext, BackendError> {
        let mut log = self.log.lock();
        let ordinal = log.contexts_created + 1;
        if self.script.fail_context_from.is_some_and(|n| ordinal >= n) {
            return Err(BackendError::ContextInit("out of memory".into()));
        }
        log.contexts_created = ordinal;
        log.ctx_params.push(*params);
        Ok(MockContext {
            n_ctx: self.script.n_ctx.unwrap_or(params.n_ctx),
            script: self.script.clone(),
            log: self.log.clone(),
            prefilled: false,
        })
    }

    fn new_sampler(&self, stages: &[SamplerStage]) -> Result<MockSampler, BackendError> {
        self.log.lock().samplers.push(stages.to_vec());
        Ok(MockSampler {
            reply: self.script.reply.clone(),
            endless: self.script.endless,
            cursor: 0,
            log: self.log.clone(),
        })
    }
}

pub struct MockVocab {
    reject: bool,
}

impl Vocabulary for MockVocab {
    fn tokenize(&self, text: &str, out: &mut [Token], _add_special: bool, _parse_special: bool) -> i32 {
        if self.reject {
            return -1;
        }
        let bytes = text.as_bytes();
        if out.len() < bytes.len() {
            return -(bytes.len() as i32);
        }
        for (slot, &b) in out.iter_mut().zip(bytes) {
            *slot = Token(b as i32);
        }
        bytes.len() as i32
    }

    fn token_to_piece(&self, token: Token, buf: &mut [u8], _special: bool) -> i32 {
        match u8::try_from(token.0) {
            Ok(b) if !buf.is_empty() => {
                buf[0] = b;
                1
            }
            Ok(_) => -1,
            Err(_) => 0,
        }
    }

    fn is_eog(&self, token: Token) -> bool {
        token == EOG
    }
}

pub struct MockContext {
    n_ctx: u32,
    script: Script,
    log: SharedLog,
    prefilled: bool,
}

impl Drop for MockContext {
    fn drop(&mut self) {
        self.log.lock().drops.push("context");
    }
}

#[derive(Debug, Default)]
pub struct MockBatch(pub Vec<(Token, i32, bool)>);

impl Batch for MockBatch {
    fn add(&mut self, token: Token, pos: i32, logits: bool) {
        self.0.push((token, pos, logits));
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn clear(&mut self) {
        self.0.clear();
    }
}

impl Context for MockContext {
    type Batch = MockBatch;

    fn n_ctx(&self) -> u32 {
        self.n_ctx
    }

    fn new_batch(&self, capacity: usize) -> MockBatch {
        MockBatch(Vec::with_capacity(capacity))
    }

    fn decode(&mut self, batch: &MockBatch) -> Result<(), BackendError> {
        let mut log = self.log.lock();
        if !self.prefilled {
            log.prefills.push(batch.0.clone());
            if log.prefills.len() <= self.script.fail_prefills {
                return Err(BackendError::Decode(1));
            }
            self.prefilled = true;
            if let Some(c) = &self.script.cancel_on_prefill {
                c.cancel();
            }
            return Ok(());
        }

        log.step_decodes += 1;
        if self
            .script
            .fail_decode_before_step
            .is_some_and(|n| log.step_decodes + 1 == n)
        {
            return Err(BackendError::Decode(-3));
        }
        if let Some((n, c)) = &self.script.cancel_after_steps {
            if log.step_decodes == *n {
                c.cancel();
            }
        }
        Ok(())
    }
}

pub struct MockSampler {
    reply: Vec<u8>,
    endless: bool,
    cursor: usize,
    log: SharedLog,
}

impl Drop for MockSampler {
    fn drop(&mut self) {
        self.log.lock().drops.push("sampler");
    }
}

impl Sampler<MockContext> for MockSampler {
    fn sample(&mut self, _ctx: &mut MockContext, idx: i32) -> Token {
        self.log.lock().sample_indices.push(idx);
        if self.reply.is_empty() {
            return EOG;
        }
        match self.reply.get(self.cursor) {
            Some(&b) => Token(b as i32),
            None if self.endless => Token(self.reply[self.cursor % self.reply.len()] as i32),
            None => EOG,
        }
    }

    fn accept(&mut self, _token: Token) {
        self.cursor += 1;
    }
}

/// Records everything a streaming request tells it.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub fragments: Vec<String>,
    pub completed: usize,
    pub errors: Vec<String>,
    /// Reject the fragment with this 1-based index.
    pub reject_at: Option<usize>,
}

impl RecordingSink {
    pub fn text(&self) -> String {
        self.fragments.concat()
    }

    pub fn terminal_signals(&self) -> usize {
        self.completed + self.errors.len()
    }
}

impl TokenSink for RecordingSink {
    fn on_token(&mut self, fragment: &str) -> Result<(), SinkError> {
        if self.reject_at == Some(self.fragments.len() + 1) {
            return Err(SinkError("consumer gone".into()));
        }
        self.fragments.push(fragment.to_string());
        Ok(())
    }

    fn on_completed(&mut self) {
        self.completed += 1;
    }

    fn on_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }
}

/// Tokens the mock vocabulary produces for `text`.
pub fn byte_tokens(text: &str) -> Vec<Token> {
    text.bytes().map(|b| Token(b as i32)).collect()
}
