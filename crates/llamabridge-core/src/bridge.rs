//! Process-wide front door: one session behind a lock, boundary-shaped results.

use parking_lot::{Mutex, MutexGuard};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};

use llamabridge_abi::InferenceBackend;

use crate::cancel::CancelToken;
use crate::config::{GenerationParams, SessionConfig};
use crate::error::{BridgeError, Result};
use crate::session::{Session, StreamEnd};
use crate::sink::TokenSink;

/// Single shared [`Session`] with the boundary semantics a foreign caller expects:
/// `bool` for lifecycle calls, sentinel strings instead of errors for the
/// blocking call, and a sink signal for every streaming failure.
///
/// Requests never queue. A second request while one is in flight is rejected
/// as [`BridgeError::Busy`]. From other threads `init` and `release` wait for
/// the lock, so cancel first when tearing down mid-request. From inside a sink
/// callback `init` is rejected as busy and `release` cancels the request and
/// runs once it returns.
pub struct Bridge<B: InferenceBackend> {
    session: Mutex<Session<B>>,
    cancel: CancelToken,
    /// Thread running the current request, if any.
    owner: Mutex<Option<ThreadId>>,
    ready: AtomicBool,
    release_pending: AtomicBool,
}

/// Marks a request in flight for as long as it lives.
struct InFlight<'a>(&'a Mutex<Option<ThreadId>>);

impl<'a> InFlight<'a> {
    fn enter(owner: &'a Mutex<Option<ThreadId>>) -> Self {
        *owner.lock() = Some(thread::current().id());
        Self(owner)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        *self.0.lock() = None;
    }
}

impl<B: InferenceBackend> Bridge<B> {
    pub fn new(backend: B) -> Self {
        let cancel = CancelToken::new();
        Self {
            session: Mutex::new(Session::with_cancel_token(backend, cancel.clone())),
            cancel,
            owner: Mutex::new(None),
            ready: AtomicBool::new(false),
            release_pending: AtomicBool::new(false),
        }
    }

    /// True when called from a sink of the request currently running.
    fn is_reentrant(&self) -> bool {
        *self.owner.lock() == Some(thread::current().id())
    }

    /// Run a request on the locked session, then apply a release that a sink
    /// asked for while it ran.
    fn run<T>(
        &self,
        mut session: MutexGuard<'_, Session<B>>,
        request: impl FnOnce(&mut Session<B>) -> T,
    ) -> T {
        let out = {
            let _in_flight = InFlight::enter(&self.owner);
            request(&mut *session)
        };
        if self.release_pending.swap(false, Ordering::AcqRel) {
            tracing::info!("applying release requested during the request");
            session.release();
            self.ready.store(false, Ordering::Release);
        }
        out
    }

    /// `n_ctx` / `n_threads` of zero or less pick the configured defaults.
    pub fn init(&self, model_path: impl AsRef<Path>, n_ctx: i32, n_threads: i32) -> bool {
        let cfg = SessionConfig::from_boundary(model_path.as_ref(), n_ctx, n_threads);
        self.init_with(&cfg).is_ok()
    }

    pub fn init_with(&self, cfg: &SessionConfig) -> Result<()> {
        if self.is_reentrant() {
            tracing::warn!("init rejected: called from inside a running request");
            return Err(BridgeError::Busy);
        }
        let mut session = self.session.lock();
        self.release_pending.store(false, Ordering::Release);
        let result = session.init(cfg);
        self.ready.store(session.is_ready(), Ordering::Release);
        result
    }

    /// Blocking generation. Never fails; problems come back as a
    /// parenthesized sentinel such as `(init() not called)`.
    pub fn infer(&self, prompt: &str, max_tokens: i32, temperature: f32, top_p: f32) -> String {
        let params = GenerationParams::new(max_tokens, temperature, top_p);
        match self.try_infer(prompt, &params) {
            Ok(text) => text,
            Err(e) => e.sentinel(),
        }
    }

    pub fn try_infer(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let session = self.session.try_lock().ok_or(BridgeError::Busy)?;
        self.run(session, |s| s.infer(prompt, params))
    }

    /// Streaming generation into `sink`. Returns `true` when the request
    /// completed or was cancelled, `false` after any error (already reported
    /// through `on_error`).
    pub fn infer_streaming<S: TokenSink + ?Sized>(
        &self,
        prompt: &str,
        max_tokens: i32,
        temperature: f32,
        top_p: f32,
        sink: &mut S,
    ) -> bool {
        let params = GenerationParams::new(max_tokens, temperature, top_p);
        self.try_infer_streaming(prompt, &params, sink).is_ok()
    }

    pub fn try_infer_streaming<S: TokenSink + ?Sized>(
        &self,
        prompt: &str,
        params: &GenerationParams,
        sink: &mut S,
    ) -> Result<StreamEnd> {
        let Some(session) = self.session.try_lock() else {
            tracing::warn!("streaming request rejected: busy");
            let err = BridgeError::Busy;
            sink.on_error(&err.to_string());
            return Err(err);
        };
        self.run(session, |s| s.infer_streaming(prompt, params, sink))
    }

    /// Lock-free; flips the shared flag the step loop polls.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn release(&self) {
        if self.is_reentrant() {
            tracing::info!("release deferred until the running request returns");
            self.release_pending.store(true, Ordering::Release);
            self.cancel.cancel();
            return;
        }
        self.session.lock().release();
        self.ready.store(false, Ordering::Release);
    }

    /// Lock-free; a session stays ready while a request runs on it.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}
