//! C ABI of the llamabridge library.
//!
//! One process-wide [`Bridge`] over the llama.cpp backend. Every export
//! catches panics at the boundary; string results are heap strings the caller
//! releases with [`llamabridge_free_string`].

use core::ffi::{c_char, c_void};
use std::panic::{catch_unwind, AssertUnwindSafe};

use once_cell::sync::Lazy;
use tracing_subscriber::EnvFilter;

use llama_backend::LlamaBackend;
use llamabridge_abi::ffi::{BridgeCallback, BridgeString, OnProgressFn, LLAMABRIDGE_ABI_VERSION};
use llamabridge_core::config::DEFAULT_PRESETS;
use llamabridge_core::prep::ModelPreparer;
use llamabridge_core::{Bridge, CancelToken, SessionConfig, TokenSink};

mod sink;
mod strings;

use sink::CallbackSink;
use strings::{make_string, set_last_error, str_arg};

/// Env var holding the log filter directive, e.g. `llamabridge_core=debug`.
pub const ENV_LOG: &str = "LLAMABRIDGE_LOG";

static BRIDGE: Lazy<Bridge<LlamaBackend>> = Lazy::new(|| Bridge::new(LlamaBackend::new()));

/// Separate from the inference token so cancelling a copy never stops generation.
static PREP_CANCEL: Lazy<CancelToken> = Lazy::new(CancelToken::new);

fn guard<T>(fallback: T, f: impl FnOnce() -> T) -> T {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(v) => v,
        Err(_) => {
            set_last_error("panic across FFI boundary");
            fallback
        }
    }
}

#[no_mangle]
pub extern "C" fn llamabridge_abi_version() -> u32 {
    LLAMABRIDGE_ABI_VERSION
}

/// Install a fmt subscriber filtered by `LLAMABRIDGE_LOG` (default `info`).
/// Returns `false` if a global subscriber was already set.
#[no_mangle]
pub extern "C" fn llamabridge_init_logging() -> bool {
    guard(false, || {
        let directives = std::env::var(ENV_LOG).unwrap_or_else(|_| "info".to_owned());
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::builder().parse_lossy(directives))
            .with_target(true)
            .try_init()
            .is_ok()
    })
}

/// # Safety
/// `model_path` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn llamabridge_init(
    model_path: *const c_char,
    n_ctx: i32,
    n_threads: i32,
) -> bool {
    guard(false, || {
        let path = match str_arg(model_path, "model path") {
            Ok(p) => p,
            Err(e) => {
                set_last_error(e);
                return false;
            }
        };
        let cfg = SessionConfig::from_boundary(path, n_ctx, n_threads);
        match BRIDGE.init_with(&cfg) {
            Ok(()) => true,
            Err(e) => {
                set_last_error(e.to_string());
                false
            }
        }
    })
}

/// Blocking generation. Always returns a string: the reply, or a
/// parenthesized sentinel describing the failure.
///
/// # Safety
/// `prompt` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn llamabridge_infer(
    prompt: *const c_char,
    max_tokens: i32,
    temperature: f32,
    top_p: f32,
) -> BridgeString {
    guard(make_string("(panic)"), || {
        let out = match str_arg(prompt, "prompt") {
            Ok(p) => BRIDGE.infer(p, max_tokens, temperature, top_p),
            Err(e) => format!("({e})"),
        };
        make_string(&out)
    })
}

/// Streaming generation. Fragments, completion and errors arrive through
/// `callback` on the calling thread. Returns `true` on completion or cancel.
///
/// # Safety
/// `prompt` must be null or a valid NUL-terminated string. `callback` and its
/// `user_data` must stay valid until this call returns.
#[no_mangle]
pub unsafe extern "C" fn llamabridge_infer_streaming(
    prompt: *const c_char,
    max_tokens: i32,
    temperature: f32,
    top_p: f32,
    callback: BridgeCallback,
) -> bool {
    guard(false, || {
        let Some(mut sink) = CallbackSink::new(callback) else {
            set_last_error("incomplete callback");
            return false;
        };
        match str_arg(prompt, "prompt") {
            Ok(p) => BRIDGE.infer_streaming(p, max_tokens, temperature, top_p, &mut sink),
            Err(e) => {
                sink.on_error(&e);
                set_last_error(e);
                false
            }
        }
    })
}

/// Ask the running request to stop. Safe from any thread.
#[no_mangle]
pub extern "C" fn llamabridge_cancel() {
    guard((), || BRIDGE.cancel())
}

#[no_mangle]
pub extern "C" fn llamabridge_release() {
    guard((), || BRIDGE.release())
}

/// # Safety
/// `s` must come from this library and not have been freed already.
#[no_mangle]
pub unsafe extern "C" fn llamabridge_free_string(s: BridgeString) {
    guard((), || strings::free_string(s))
}

/// Last error recorded on the calling thread, or a null string.
#[no_mangle]
pub extern "C" fn llamabridge_last_error() -> BridgeString {
    guard(BridgeString::null(), || {
        strings::last_error()
            .map(|m| make_string(&m))
            .unwrap_or_else(BridgeString::null)
    })
}

/// The built-in generation presets as a JSON array.
#[no_mangle]
pub extern "C" fn llamabridge_presets_json() -> BridgeString {
    guard(BridgeString::null(), || {
        match serde_json::to_string(&*DEFAULT_PRESETS) {
            Ok(json) => make_string(&json),
            Err(e) => {
                set_last_error(e.to_string());
                BridgeString::null()
            }
        }
    })
}

/// Copy and verify the bundled model. Returns the JSON-encoded result
/// (`path`, `n_ctx_hint`, `message`), or a null string with the reason in
/// [`llamabridge_last_error`]. `progress` may be null; otherwise it receives
/// `(user_data, copied, total)` on the calling thread.
///
/// # Safety
/// Both strings must be null or valid NUL-terminated strings. `user_data`
/// must stay valid until this call returns.
#[no_mangle]
pub unsafe extern "C" fn llamabridge_prepare_model(
    source_dir: *const c_char,
    dest_root: *const c_char,
    progress: Option<OnProgressFn>,
    user_data: *mut c_void,
) -> BridgeString {
    guard(BridgeString::null(), || {
        let (src, dest) = match (str_arg(source_dir, "source dir"), str_arg(dest_root, "dest root")) {
            (Ok(s), Ok(d)) => (s, d),
            (Err(e), _) | (_, Err(e)) => {
                set_last_error(e);
                return BridgeString::null();
            }
        };
        PREP_CANCEL.reset();
        let mut report = |copied: u64, total: u64| {
            tracing::debug!(copied, total, "model copy progress");
            if let Some(f) = progress {
                f(user_data, copied, total);
            }
        };
        let ready = ModelPreparer::new(src, dest)
            .ensure_model_ready(&mut report, &PREP_CANCEL)
            .map_err(|e| e.to_string())
            .and_then(|r| serde_json::to_string(&r).map_err(|e| e.to_string()));
        match ready {
            Ok(json) => make_string(&json),
            Err(e) => {
                set_last_error(e);
                BridgeString::null()
            }
        }
    })
}

/// Stop a running [`llamabridge_prepare_model`]; the partial copy is removed.
/// Safe from any thread, including from inside the progress callback.
#[no_mangle]
pub extern "C" fn llamabridge_prepare_cancel() {
    guard((), || PREP_CANCEL.cancel())
}
