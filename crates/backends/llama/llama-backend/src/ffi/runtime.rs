// crates/backends/llama/llama-backend/src/ffi/runtime.rs
//
// Process-wide llama backend init/shutdown, model load/free and the
// chat-template entry points. Context-specific bits live in ffi::context.

use std::ffi::{c_char, CStr, CString};
use std::path::Path;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};

use llama_cpp_sys_2::{
    llama_backend_free, llama_backend_init, llama_chat_apply_template, llama_chat_message,
    llama_model, llama_model_default_params, llama_model_free, llama_model_load_from_file,
    llama_model_params,
};

use super::trace;

/// Guards against double init / double free of ggml globals.
static BACKEND_LIVE: AtomicBool = AtomicBool::new(false);

pub fn init_backend() {
    if !BACKEND_LIVE.swap(true, Ordering::AcqRel) {
        trace("llama_backend_init()");
        unsafe { llama_backend_init() };
    } else {
        trace("init_backend() while live; ignored");
    }
}

pub fn free_backend() {
    if BACKEND_LIVE.swap(false, Ordering::AcqRel) {
        trace("llama_backend_free()");
        unsafe { llama_backend_free() };
    } else {
        trace("free_backend() while not live; ignored");
    }
}

/// Upstream defaults with the two knobs we care about applied.
pub fn model_params(use_mmap: bool, use_mlock: bool) -> llama_model_params {
    let mut p = unsafe { llama_model_default_params() };
    p.use_mmap = use_mmap;
    p.use_mlock = use_mlock;
    p
}

/// Load a model from disk. Caller owns the returned handle.
pub fn load_model(path: &Path, params: llama_model_params) -> Result<NonNull<llama_model>, String> {
    trace(&format!("load_model: {}", path.display()));
    let c_path = CString::new(path.to_string_lossy().as_bytes())
        .map_err(|_| "model path has interior NUL".to_string())?;
    let ptr = unsafe { llama_model_load_from_file(c_path.as_ptr(), params) };
    NonNull::new(ptr).ok_or_else(|| format!("llama_model_load_from_file({}) returned null", path.display()))
}

/// # Safety
/// `model` must come from [`load_model`] and not have been freed.
pub unsafe fn free_model(model: *mut llama_model) {
    trace("llama_model_free()");
    llama_model_free(model);
}

// -------------------------
// Chat template helpers
// -------------------------

/// Keeps the CStrings alive while llama.cpp reads the message array.
pub struct ChatMsgFFI {
    _role: CString,
    _content: CString,
    c_msg: llama_chat_message,
}

impl ChatMsgFFI {
    pub fn new(role: &str, content: &str) -> Result<Self, String> {
        let role = CString::new(role).map_err(|_| "role has interior NUL".to_string())?;
        let content = CString::new(content).map_err(|_| "content has interior NUL".to_string())?;
        let c_msg = llama_chat_message {
            role: role.as_ptr(),
            content: content.as_ptr(),
        };
        Ok(Self {
            _role: role,
            _content: content,
            c_msg,
        })
    }

    #[inline]
    pub fn as_c(&self) -> llama_chat_message {
        self.c_msg
    }
}

/// Render `msgs` with `tmpl` into `buf`. Returns llama.cpp's byte count:
/// larger than `buf.len()` means truncated, negative means unsupported template.
pub fn apply_chat_template(tmpl: &CStr, msgs: &[ChatMsgFFI], add_assistant: bool, buf: &mut [u8]) -> i32 {
    let c_msgs: Vec<llama_chat_message> = msgs.iter().map(ChatMsgFFI::as_c).collect();
    let cap = i32::try_from(buf.len()).unwrap_or(i32::MAX);
    unsafe {
        llama_chat_apply_template(
            tmpl.as_ptr(),
            c_msgs.as_ptr(),
            c_msgs.len(),
            add_assistant,
            buf.as_mut_ptr() as *mut c_char,
            cap,
        )
    }
}
