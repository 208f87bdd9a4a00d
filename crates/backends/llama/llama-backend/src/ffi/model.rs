// crates/backends/llama/llama-backend/src/ffi/model.rs
//
// Model- and vocab-level calls. Everything that dereferences a
// llama_model* or llama_vocab* goes through here.

use std::ffi::{c_char, CStr};
use std::ptr::NonNull;

use llama_cpp_sys_2::{
    llama_model, llama_model_chat_template, llama_model_get_vocab, llama_token_to_piece,
    llama_tokenize, llama_vocab, llama_vocab_is_eog,
};

/// # Safety
/// `model` must be a live model handle.
pub unsafe fn vocab(model: *mut llama_model) -> Option<NonNull<llama_vocab>> {
    NonNull::new(llama_model_get_vocab(model) as *mut llama_vocab)
}

/// Default chat template from GGUF metadata (None if missing or empty).
///
/// # Safety
/// `model` must be a live model handle.
pub unsafe fn chat_template(model: *mut llama_model) -> Option<String> {
    let ptr = llama_model_chat_template(model, std::ptr::null());
    if ptr.is_null() {
        return None;
    }
    let s = CStr::from_ptr(ptr).to_string_lossy().into_owned();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Tokenize into `out`; llama.cpp's return convention is passed through.
///
/// # Safety
/// `vocab` must belong to a live model.
pub unsafe fn tokenize(
    vocab: *const llama_vocab,
    text: &str,
    out: &mut [i32],
    add_special: bool,
    parse_special: bool,
) -> i32 {
    let Ok(text_len) = i32::try_from(text.len()) else {
        return i32::MIN;
    };
    let cap = i32::try_from(out.len()).unwrap_or(i32::MAX);
    llama_tokenize(
        vocab,
        text.as_ptr() as *const c_char,
        text_len,
        out.as_mut_ptr(),
        cap,
        add_special,
        parse_special,
    )
}

/// Render one token into `buf` (no leading-space strip).
///
/// # Safety
/// `vocab` must belong to a live model.
pub unsafe fn token_to_piece(vocab: *const llama_vocab, token: i32, buf: &mut [u8], special: bool) -> i32 {
    let cap = i32::try_from(buf.len()).unwrap_or(i32::MAX);
    llama_token_to_piece(vocab, token, buf.as_mut_ptr() as *mut c_char, cap, 0, special)
}

/// # Safety
/// `vocab` must belong to a live model.
#[inline]
pub unsafe fn is_eog(vocab: *const llama_vocab, token: i32) -> bool {
    llama_vocab_is_eog(vocab, token)
}
