// crates/backends/llama/llama-backend/src/format.rs

use std::ffi::CString;

use llamabridge_abi::ChatTurn;

use crate::ffi::{apply_chat_template, ChatMsgFFI};

/// Map turns to `llama_chat_message[]` and render them with `template`.
/// Interior NULs in any input count as a render failure (-1).
pub fn render(template: &str, turns: &[ChatTurn], add_assistant: bool, buf: &mut [u8]) -> i32 {
    let Ok(tmpl) = CString::new(template) else {
        return -1;
    };
    let mut msgs = Vec::with_capacity(turns.len());
    for t in turns {
        match ChatMsgFFI::new(t.role.as_str(), &t.content) {
            Ok(m) => msgs.push(m),
            Err(e) => {
                tracing::debug!(error = %e, "chat turn not representable as C string");
                return -1;
            }
        }
    }
    apply_chat_template(&tmpl, &msgs, add_assistant, buf)
}
