// crates/backends/llama/llama-backend/src/vocab.rs
//
// Non-owning view of a model's vocabulary.

use std::ptr::NonNull;

use llama_cpp_sys_2::llama_vocab;
use llamabridge_abi::{Token, Vocabulary};

use crate::ffi::model as mffi;

/// Borrowed from the model that produced it; never freed on its own.
pub struct LlamaVocab {
    ptr: NonNull<llama_vocab>,
}

impl LlamaVocab {
    /// # Safety
    /// `ptr` must stay valid for as long as this value lives.
    pub(crate) unsafe fn from_raw(ptr: NonNull<llama_vocab>) -> Self {
        Self { ptr }
    }

    #[inline]
    fn as_ptr(&self) -> *const llama_vocab {
        self.ptr.as_ptr()
    }
}

impl Vocabulary for LlamaVocab {
    fn tokenize(&self, text: &str, out: &mut [Token], add_special: bool, parse_special: bool) -> i32 {
        let mut ids = vec![0i32; out.len()];
        let n = unsafe { mffi::tokenize(self.as_ptr(), text, &mut ids, add_special, parse_special) };
        if n > 0 {
            for (slot, id) in out.iter_mut().zip(&ids[..n as usize]) {
                *slot = Token(*id);
            }
        }
        n
    }

    fn token_to_piece(&self, token: Token, buf: &mut [u8], special: bool) -> i32 {
        unsafe { mffi::token_to_piece(self.as_ptr(), token.0, buf, special) }
    }

    fn is_eog(&self, token: Token) -> bool {
        unsafe { mffi::is_eog(self.as_ptr(), token.0) }
    }
}
