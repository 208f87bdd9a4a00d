// crates/backends/llama/llama-backend/src/batch.rs
//
// RAII wrapper over `llama_batch` for a single sequence.

use llamabridge_abi::{Batch, Token};

use crate::ffi::batch as ffi_batch;
use crate::ffi::batch::RawBatch;

pub struct LlamaBatch {
    raw: RawBatch,
    capacity: usize,
}

impl LlamaBatch {
    /// Token-mode batch with room for `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            raw: ffi_batch::init(capacity),
            capacity,
        }
    }

    #[inline]
    pub(crate) fn raw(&self) -> RawBatch {
        self.raw
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Batch for LlamaBatch {
    /// Append one token. Panics past capacity.
    fn add(&mut self, token: Token, pos: i32, logits: bool) {
        let index = ffi_batch::n_tokens(&self.raw) as usize;
        assert!(
            index < self.capacity,
            "batch full: capacity {}",
            self.capacity
        );
        // SAFETY: index < capacity, the size the batch was initialized with.
        unsafe { ffi_batch::write_slot(&mut self.raw, index, token.0, pos, logits) };
        ffi_batch::set_n_tokens(&mut self.raw, index as i32 + 1);
    }

    fn len(&self) -> usize {
        ffi_batch::n_tokens(&self.raw) as usize
    }

    fn clear(&mut self) {
        ffi_batch::set_n_tokens(&mut self.raw, 0);
    }
}

impl Drop for LlamaBatch {
    fn drop(&mut self) {
        ffi_batch::free(self.raw);
    }
}
