// crates/backends/llama/llama-backend/src/ffi/batch.rs
//
// Raw llama_batch slot writes. All pointer arithmetic on batches lives here.

use llama_cpp_sys_2::{llama_batch, llama_batch_free, llama_batch_init};

pub use llama_cpp_sys_2::llama_batch as RawBatch;

/// Token-mode batch with room for `n_tokens`, one sequence per slot.
pub fn init(n_tokens: usize) -> llama_batch {
    let n = i32::try_from(n_tokens.max(1)).unwrap_or(i32::MAX);
    unsafe { llama_batch_init(n, 0, 1) }
}

/// Free a batch returned by [`init`].
pub fn free(batch: llama_batch) {
    unsafe { llama_batch_free(batch) }
}

/// Write slot `index`: token, position, sequence 0, logits flag.
///
/// # Safety
/// `index` must be below the capacity the batch was initialized with.
pub unsafe fn write_slot(raw: &mut llama_batch, index: usize, token: i32, pos: i32, logits: bool) {
    *raw.token.add(index) = token;
    *raw.pos.add(index) = pos;
    // llama_batch_init allocated one seq id per slot; fill it in place so
    // llama_batch_free still owns it.
    if !raw.seq_id.is_null() && !raw.n_seq_id.is_null() {
        let seq = *raw.seq_id.add(index);
        if !seq.is_null() {
            *seq = 0;
        }
        *raw.n_seq_id.add(index) = 1;
    }
    if !raw.logits.is_null() {
        *raw.logits.add(index) = logits as i8;
    }
}

#[inline]
pub fn n_tokens(raw: &llama_batch) -> i32 {
    raw.n_tokens
}

#[inline]
pub fn set_n_tokens(raw: &mut llama_batch, v: i32) {
    raw.n_tokens = v;
}
