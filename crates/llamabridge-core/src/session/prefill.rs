use llamabridge_abi::{Batch, Context, Token};

use crate::error::{BridgeError, Result};

/// Submit the whole prompt as one batch at positions `0..n`. Only the last
/// slot asks for logits; the first sample reads from it.
pub(super) fn prefill<C: Context>(ctx: &mut C, tokens: &[Token]) -> Result<()> {
    let last = tokens.len().saturating_sub(1);
    let mut batch = ctx.new_batch(tokens.len());
    for (i, &tok) in tokens.iter().enumerate() {
        batch.add(tok, i as i32, i == last);
    }
    tracing::debug!(n_tokens = batch.len(), "prefill");

    ctx.decode(&batch).map_err(|e| {
        tracing::warn!(error = %e, n_tokens = tokens.len(), "prefill decode failed");
        BridgeError::PrefillFailed(e.to_string())
    })
}
