//! Fit a prompt into the context window while keeping its head.
//!
//! The head of a chat transcript carries the system message and template
//! preamble, so the clamp keeps a fixed prefix and drops from the middle.

use llamabridge_abi::Token;

/// Smallest generation reserve ever carved out of the window.
pub const MIN_RESERVE: usize = 64;

/// Upper bound on the preserved prompt head.
pub const MAX_KEEP_PREFIX: usize = 256;

/// Tokens held back for generation given the request's `max_tokens`.
#[inline]
pub fn reserve_for(max_tokens: usize) -> usize {
    max_tokens.max(32).max(MIN_RESERVE)
}

/// Prompt head preserved for a prompt of `n` tokens.
#[inline]
pub fn keep_prefix_for(n: usize) -> usize {
    n.min(MAX_KEEP_PREFIX)
}

/// Clamp `tokens` to `capacity - reserved`, keeping the first `keep_prefix`
/// tokens and filling the rest of the budget from the tail.
pub fn clamp_with_keep(
    tokens: &[Token],
    capacity: usize,
    reserved: usize,
    keep_prefix: usize,
) -> Vec<Token> {
    let available = capacity.saturating_sub(reserved);
    let len = tokens.len();
    if len <= available {
        return tokens.to_vec();
    }

    let keep = keep_prefix.min(len);
    if keep >= available {
        return tokens[..available].to_vec();
    }

    let tail = available - keep;
    let mut out = Vec::with_capacity(available);
    out.extend_from_slice(&tokens[..keep]);
    out.extend_from_slice(&tokens[len - tail..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(n: i32) -> Vec<Token> {
        (0..n).map(Token).collect()
    }

    #[test]
    fn short_input_is_untouched() {
        let t = seq(10);
        assert_eq!(clamp_with_keep(&t, 100, 64, 8), t);
    }

    #[test]
    fn long_input_keeps_head_and_tail() {
        let t = seq(1000);
        let out = clamp_with_keep(&t, 512, 64, 256);
        assert_eq!(out.len(), 448);
        assert_eq!(&out[..256], &t[..256]);
        assert_eq!(&out[256..], &t[1000 - 192..]);
    }

    #[test]
    fn keep_larger_than_budget_truncates_to_head() {
        let t = seq(400);
        let out = clamp_with_keep(&t, 200, 64, 256);
        assert_eq!(out, t[..136].to_vec());
    }

    #[test]
    fn reserve_exceeding_capacity_yields_empty() {
        assert!(clamp_with_keep(&seq(10), 32, 64, 4).is_empty());
    }

    #[test]
    fn reserve_and_keep_helpers() {
        assert_eq!(reserve_for(0), 64);
        assert_eq!(reserve_for(40), 64);
        assert_eq!(reserve_for(512), 512);
        assert_eq!(keep_prefix_for(12), 12);
        assert_eq!(keep_prefix_for(4096), 256);
    }
}
