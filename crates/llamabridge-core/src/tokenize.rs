//! Text <-> token conversion on top of a model vocabulary.

use llamabridge_abi::{Token, Vocabulary};

/// Initial piece buffer; covers nearly every token in one call.
const PIECE_START_CAP: usize = 32;
const PIECE_ATTEMPTS: usize = 5;

/// Tokenize a formatted transcript. Special markers in the text are parsed,
/// no BOS is added (the template already emitted one). Failure yields an
/// empty sequence.
pub fn tokenize_prompt<V: Vocabulary>(vocab: &V, text: &str) -> Vec<Token> {
    let mut out = vec![Token::default(); text.len() + 8];
    let n = vocab.tokenize(text, &mut out, false, true);
    if n < 0 {
        tracing::debug!(result = n, "tokenizer rejected prompt");
        return Vec::new();
    }
    out.truncate(n as usize);
    out
}

/// Raw bytes of one token, special tokens rendered as nothing.
/// A token that never fits the growth budget renders empty.
pub fn token_piece_bytes<V: Vocabulary>(vocab: &V, token: Token) -> Vec<u8> {
    let mut cap = PIECE_START_CAP;
    for _ in 0..PIECE_ATTEMPTS {
        let mut buf = vec![0u8; cap];
        let n = vocab.token_to_piece(token, &mut buf, false);
        if n >= 0 && (n as usize) <= cap {
            buf.truncate(n as usize);
            return buf;
        }
        let needed = n.unsigned_abs() as usize;
        cap = (needed + 1).max(cap * 2);
    }
    tracing::warn!(token = token.0, "token piece exceeded growth budget");
    Vec::new()
}

/// Text of a single token, lossily decoded.
pub fn token_piece<V: Vocabulary>(vocab: &V, token: Token) -> String {
    String::from_utf8_lossy(&token_piece_bytes(vocab, token)).into_owned()
}

/// Concatenate the bytes of every token and decode once, so a character
/// split across tokens survives.
pub fn detokenize<V: Vocabulary>(vocab: &V, tokens: &[Token]) -> String {
    let mut bytes = Vec::with_capacity(tokens.len() * 4);
    for &t in tokens {
        bytes.extend_from_slice(&token_piece_bytes(vocab, t));
    }
    String::from_utf8_lossy(&bytes).into_owned()
}
