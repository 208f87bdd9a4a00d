/// Length of the longest valid UTF-8 prefix in `bytes`.
pub(super) fn utf8_valid_prefix_len(bytes: &[u8]) -> usize {
    match std::str::from_utf8(bytes) {
        Ok(_) => bytes.len(),
        Err(e) => e.valid_up_to(),
    }
}

/// Holds token bytes until they form whole characters.
///
/// Tokens may end in the middle of a multibyte character; only complete
/// characters leave the stage. Bytes that can never become valid are
/// replaced with U+FFFD instead of blocking the stream.
#[derive(Debug, Default)]
pub(super) struct Utf8Stage {
    pending: Vec<u8>,
}

impl Utf8Stage {
    pub(super) fn new() -> Self {
        Self {
            pending: Vec::with_capacity(64),
        }
    }

    /// Stage `bytes` and return every complete character now available.
    pub(super) fn push(&mut self, bytes: &[u8]) -> Option<String> {
        self.pending.extend_from_slice(bytes);
        #[cfg(feature = "utf8-trace")]
        tracing::trace!(staged = ?self.pending, "utf8 stage");

        let mut out = String::new();
        loop {
            let valid = utf8_valid_prefix_len(&self.pending);
            if valid == self.pending.len() {
                out.push_str(&String::from_utf8_lossy(&self.pending));
                self.pending.clear();
                break;
            }
            let invalid = std::str::from_utf8(&self.pending[valid..])
                .err()
                .and_then(|e| e.error_len());
            match invalid {
                // Invalid sequence: replace it and keep scanning.
                Some(bad) => {
                    let cut = valid + bad;
                    out.push_str(&String::from_utf8_lossy(&self.pending[..cut]));
                    self.pending.drain(..cut);
                }
                // Incomplete tail: wait for the next token.
                None => {
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    self.pending.drain(..valid);
                    break;
                }
            }
        }

        (!out.is_empty()).then_some(out)
    }

    /// Whatever is left, lossily.
    pub(super) fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_len_stops_before_partial_char() {
        let e_acute = "é".as_bytes();
        assert_eq!(utf8_valid_prefix_len(b"abc"), 3);
        assert_eq!(utf8_valid_prefix_len(&[b'a', e_acute[0]]), 1);
    }

    #[test]
    fn split_character_is_held_until_complete() {
        let bytes = "é".as_bytes();
        let mut stage = Utf8Stage::new();
        assert_eq!(stage.push(&[bytes[0]]), None);
        assert_eq!(stage.push(&[bytes[1]]).as_deref(), Some("é"));
        assert_eq!(stage.finish(), None);
    }

    #[test]
    fn ascii_passes_straight_through() {
        let mut stage = Utf8Stage::new();
        assert_eq!(stage.push(b"hi").as_deref(), Some("hi"));
    }

    #[test]
    fn invalid_byte_does_not_block() {
        let mut stage = Utf8Stage::new();
        assert_eq!(stage.push(&[0xFF, b'a']).as_deref(), Some("\u{FFFD}a"));
    }

    #[test]
    fn finish_flushes_dangling_bytes() {
        let mut stage = Utf8Stage::new();
        assert_eq!(stage.push(&[0xE2, 0x82]), None);
        assert_eq!(stage.finish().as_deref(), Some("\u{FFFD}"));
    }
}
