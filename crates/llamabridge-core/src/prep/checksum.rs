use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::Path;

use crate::error::Result;

const HASH_CHUNK: usize = 1024 * 1024;

/// Lowercase hex sha256 of a file, streamed in 1 MiB chunks.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut f = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK];
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Case-insensitive comparison against an expected hex digest.
pub fn matches_sha256(path: &Path, expected: &str) -> Result<bool> {
    let got = sha256_file(path)?;
    Ok(got.eq_ignore_ascii_case(expected.trim()))
}
