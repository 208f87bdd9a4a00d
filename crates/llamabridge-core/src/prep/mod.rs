//! First-run model preparation: copy the bundled model into app storage,
//! verify it, and leave a status file behind.
//!
//! Layout under `dest_root`:
//! ```text
//! models/<name>/<version>/<filename>
//! models/<name>/<version>/<filename>.part   (while copying)
//! models/<name>/<version>/status.json
//! ```

use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::cancel::CancelToken;
use crate::error::{BridgeError, Result};

mod checksum;
mod manifest;

pub use checksum::{matches_sha256, sha256_file};
pub use manifest::{ModelEntry, ModelManifest, ModelStatus, MANIFEST_FILE};

pub const STATUS_FILE: &str = "status.json";
const DEFAULT_COPY_CHUNK: usize = 1024 * 1024;

/// Result of a successful preparation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelReady {
    pub path: PathBuf,
    pub n_ctx_hint: Option<u32>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ModelPreparer {
    source_dir: PathBuf,
    dest_root: PathBuf,
    chunk_size: usize,
}

impl ModelPreparer {
    pub fn new(source_dir: impl Into<PathBuf>, dest_root: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            dest_root: dest_root.into(),
            chunk_size: DEFAULT_COPY_CHUNK,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn model_dir(&self, entry: &ModelEntry) -> PathBuf {
        self.dest_root
            .join("models")
            .join(&entry.name)
            .join(&entry.version)
    }

    /// Make the bundled model available at its final path.
    ///
    /// Idempotent: a verified copy already in place is reused. A partial copy
    /// from an earlier run is resumed. `progress` receives `(copied, total)`
    /// bytes; cancelling removes the partial file.
    pub fn ensure_model_ready<F>(&self, progress: &mut F, cancel: &CancelToken) -> Result<ModelReady>
    where
        F: FnMut(u64, u64),
    {
        let manifest = ModelManifest::load(&self.source_dir)?;
        let entry = manifest.primary()?;

        let dir = self.model_dir(entry);
        fs::create_dir_all(&dir)?;
        let dest = dir.join(&entry.filename);

        if dest.exists() {
            if matches_sha256(&dest, &entry.sha256)? {
                tracing::info!(path = %dest.display(), "model already present");
                write_status(&dir, entry)?;
                return Ok(ModelReady {
                    path: dest,
                    n_ctx_hint: entry.n_ctx_hint,
                    message: "already present".into(),
                });
            }
            tracing::warn!(path = %dest.display(), "existing model failed checksum; replacing");
            fs::remove_file(&dest)?;
        }

        let part = dir.join(format!("{}.part", entry.filename));
        let src = self.source_dir.join(&entry.filename);
        self.copy_resumable(&src, &part, progress, cancel)?;

        if !matches_sha256(&part, &entry.sha256)? {
            tracing::warn!(path = %part.display(), "checksum mismatch after copy");
            fs::remove_file(&part)?;
            return Err(BridgeError::Prep(format!(
                "checksum mismatch for {}",
                entry.filename
            )));
        }

        fs::rename(&part, &dest)?;
        write_status(&dir, entry)?;
        tracing::info!(path = %dest.display(), "model prepared");

        Ok(ModelReady {
            path: dest,
            n_ctx_hint: entry.n_ctx_hint,
            message: "prepared".into(),
        })
    }

    fn copy_resumable<F>(
        &self,
        src: &Path,
        part: &Path,
        progress: &mut F,
        cancel: &CancelToken,
    ) -> Result<()>
    where
        F: FnMut(u64, u64),
    {
        let total = fs::metadata(src)
            .map_err(|e| BridgeError::Prep(format!("cannot stat {}: {e}", src.display())))?
            .len();

        let mut copied = match fs::metadata(part) {
            Ok(m) if m.len() <= total => m.len(),
            Ok(m) => {
                tracing::debug!(len = m.len(), total, "discarding oversized partial copy");
                fs::remove_file(part)?;
                0
            }
            Err(_) => 0,
        };
        if copied > 0 {
            tracing::info!(copied, total, "resuming model copy");
        }

        let mut input = File::open(src)?;
        input.seek(SeekFrom::Start(copied))?;
        let mut output = OpenOptions::new().create(true).append(true).open(part)?;

        progress(copied, total);
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            if cancel.is_cancelled() {
                drop(output);
                fs::remove_file(part)?;
                tracing::info!(copied, total, "model copy cancelled");
                return Err(BridgeError::Prep("cancelled".into()));
            }
            let n = input.read(&mut buf)?;
            if n == 0 {
                break;
            }
            output.write_all(&buf[..n])?;
            copied += n as u64;
            progress(copied, total);
        }
        output.sync_all()?;
        Ok(())
    }
}

fn write_status(dir: &Path, entry: &ModelEntry) -> Result<()> {
    let status = ModelStatus {
        ready: true,
        sha256: entry.sha256.to_lowercase(),
        version: entry.version.clone(),
        size: entry.size_bytes,
    };
    fs::write(dir.join(STATUS_FILE), serde_json::to_vec_pretty(&status)?)?;
    Ok(())
}
