use std::fs;
use std::path::Path;

use llamabridge_core::prep::{sha256_file, ModelPreparer, ModelStatus, STATUS_FILE};
use llamabridge_core::{BridgeError, CancelToken};
use tempfile::TempDir;

const MODEL_BYTES: usize = 10_000;

struct Fixture {
    source: TempDir,
    dest: TempDir,
    payload: Vec<u8>,
}

impl Fixture {
    fn new() -> Self {
        let source = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let payload: Vec<u8> = (0..MODEL_BYTES).map(|i| (i % 251) as u8).collect();
        let model = source.path().join("tiny.gguf");
        fs::write(&model, &payload).unwrap();
        let sha = sha256_file(&model).unwrap();
        let fx = Self {
            source,
            dest,
            payload,
        };
        fx.write_manifest(&sha.to_uppercase());
        fx
    }

    fn write_manifest(&self, sha: &str) {
        let manifest = serde_json::json!({
            "models": [{
                "name": "tiny",
                "filename": "tiny.gguf",
                "version": "1.0",
                "size_bytes": MODEL_BYTES,
                "sha256": sha,
                "quant": "Q4_K_M",
                "n_ctx_hint": 1024
            }]
        });
        fs::write(
            self.source.path().join("manifest.json"),
            serde_json::to_vec(&manifest).unwrap(),
        )
        .unwrap();
    }

    fn preparer(&self) -> ModelPreparer {
        ModelPreparer::new(self.source.path(), self.dest.path()).with_chunk_size(1024)
    }

    fn model_dir(&self) -> std::path::PathBuf {
        self.dest.path().join("models").join("tiny").join("1.0")
    }
}

fn no_progress(_: u64, _: u64) {}

fn read_status(dir: &Path) -> ModelStatus {
    serde_json::from_slice(&fs::read(dir.join(STATUS_FILE)).unwrap()).unwrap()
}

#[test]
fn copies_verifies_and_writes_status() {
    let fx = Fixture::new();
    let mut seen = Vec::new();

    let ready = fx
        .preparer()
        .ensure_model_ready(&mut |c, t| seen.push((c, t)), &CancelToken::new())
        .unwrap();

    assert_eq!(ready.message, "prepared");
    assert_eq!(ready.n_ctx_hint, Some(1024));
    assert_eq!(ready.path, fx.model_dir().join("tiny.gguf"));
    assert_eq!(fs::read(&ready.path).unwrap(), fx.payload);
    assert!(!fx.model_dir().join("tiny.gguf.part").exists());

    let total = MODEL_BYTES as u64;
    assert_eq!(seen.first(), Some(&(0, total)));
    assert_eq!(seen.last(), Some(&(total, total)));

    let status = read_status(&fx.model_dir());
    assert!(status.ready);
    assert_eq!(status.version, "1.0");
    assert_eq!(status.size, total);
    assert_eq!(status.sha256, status.sha256.to_lowercase());
}

#[test]
fn second_run_reuses_verified_copy() {
    let fx = Fixture::new();
    let cancel = CancelToken::new();
    fx.preparer()
        .ensure_model_ready(&mut no_progress, &cancel)
        .unwrap();

    let again = fx
        .preparer()
        .ensure_model_ready(&mut no_progress, &cancel)
        .unwrap();
    assert_eq!(again.message, "already present");
}

#[test]
fn corrupted_copy_is_replaced() {
    let fx = Fixture::new();
    fs::create_dir_all(fx.model_dir()).unwrap();
    fs::write(fx.model_dir().join("tiny.gguf"), b"garbage").unwrap();

    let ready = fx
        .preparer()
        .ensure_model_ready(&mut no_progress, &CancelToken::new())
        .unwrap();
    assert_eq!(ready.message, "prepared");
    assert_eq!(fs::read(&ready.path).unwrap(), fx.payload);
}

#[test]
fn checksum_mismatch_leaves_nothing_behind() {
    let fx = Fixture::new();
    fx.write_manifest(&"0".repeat(64));

    let err = fx
        .preparer()
        .ensure_model_ready(&mut no_progress, &CancelToken::new())
        .unwrap_err();

    assert!(matches!(err, BridgeError::Prep(_)));
    assert!(!fx.model_dir().join("tiny.gguf").exists());
    assert!(!fx.model_dir().join("tiny.gguf.part").exists());
    assert!(!fx.model_dir().join(STATUS_FILE).exists());
}

#[test]
fn partial_copy_is_resumed() {
    let fx = Fixture::new();
    fs::create_dir_all(fx.model_dir()).unwrap();
    let half = MODEL_BYTES / 2;
    fs::write(fx.model_dir().join("tiny.gguf.part"), &fx.payload[..half]).unwrap();
    let mut seen = Vec::new();

    let ready = fx
        .preparer()
        .ensure_model_ready(&mut |c, t| seen.push((c, t)), &CancelToken::new())
        .unwrap();

    assert_eq!(seen.first(), Some(&(half as u64, MODEL_BYTES as u64)));
    assert_eq!(fs::read(&ready.path).unwrap(), fx.payload);
}

#[test]
fn oversized_partial_copy_is_discarded() {
    let fx = Fixture::new();
    fs::create_dir_all(fx.model_dir()).unwrap();
    fs::write(
        fx.model_dir().join("tiny.gguf.part"),
        vec![0u8; MODEL_BYTES + 10],
    )
    .unwrap();

    let ready = fx
        .preparer()
        .ensure_model_ready(&mut no_progress, &CancelToken::new())
        .unwrap();
    assert_eq!(fs::read(&ready.path).unwrap(), fx.payload);
}

#[test]
fn cancel_removes_partial_copy() {
    let fx = Fixture::new();
    let cancel = CancelToken::new();
    let trip = cancel.clone();

    let err = fx
        .preparer()
        .ensure_model_ready(
            &mut |copied, _| {
                if copied >= 2048 {
                    trip.cancel();
                }
            },
            &cancel,
        )
        .unwrap_err();

    match err {
        BridgeError::Prep(msg) => assert_eq!(msg, "cancelled"),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!fx.model_dir().join("tiny.gguf.part").exists());
    assert!(!fx.model_dir().join("tiny.gguf").exists());
}

#[test]
fn empty_manifest_is_an_error() {
    let fx = Fixture::new();
    fs::write(fx.source.path().join("manifest.json"), br#"{"models":[]}"#).unwrap();

    let err = fx
        .preparer()
        .ensure_model_ready(&mut no_progress, &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, BridgeError::Prep(_)));
}
