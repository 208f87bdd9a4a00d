//! Session and generation parameters, env overrides and the bundled presets.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use llamabridge_abi::{ContextParams, ModelParams};

use crate::error::{BridgeError, Result};

/// System message injected into every request.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

pub const DEFAULT_N_CTX: u32 = 2048;

/// Upper bound for the automatic thread count; mobile SoCs throttle past this.
pub const MAX_AUTO_THREADS: usize = 4;

pub const ENV_N_CTX: &str = "LLAMABRIDGE_N_CTX";
pub const ENV_N_THREADS: &str = "LLAMABRIDGE_N_THREADS";

/// Everything `Session::init` needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub model_path: PathBuf,
    pub n_ctx: u32,
    pub n_threads: i32,
}

impl SessionConfig {
    /// Defaults with env overrides (`LLAMABRIDGE_N_CTX`, `LLAMABRIDGE_N_THREADS`).
    pub fn new<P: Into<PathBuf>>(model_path: P) -> Self {
        let n_ctx = std::env::var(ENV_N_CTX)
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_N_CTX);
        let n_threads = std::env::var(ENV_N_THREADS)
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or_else(auto_threads);

        Self {
            model_path: model_path.into(),
            n_ctx,
            n_threads,
        }
    }

    /// Boundary constructor: non-positive sizes fall back to the configured defaults.
    pub fn from_boundary<P: Into<PathBuf>>(model_path: P, n_ctx: i32, n_threads: i32) -> Self {
        let mut cfg = Self::new(model_path);
        if n_ctx > 0 {
            cfg.n_ctx = n_ctx as u32;
        }
        if n_threads > 0 {
            cfg.n_threads = n_threads;
        }
        cfg
    }

    /// Reject settings the engine would only fail on later.
    pub fn validate(&self) -> Result<()> {
        if self.model_path.as_os_str().is_empty() {
            return Err(BridgeError::Config("model path is empty".into()));
        }
        if self.n_ctx == 0 || self.n_threads <= 0 {
            return Err(BridgeError::Config(format!(
                "n_ctx {} / n_threads {} must be positive",
                self.n_ctx, self.n_threads
            )));
        }
        Ok(())
    }

    pub fn model_params(&self) -> ModelParams {
        ModelParams {
            use_mmap: true,
            use_mlock: false,
        }
    }

    pub fn context_params(&self) -> ContextParams {
        ContextParams {
            n_ctx: self.n_ctx,
            n_threads: self.n_threads,
            n_threads_batch: self.n_threads,
        }
    }
}

/// Available cores, clamped to `1..=MAX_AUTO_THREADS`.
pub fn auto_threads() -> i32 {
    num_cpus::get().clamp(1, MAX_AUTO_THREADS) as i32
}

/// Per-request knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
}

impl GenerationParams {
    /// Boundary constructor; a negative `max_tokens` generates nothing.
    pub fn new(max_tokens: i32, temperature: f32, top_p: f32) -> Self {
        Self {
            max_tokens: max_tokens.max(0) as usize,
            temperature,
            top_p,
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 256,
            temperature: 0.0,
            top_p: 0.95,
        }
    }
}

/// Named bundle of generation knobs plus the context size it was tuned for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationPreset {
    pub name: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: usize,
    pub context_length: u32,
}

impl GenerationPreset {
    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
        }
    }

    pub fn find(name: &str) -> Option<&'static GenerationPreset> {
        DEFAULT_PRESETS
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

pub static DEFAULT_PRESETS: Lazy<Vec<GenerationPreset>> = Lazy::new(|| {
    vec![
        GenerationPreset {
            name: "fast".into(),
            temperature: 0.1,
            top_p: 0.9,
            max_tokens: 128,
            context_length: 1024,
        },
        GenerationPreset {
            name: "balanced".into(),
            temperature: 0.7,
            top_p: 0.95,
            max_tokens: 256,
            context_length: 2048,
        },
        GenerationPreset {
            name: "creative".into(),
            temperature: 0.95,
            top_p: 0.98,
            max_tokens: 512,
            context_length: 3072,
        },
    ]
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_keeps_explicit_sizes() {
        let cfg = SessionConfig::from_boundary("model.gguf", 2048, 4);
        assert_eq!(cfg.n_ctx, 2048);
        assert_eq!(cfg.n_threads, 4);
        let ctx = cfg.context_params();
        assert_eq!(ctx.n_threads, ctx.n_threads_batch);
    }

    #[test]
    fn validate_rejects_empty_path_and_zero_sizes() {
        assert!(SessionConfig::from_boundary("model.gguf", 512, 1).validate().is_ok());
        assert!(matches!(
            SessionConfig::from_boundary("", 512, 1).validate(),
            Err(BridgeError::Config(_))
        ));
        let mut cfg = SessionConfig::from_boundary("model.gguf", 512, 1);
        cfg.n_ctx = 0;
        assert!(matches!(cfg.validate(), Err(BridgeError::Config(_))));
    }

    #[test]
    fn boundary_falls_back_on_non_positive_sizes() {
        let cfg = SessionConfig::from_boundary("model.gguf", 0, -1);
        assert!(cfg.n_ctx > 0);
        assert!(cfg.n_threads >= 1);
    }

    #[test]
    fn model_params_mmap_without_mlock() {
        let p = SessionConfig::from_boundary("m.gguf", 512, 1).model_params();
        assert!(p.use_mmap);
        assert!(!p.use_mlock);
    }

    #[test]
    fn negative_max_tokens_clamps_to_zero() {
        assert_eq!(GenerationParams::new(-5, 0.0, 0.95).max_tokens, 0);
    }

    #[test]
    fn presets_survive_json() {
        let js = serde_json::to_string(&*DEFAULT_PRESETS).unwrap();
        let back: Vec<GenerationPreset> = serde_json::from_str(&js).unwrap();
        assert_eq!(back, *DEFAULT_PRESETS);
    }

    #[test]
    fn preset_lookup_is_case_insensitive() {
        let p = GenerationPreset::find("Balanced").unwrap();
        assert_eq!(p.context_length, 2048);
        assert_eq!(p.params().max_tokens, 256);
        assert!(GenerationPreset::find("nope").is_none());
    }
}
