use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{BridgeError, Result};

pub const MANIFEST_FILE: &str = "manifest.json";

/// One bundled model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    pub filename: String,
    pub version: String,
    pub size_bytes: u64,
    /// Hex digest, either case.
    pub sha256: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_ctx_hint: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub models: Vec<ModelEntry>,
}

impl ModelManifest {
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let bytes = fs::read(&path)
            .map_err(|e| BridgeError::Prep(format!("cannot read {}: {e}", path.display())))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// The model a single-model bundle ships.
    pub fn primary(&self) -> Result<&ModelEntry> {
        self.models
            .first()
            .ok_or_else(|| BridgeError::Prep("manifest lists no models".into()))
    }
}

/// Written next to the prepared model once it is verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub ready: bool,
    pub sha256: String,
    pub version: String,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_fields_default() {
        let js = r#"{"models":[{"name":"tiny","filename":"tiny.gguf","version":"1",
            "size_bytes":3,"sha256":"ab"}]}"#;
        let m: ModelManifest = serde_json::from_str(js).unwrap();
        let e = m.primary().unwrap();
        assert_eq!(e.quant, None);
        assert_eq!(e.n_ctx_hint, None);
    }

    #[test]
    fn empty_manifest_has_no_primary() {
        let m = ModelManifest { models: vec![] };
        assert!(matches!(m.primary(), Err(BridgeError::Prep(_))));
    }
}
