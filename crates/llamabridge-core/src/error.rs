use llamabridge_abi::BackendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("session not initialized")]
    NotInitialized,

    #[error("another request is in flight")]
    Busy,

    #[error("model load failed: {0}")]
    ModelLoad(String),

    #[error("context construction failed: {0}")]
    ContextInit(String),

    #[error("prompt is empty after tokenization")]
    EmptyPrompt,

    #[error("decode prefill failed: {0}")]
    PrefillFailed(String),

    #[error("generation interrupted")]
    Interrupted,

    #[error("sampler construction failed: {0}")]
    Sampler(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("model preparation failed: {0}")]
    Prep(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Backend(BackendError),
}

impl BridgeError {
    /// Human-readable stand-in returned by the blocking boundary call instead of text.
    pub fn sentinel(&self) -> String {
        match self {
            BridgeError::NotInitialized => "(init() not called)".to_string(),
            BridgeError::Busy => "(busy: another request is in flight)".to_string(),
            BridgeError::ContextInit(_) => "(failed to recreate context)".to_string(),
            BridgeError::PrefillFailed(_) => "(decode prefill failed)".to_string(),
            other => format!("({other})"),
        }
    }
}

impl From<BackendError> for BridgeError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::ModelLoad(m) => BridgeError::ModelLoad(m),
            BackendError::ContextInit(m) => BridgeError::ContextInit(m),
            BackendError::Sampler(m) => BridgeError::Sampler(m),
            other => BridgeError::Backend(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
