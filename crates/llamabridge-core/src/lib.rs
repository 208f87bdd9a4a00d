//! llamabridge core: the inference session manager sitting between a managed
//! caller and an inference engine.
//!
//! The engine is consumed through [`llamabridge_abi::InferenceBackend`]; the
//! caller talks to a [`Session`] directly or to the process-wide [`Bridge`].

pub mod bridge;
pub mod cancel;
pub mod clamp;
pub mod config;
pub mod error;
pub mod format;
pub mod prep;
pub mod sampler;
pub mod session;
pub mod sink;
pub mod tokenize;

pub use bridge::Bridge;
pub use cancel::CancelToken;
pub use config::{GenerationParams, GenerationPreset, SessionConfig};
pub use error::{BridgeError, Result};
pub use session::{Session, StreamEnd};
pub use sink::{SinkError, TokenSink};
