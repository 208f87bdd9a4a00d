//! llama.cpp engine for llamabridge.
//!
//! RAII wrappers over `llama-cpp-sys-2`: every raw handle is owned by exactly
//! one Rust value and freed in its `Drop`. All `unsafe` calls are confined to
//! [`ffi`]; the rest of the crate implements the `llamabridge-abi` traits on
//! top of it.

pub mod backend;
pub mod batch;
pub mod context;
pub mod ffi;
pub mod format;
pub mod model;
pub mod sampling;
pub mod vocab;

pub use backend::LlamaBackend;
pub use batch::LlamaBatch;
pub use context::LlamaContext;
pub use model::LlamaModel;
pub use sampling::LlamaSampler;
pub use vocab::LlamaVocab;
