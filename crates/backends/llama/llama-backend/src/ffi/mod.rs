pub mod batch;
pub mod context;
pub mod model;
pub mod runtime;
pub mod sampling;

pub use runtime::*;

#[inline]
pub(crate) fn trace(msg: &str) {
    #[cfg(feature = "ffi-trace")]
    tracing::trace!(target: "llama_backend::ffi", "{msg}");
    #[cfg(not(feature = "ffi-trace"))]
    let _ = msg;
}
