//! llamabridge ABI crate: the engine capability contract consumed by the core
//! session manager, plus the `#[repr(C)]` types of the foreign boundary.

pub mod backend;
pub mod ffi;
pub mod token;

pub use backend::*;
pub use token::*;
