use core::ffi::{c_char, c_void};

/// Bump this when you break the ABI. The app checks it at load time.
pub const LLAMABRIDGE_ABI_VERSION: u32 = 1;

/// Heap string handed across the boundary. NUL-terminated; `len` excludes the NUL.
/// Release with `llamabridge_free_string`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct BridgeString {
    pub ptr: *mut c_char,
    pub len: usize,
}

impl BridgeString {
    pub const fn null() -> Self {
        Self {
            ptr: core::ptr::null_mut(),
            len: 0,
        }
    }

    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }
}

// ---------- Streaming callback (C ABI) ----------

/// Receives one UTF-8 fragment (`len` bytes, NUL-terminated). Return `false`
/// to signal that the consumer failed; generation then stops with an error.
pub type OnTokenFn = unsafe extern "C" fn(user_data: *mut c_void, text: *const c_char, len: usize) -> bool;

pub type OnCompletedFn = unsafe extern "C" fn(user_data: *mut c_void);

pub type OnErrorFn = unsafe extern "C" fn(user_data: *mut c_void, message: *const c_char);

/// Model preparation progress in bytes. Optional; called on the preparing thread.
pub type OnProgressFn = unsafe extern "C" fn(user_data: *mut c_void, copied: u64, total: u64);

/// Three-operation sink supplied by the caller for one streaming request.
/// All three functions are required. They are invoked on the thread that
/// called `llamabridge_infer_streaming`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct BridgeCallback {
    pub user_data: *mut c_void,
    pub on_token: Option<OnTokenFn>,
    pub on_completed: Option<OnCompletedFn>,
    pub on_error: Option<OnErrorFn>,
}

impl BridgeCallback {
    pub fn is_complete(&self) -> bool {
        self.on_token.is_some() && self.on_completed.is_some() && self.on_error.is_some()
    }
}
