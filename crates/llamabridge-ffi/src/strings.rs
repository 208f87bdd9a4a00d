//! Heap strings and the per-thread error slot shared by every export.

use core::ffi::c_char;
use std::cell::RefCell;
use std::ffi::CStr;

use llamabridge_abi::ffi::BridgeString;

thread_local! {
    static LAST_ERR: RefCell<Option<String>> = const { RefCell::new(None) };
}

pub(crate) fn set_last_error(msg: impl Into<String>) {
    let msg = msg.into();
    tracing::debug!(error = %msg, "ffi error recorded");
    LAST_ERR.with(|slot| *slot.borrow_mut() = Some(msg));
}

pub(crate) fn last_error() -> Option<String> {
    LAST_ERR.with(|slot| slot.borrow().clone())
}

/// Copy `s` into a NUL-terminated heap buffer owned by the caller.
pub(crate) fn make_string(s: &str) -> BridgeString {
    let mut v = Vec::with_capacity(s.len() + 1);
    v.extend_from_slice(s.as_bytes());
    v.push(0);
    let len = s.len();
    let ptr = Box::into_raw(v.into_boxed_slice()) as *mut c_char;
    BridgeString { ptr, len }
}

/// # Safety
/// `s` must come from [`make_string`] and not have been freed.
pub(crate) unsafe fn free_string(s: BridgeString) {
    if !s.ptr.is_null() {
        let slice = std::ptr::slice_from_raw_parts_mut(s.ptr as *mut u8, s.len + 1);
        drop(Box::from_raw(slice));
    }
}

/// Borrow a caller string argument as UTF-8.
///
/// # Safety
/// `p` is null or points at a NUL-terminated string valid for `'a`.
pub(crate) unsafe fn str_arg<'a>(p: *const c_char, what: &str) -> Result<&'a str, String> {
    if p.is_null() {
        return Err(format!("null {what}"));
    }
    CStr::from_ptr(p)
        .to_str()
        .map_err(|e| format!("invalid UTF-8 in {what}: {e}"))
}
