//! Adapts a caller-supplied [`BridgeCallback`] to [`TokenSink`].

use core::ffi::c_char;
use std::ffi::CString;

use llamabridge_abi::ffi::BridgeCallback;
use llamabridge_core::{SinkError, TokenSink};

pub(crate) struct CallbackSink {
    cb: BridgeCallback,
    scratch: Vec<u8>,
}

impl CallbackSink {
    /// `None` when any of the three function pointers is missing.
    pub(crate) fn new(cb: BridgeCallback) -> Option<Self> {
        cb.is_complete().then(|| Self {
            cb,
            scratch: Vec::with_capacity(64),
        })
    }
}

impl TokenSink for CallbackSink {
    fn on_token(&mut self, fragment: &str) -> Result<(), SinkError> {
        let Some(f) = self.cb.on_token else {
            return Err(SinkError("on_token missing".into()));
        };
        self.scratch.clear();
        self.scratch.extend_from_slice(fragment.as_bytes());
        self.scratch.push(0);
        let accepted = unsafe {
            f(
                self.cb.user_data,
                self.scratch.as_ptr() as *const c_char,
                fragment.len(),
            )
        };
        if accepted {
            Ok(())
        } else {
            Err(SinkError("on_token returned false".into()))
        }
    }

    fn on_completed(&mut self) {
        if let Some(f) = self.cb.on_completed {
            unsafe { f(self.cb.user_data) };
        }
    }

    fn on_error(&mut self, message: &str) {
        let Some(f) = self.cb.on_error else { return };
        let msg = CString::new(message.replace('\0', " ")).unwrap_or_default();
        unsafe { f(self.cb.user_data, msg.as_ptr()) };
    }
}
