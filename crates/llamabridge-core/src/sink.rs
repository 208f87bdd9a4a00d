use thiserror::Error;

/// The consumer of a streamed response refused a fragment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("token sink rejected fragment: {0}")]
pub struct SinkError(pub String);

/// Receiver for one streaming request.
///
/// Exactly one of `on_completed` / `on_error` is called per request, except
/// after a cancel where neither is.
pub trait TokenSink {
    fn on_token(&mut self, fragment: &str) -> Result<(), SinkError>;

    fn on_completed(&mut self);

    fn on_error(&mut self, message: &str);
}

impl<T: TokenSink + ?Sized> TokenSink for &mut T {
    fn on_token(&mut self, fragment: &str) -> Result<(), SinkError> {
        (**self).on_token(fragment)
    }

    fn on_completed(&mut self) {
        (**self).on_completed()
    }

    fn on_error(&mut self, message: &str) {
        (**self).on_error(message)
    }
}
