use asyncresult::{AsyncResult, AsyncResultNotifier, Failure};

/// Errors compare by message, like the normalizer in most UI code.
#[derive(Clone, Debug, PartialEq)]
pub struct UiError {
    pub message: String,
}

impl UiError {
    pub fn new(message: &str) -> Self {
        UiError {
            message: message.to_string(),
        }
    }
}

pub fn normalize(failure: Failure) -> UiError {
    UiError {
        message: failure.to_string(),
    }
}

pub fn notifier(initial: AsyncResult<String, UiError>) -> AsyncResultNotifier<String, UiError> {
    AsyncResultNotifier::new(initial, normalize)
}
