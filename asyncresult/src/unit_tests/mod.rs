use crate::{AsyncError, AsyncResult, AsyncResultNotifier};


pub type TestResult = AsyncResult<String, AsyncError>;

pub fn test_notifier(initial: TestResult) -> AsyncResultNotifier<String, AsyncError> {
    AsyncResultNotifier::with_default_errors(initial)
}

pub fn message_error(message: &str) -> AsyncError {
    AsyncError::Error(message.to_string())
}
