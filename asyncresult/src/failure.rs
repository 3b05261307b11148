use std::any::Any;
use std::sync::Arc;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A type-erased error as produced by the futures and streams the notifier drives.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The caller-supplied normalizer turning a raw [`Failure`] into the typed error `E`.
pub type ErrorHandler<E> = Arc<dyn Fn(Failure) -> E + Send + Sync>;

/// A raw failure caught at a driver boundary, before normalization.
///
/// The notifier never interprets a `Failure`; it hands it to the caller's `on_error`
/// function to obtain the typed error stored in [`AsyncResult::Error`](crate::AsyncResult::Error).
#[derive(Error, Debug)]
pub enum Failure {
    /// The source failed with an error value.
    #[error(transparent)]
    Error(BoxError),

    /// The source panicked while being polled.
    #[error("task panicked: {0}")]
    Panicked(String),
}

impl Failure {
    /// Wraps anything convertible into a boxed error (`&str`, `String`, any `std::error::Error`).
    pub fn new(error: impl Into<BoxError>) -> Self {
        Failure::Error(error.into())
    }

    /// Builds a failure from a panic payload caught with `catch_unwind`.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "Box<dyn Any>".to_string()
        };
        Failure::Panicked(message)
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, Failure::Panicked(_))
    }

    /// Attempts to recover the concrete error type the source failed with.
    pub fn downcast_ref<T: std::error::Error + 'static>(&self) -> Option<&T> {
        match self {
            Failure::Error(error) => error.downcast_ref::<T>(),
            Failure::Panicked(_) => None,
        }
    }
}

/// A ready-made error type for notifiers that don't need their own.
///
/// Implements `From<Failure>`, so it works with
/// [`AsyncResultNotifier::with_default_errors`](crate::AsyncResultNotifier::with_default_errors).
#[derive(Error, Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AsyncError {
    /// A general error with a message describing what went wrong.
    #[error("{0}")]
    Error(String),

    /// The operation panicked.
    #[error("task panicked: {0}")]
    Panicked(String),
}

impl AsyncError {
    pub fn error(message: impl Into<String>) -> Self {
        AsyncError::Error(message.into())
    }

    /// Returns true if this error is a general error with a message.
    pub fn is_error(&self) -> bool {
        matches!(self, AsyncError::Error(_))
    }

    /// Returns true if the operation panicked.
    pub fn is_panicked(&self) -> bool {
        matches!(self, AsyncError::Panicked(_))
    }
}

impl From<Failure> for AsyncError {
    fn from(failure: Failure) -> Self {
        match failure {
            Failure::Error(error) => AsyncError::Error(error.to_string()),
            Failure::Panicked(message) => AsyncError::Panicked(message),
        }
    }
}
