use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The state of a single asynchronous operation.
///
/// `Loading` and `LoadingMore` are both loading-kind states (see [`AsyncResult::is_loading`]);
/// `LoadingMore` always carries a value. `Empty`, `Ok` and `Error` form the settled subset,
/// available on its own as [`Maybe`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AsyncResult<T, E> {
    /// Finished with no data, or never started.
    Empty,
    /// A load is in progress. May keep the previous value and error around for display.
    Loading { value: Option<T>, error: Option<E> },
    /// A refresh is in progress while a known-good value is available.
    LoadingMore { value: T, error: Option<E> },
    /// The operation succeeded.
    Ok { value: T },
    /// The operation failed, possibly keeping the last good value.
    Error {
        error: E,
        value: Option<T>,
        #[cfg_attr(feature = "serde", serde(skip))]
        trace: Option<Trace>,
    },
}

/// The settled subset of [`AsyncResult`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Maybe<T, E> {
    Empty,
    Ok { value: T },
    Error {
        error: E,
        value: Option<T>,
        #[cfg_attr(feature = "serde", serde(skip))]
        trace: Option<Trace>,
    },
}

/// The loading-kind subset of [`AsyncResult`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Pending<T, E> {
    Loading { value: Option<T>, error: Option<E> },
    LoadingMore { value: T, error: Option<E> },
}

/// A backtrace captured where a failure was caught.
///
/// Traces are diagnostic only: every trace compares equal to every other trace and contributes
/// nothing to a hash, so they never affect the equality of the state carrying them.
#[derive(Clone)]
pub struct Trace(Arc<Backtrace>);

impl Trace {
    /// Captures a backtrace of the caller, honoring `RUST_BACKTRACE` / `RUST_LIB_BACKTRACE`.
    ///
    /// Returns `None` when backtraces are disabled or unsupported on this platform.
    pub fn capture() -> Option<Self> {
        let backtrace = Backtrace::capture();
        match backtrace.status() {
            BacktraceStatus::Captured => Some(Trace(Arc::new(backtrace))),
            _ => None,
        }
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.0
    }
}

impl From<Backtrace> for Trace {
    fn from(backtrace: Backtrace) -> Self {
        Trace(Arc::new(backtrace))
    }
}

impl fmt::Debug for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl PartialEq for Trace {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for Trace {}

impl Hash for Trace {
    fn hash<H: Hasher>(&self, _state: &mut H) {}
}

impl<T, E> AsyncResult<T, E> {
    pub fn empty() -> Self {
        AsyncResult::Empty
    }

    pub fn loading(value: Option<T>) -> Self {
        AsyncResult::Loading { value, error: None }
    }

    pub fn loading_with_error(value: Option<T>, error: Option<E>) -> Self {
        AsyncResult::Loading { value, error }
    }

    pub fn loading_more(value: T) -> Self {
        AsyncResult::LoadingMore { value, error: None }
    }

    pub fn loading_more_with_error(value: T, error: Option<E>) -> Self {
        AsyncResult::LoadingMore { value, error }
    }

    pub fn ok(value: T) -> Self {
        AsyncResult::Ok { value }
    }

    pub fn error(error: E) -> Self {
        AsyncResult::Error {
            error,
            value: None,
            trace: None,
        }
    }

    pub fn error_with(error: E, value: Option<T>, trace: Option<Trace>) -> Self {
        AsyncResult::Error {
            error,
            value,
            trace,
        }
    }

    /// True for both `Loading` and `LoadingMore`.
    pub fn is_loading(&self) -> bool {
        matches!(
            self,
            AsyncResult::Loading { .. } | AsyncResult::LoadingMore { .. }
        )
    }

    pub fn is_loading_more(&self) -> bool {
        matches!(self, AsyncResult::LoadingMore { .. })
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, AsyncResult::Empty)
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, AsyncResult::Ok { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, AsyncResult::Error { .. })
    }

    /// True for the settled states: `Empty`, `Ok` and `Error`.
    pub fn is_settled(&self) -> bool {
        !self.is_loading()
    }

    /// True when nothing is loaded and nothing is loading: `Empty` or `Error`.
    pub fn should_load(&self) -> bool {
        matches!(self, AsyncResult::Empty | AsyncResult::Error { .. })
    }

    /// The carried value, wherever the variant keeps it.
    pub fn value_ref(&self) -> Option<&T> {
        match self {
            AsyncResult::Empty => None,
            AsyncResult::Loading { value, .. } => value.as_ref(),
            AsyncResult::LoadingMore { value, .. } => Some(value),
            AsyncResult::Ok { value } => Some(value),
            AsyncResult::Error { value, .. } => value.as_ref(),
        }
    }

    pub fn value(self) -> Option<T> {
        match self {
            AsyncResult::Empty => None,
            AsyncResult::Loading { value, .. } => value,
            AsyncResult::LoadingMore { value, .. } => Some(value),
            AsyncResult::Ok { value } => Some(value),
            AsyncResult::Error { value, .. } => value,
        }
    }

    /// The carried error: the failure of `Error`, or the stale error of a loading state.
    pub fn error_ref(&self) -> Option<&E> {
        match self {
            AsyncResult::Empty | AsyncResult::Ok { .. } => None,
            AsyncResult::Loading { error, .. } | AsyncResult::LoadingMore { error, .. } => {
                error.as_ref()
            }
            AsyncResult::Error { error, .. } => Some(error),
        }
    }

    pub fn trace(&self) -> Option<&Trace> {
        match self {
            AsyncResult::Error { trace, .. } => trace.as_ref(),
            _ => None,
        }
    }

    pub fn as_ref(&self) -> AsyncResult<&T, &E> {
        match self {
            AsyncResult::Empty => AsyncResult::Empty,
            AsyncResult::Loading { value, error } => AsyncResult::Loading {
                value: value.as_ref(),
                error: error.as_ref(),
            },
            AsyncResult::LoadingMore { value, error } => AsyncResult::LoadingMore {
                value,
                error: error.as_ref(),
            },
            AsyncResult::Ok { value } => AsyncResult::Ok { value },
            AsyncResult::Error {
                error,
                value,
                trace,
            } => AsyncResult::Error {
                error,
                value: value.as_ref(),
                trace: trace.clone(),
            },
        }
    }

    pub fn map<U, F>(self, op: F) -> AsyncResult<U, E>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            AsyncResult::Empty => AsyncResult::Empty,
            AsyncResult::Loading { value, error } => AsyncResult::Loading {
                value: value.map(op),
                error,
            },
            AsyncResult::LoadingMore { value, error } => AsyncResult::LoadingMore {
                value: op(value),
                error,
            },
            AsyncResult::Ok { value } => AsyncResult::Ok { value: op(value) },
            AsyncResult::Error {
                error,
                value,
                trace,
            } => AsyncResult::Error {
                error,
                value: value.map(op),
                trace,
            },
        }
    }

    pub fn map_err<F2, O>(self, op: O) -> AsyncResult<T, F2>
    where
        O: FnOnce(E) -> F2,
    {
        match self {
            AsyncResult::Empty => AsyncResult::Empty,
            AsyncResult::Loading { value, error } => AsyncResult::Loading {
                value,
                error: error.map(op),
            },
            AsyncResult::LoadingMore { value, error } => AsyncResult::LoadingMore {
                value,
                error: error.map(op),
            },
            AsyncResult::Ok { value } => AsyncResult::Ok { value },
            AsyncResult::Error {
                error,
                value,
                trace,
            } => AsyncResult::Error {
                error: op(error),
                value,
                trace,
            },
        }
    }

    /// Short variant name, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AsyncResult::Empty => "Empty",
            AsyncResult::Loading { .. } => "Loading",
            AsyncResult::LoadingMore { .. } => "LoadingMore",
            AsyncResult::Ok { .. } => "Ok",
            AsyncResult::Error { .. } => "Error",
        }
    }
}

impl<T, E> Default for AsyncResult<T, E> {
    fn default() -> Self {
        AsyncResult::Empty
    }
}

impl<T, E> From<Result<T, E>> for AsyncResult<T, E> {
    fn from(value: Result<T, E>) -> Self {
        match value {
            Ok(value) => AsyncResult::ok(value),
            Err(error) => AsyncResult::error(error),
        }
    }
}

impl<T, E> From<Maybe<T, E>> for AsyncResult<T, E> {
    fn from(value: Maybe<T, E>) -> Self {
        match value {
            Maybe::Empty => AsyncResult::Empty,
            Maybe::Ok { value } => AsyncResult::Ok { value },
            Maybe::Error {
                error,
                value,
                trace,
            } => AsyncResult::Error {
                error,
                value,
                trace,
            },
        }
    }
}

impl<T, E> From<Pending<T, E>> for AsyncResult<T, E> {
    fn from(value: Pending<T, E>) -> Self {
        match value {
            Pending::Loading { value, error } => AsyncResult::Loading { value, error },
            Pending::LoadingMore { value, error } => AsyncResult::LoadingMore { value, error },
        }
    }
}

impl<T, E> TryFrom<AsyncResult<T, E>> for Maybe<T, E> {
    type Error = AsyncResult<T, E>;

    fn try_from(value: AsyncResult<T, E>) -> Result<Self, AsyncResult<T, E>> {
        match value {
            AsyncResult::Empty => Ok(Maybe::Empty),
            AsyncResult::Ok { value } => Ok(Maybe::Ok { value }),
            AsyncResult::Error {
                error,
                value,
                trace,
            } => Ok(Maybe::Error {
                error,
                value,
                trace,
            }),
            loading @ (AsyncResult::Loading { .. } | AsyncResult::LoadingMore { .. }) => {
                Err(loading)
            }
        }
    }
}

impl<T, E> TryFrom<AsyncResult<T, E>> for Pending<T, E> {
    type Error = AsyncResult<T, E>;

    fn try_from(value: AsyncResult<T, E>) -> Result<Self, AsyncResult<T, E>> {
        match value {
            AsyncResult::Loading { value, error } => Ok(Pending::Loading { value, error }),
            AsyncResult::LoadingMore { value, error } => Ok(Pending::LoadingMore { value, error }),
            settled @ (AsyncResult::Empty | AsyncResult::Ok { .. } | AsyncResult::Error { .. }) => {
                Err(settled)
            }
        }
    }
}

impl<T, E> Maybe<T, E> {
    pub fn value_ref(&self) -> Option<&T> {
        match self {
            Maybe::Empty => None,
            Maybe::Ok { value } => Some(value),
            Maybe::Error { value, .. } => value.as_ref(),
        }
    }
}

impl<T, E> Pending<T, E> {
    pub fn value_ref(&self) -> Option<&T> {
        match self {
            Pending::Loading { value, .. } => value.as_ref(),
            Pending::LoadingMore { value, .. } => Some(value),
        }
    }
}
