use crate::async_result::Trace;
use crate::failure::{BoxError, Failure};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The lifecycle of an externally observed asynchronous connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConnectionState {
    /// Not connected to any computation yet.
    #[default]
    None,
    /// Connected and waiting for the first (or next) interaction.
    Waiting,
    /// Connected to an active source that may still produce data.
    Active,
    /// Connected to a source that has terminated.
    Done,
}

/// A point-in-time view of an asynchronous connection: its state plus the last data and error seen.
#[derive(Debug)]
pub struct Snapshot<T> {
    pub state: ConnectionState,
    pub data: Option<T>,
    pub error: Option<Failure>,
    pub trace: Option<Trace>,
}

impl<T> Snapshot<T> {
    pub fn nothing() -> Self {
        Snapshot::in_state(ConnectionState::None)
    }

    pub fn waiting() -> Self {
        Snapshot::in_state(ConnectionState::Waiting)
    }

    pub fn in_state(state: ConnectionState) -> Self {
        Snapshot {
            state,
            data: None,
            error: None,
            trace: None,
        }
    }

    pub fn with_data(state: ConnectionState, data: T) -> Self {
        Snapshot {
            data: Some(data),
            ..Snapshot::in_state(state)
        }
    }

    pub fn with_error(state: ConnectionState, error: impl Into<BoxError>) -> Self {
        Snapshot {
            error: Some(Failure::new(error)),
            ..Snapshot::in_state(state)
        }
    }

    /// Replaces the stored data, keeping state and error.
    pub fn and_data(self, data: T) -> Self {
        Snapshot {
            data: Some(data),
            ..self
        }
    }

    pub fn and_trace(self, trace: Option<Trace>) -> Self {
        Snapshot { trace, ..self }
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Snapshot::nothing()
    }
}
