//! Error types for event delivery

use crate::queue::api::QueueError;

/// Failure reported by a listener
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListenerError {
    /// Transient failure; the dispatcher retries it
    #[error("{message}")]
    Failed { message: String },

    /// Permanent failure; retrying cannot help
    #[error("{message}")]
    DoNotRetry { message: String },
}

impl ListenerError {
    pub fn failed(message: impl Into<String>) -> Self {
        ListenerError::Failed {
            message: message.into(),
        }
    }

    pub fn do_not_retry(message: impl Into<String>) -> Self {
        ListenerError::DoNotRetry {
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ListenerError::Failed { .. })
    }

    /// The underlying failure message
    pub fn cause(&self) -> &str {
        match self {
            ListenerError::Failed { message } | ListenerError::DoNotRetry { message } => message,
        }
    }
}

/// Outcome reported through a completion handle
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("Listener {listener} failed on {event}: {source}")]
    ListenerFailed {
        listener: String,
        event: String,
        #[source]
        source: ListenerError,
    },

    #[error("Event {event} was dropped before it was dispatched")]
    Abandoned { event: String },

    #[error("Could not queue event: {0}")]
    Queue(#[from] QueueError),
}

impl DispatchError {
    /// The listener's error, if a listener caused this
    pub fn listener_error(&self) -> Option<&ListenerError> {
        match self {
            DispatchError::ListenerFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;
