//! Error types for the stream consumer and producer

use crate::core::error_handling::ContextualError;
use crate::core::mutex::MutexError;

/// Inconsistency between the offset tracker and the stream
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OffsetError {
    #[error("No offsets were ever recorded for {topic}:{partition}")]
    UnknownPartition { topic: String, partition: i32 },

    #[error("Offset {offset} of {topic}:{partition} is not awaiting completion")]
    UnknownOffset {
        topic: String,
        partition: i32,
        offset: i64,
    },

    #[error("Offset state unavailable: {message}")]
    Poisoned { message: String },
}

/// Failure reported by a broker client or consumer session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    #[error("Cannot reach broker {broker}: {message}")]
    Connection { broker: String, message: String },

    #[error("Send to topic {topic} failed: {message}")]
    Send { topic: String, message: String },

    #[error("Commit failed: {message}")]
    Commit { message: String },

    #[error("Heartbeat failed: {message}")]
    Heartbeat { message: String },

    #[error("Consumer session is closed")]
    SessionClosed,

    #[error("Broker state unavailable: {message}")]
    Internal { message: String },
}

/// Event (de)serialization failure
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Message has no value")]
    EmptyMessage,

    #[error("Not an event: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Cannot serialize event: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Producer side failure of `queue_event`, or a failed subscription
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

pub type StreamResult<T> = Result<T, StreamError>;

/// Conditions after which the consumer cannot safely continue
///
/// Each carries enough context to find the message in the log. The
/// adapter reports them to its [`FatalHandler`](crate::core::fatal::FatalHandler).
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    #[error("Offset tracking failed for {event} at {topic}:{partition} offset {offset}: {source}")]
    Tracking {
        topic: String,
        partition: i32,
        offset: i64,
        event: String,
        #[source]
        source: OffsetError,
    },

    #[error("Commit of offset {commit} for {topic}:{partition} failed after {event} (offset {offset}): {source}")]
    Commit {
        topic: String,
        partition: i32,
        offset: i64,
        commit: i64,
        event: String,
        #[source]
        source: BrokerError,
    },

    #[error("Commit lock unavailable for {topic}:{partition} offset {offset}: {source}")]
    CommitLock {
        topic: String,
        partition: i32,
        offset: i64,
        #[source]
        source: MutexError,
    },

    #[error("Consumer session for {topic} failed: {source}")]
    Consumer {
        topic: String,
        #[source]
        source: BrokerError,
    },
}

impl ContextualError for FatalError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}

impl ContextualError for StreamError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, StreamError::Broker(BrokerError::Connection { .. }))
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            StreamError::Broker(BrokerError::Connection { message, .. }) => Some(message),
            _ => None,
        }
    }
}
