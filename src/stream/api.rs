//! Public API for the stream binding
//!
//! External modules should import from here rather than directly from
//! internal modules.

// Consumer adapter
pub use crate::stream::adapter::{
    BatchReport, StreamDispatcherBuilder, StreamEventDispatcher, StreamSettings,
    DEFAULT_SESSION_TIMEOUT, TOPIC_SUFFIX,
};
pub use crate::stream::heartbeat::{HeartbeatGate, DEFAULT_HEARTBEAT_INTERVAL};
pub use crate::stream::offsets::{CommitDecision, OffsetSnapshot, PartitionOffsetTracker, NO_OFFSET};
pub use crate::stream::throttle::{throttle_delay, throttle_hook, MAX_THROTTLE_MS, MIN_THROTTLE_MS};

// Broker capability
pub use crate::stream::broker::{
    BrokerClient, BrokerMessage, ConsumerSession, MessageBatch, ProducerRecord, TopicPartition,
    TopicPartitionOffset,
};
pub use crate::stream::codec::{EventCodec, JsonCodec};
pub use crate::stream::memory::{MemoryBroker, MemoryConsumerSession, DEFAULT_MAX_BATCH};

// Error handling
pub use crate::stream::error::{
    BrokerError, CodecError, FatalError, OffsetError, StreamError, StreamResult,
};
