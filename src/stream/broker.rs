//! Broker capability seen by the consumer adapter
//!
//! The adapter never talks to a concrete log broker. It needs a client that
//! can send records and join a consumer group, and a session that hands out
//! batches, accepts heartbeats and commits offsets.

use crate::stream::error::BrokerError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Identifies one partition of one topic
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.topic, self.partition)
    }
}

/// One record as delivered to a consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
}

/// Consecutive records of a single partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBatch {
    pub topic: String,
    pub partition: i32,
    pub messages: Vec<BrokerMessage>,
}

impl MessageBatch {
    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition::new(self.topic.clone(), self.partition)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// A record to publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerRecord {
    pub topic: String,
    pub key: String,
    pub value: Vec<u8>,
}

/// A position in a partition; as a commit it names the next offset to read
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicPartitionOffset {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

impl fmt::Display for TopicPartitionOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.topic, self.partition, self.offset)
    }
}

/// Membership of one consumer in its group
#[async_trait]
pub trait ConsumerSession: Send + Sync {
    /// Wait for the next batch; `None` once the session is closed
    async fn next_batch(&self) -> Result<Option<MessageBatch>, BrokerError>;

    /// Tell the group coordinator this consumer is alive
    async fn heartbeat(&self) -> Result<(), BrokerError>;

    async fn commit_offsets(&self, offsets: &[TopicPartitionOffset]) -> Result<(), BrokerError>;

    fn is_running(&self) -> bool;

    /// True when a rebalance made the current batch obsolete
    fn is_stale(&self) -> bool;

    /// Leave the group; a pending `next_batch` returns `None`
    fn close(&self);
}

#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Publish a record; returns where it landed
    async fn send(&self, record: ProducerRecord) -> Result<TopicPartitionOffset, BrokerError>;

    /// Join `group_id` and consume `topic`
    ///
    /// With `from_beginning` a group without committed offsets starts at the
    /// oldest record, otherwise at the end of the log.
    async fn subscribe(
        &self,
        group_id: &str,
        topic: &str,
        from_beginning: bool,
    ) -> Result<Arc<dyn ConsumerSession>, BrokerError>;
}
