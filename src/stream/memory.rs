//! In-process log broker
//!
//! Keeps every topic as a set of append-only partitions and every consumer
//! group's committed positions. Records are assigned to partitions by key
//! hash, so events of one type stay in order relative to each other. Used
//! by the binary and by tests in place of a networked broker.

use crate::core::sync::handle_mutex_poison;
use crate::stream::broker::{
    BrokerClient, BrokerMessage, ConsumerSession, MessageBatch, ProducerRecord, TopicPartition,
    TopicPartitionOffset,
};
use crate::stream::error::BrokerError;
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

/// Most records handed out in one batch
pub const DEFAULT_MAX_BATCH: usize = 100;

const BROKER_ADDRESS: &str = "memory";

#[derive(Debug, Clone)]
struct StoredRecord {
    key: String,
    value: Vec<u8>,
}

#[derive(Default)]
struct LogState {
    topics: HashMap<String, Vec<Vec<StoredRecord>>>,
    /// (group, partition) -> next offset to read
    committed: HashMap<(String, TopicPartition), i64>,
}

impl LogState {
    fn partitions_of(&mut self, topic: &str, count: usize) -> &mut Vec<Vec<StoredRecord>> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| vec![Vec::new(); count])
    }
}

struct BrokerState {
    partitions: usize,
    max_batch: usize,
    log: Mutex<LogState>,
    appended: Notify,
    sessions: Mutex<Vec<Arc<MemoryConsumerSession>>>,
    available: AtomicBool,
}

impl BrokerState {
    fn log(&self) -> Result<MutexGuard<'_, LogState>, BrokerError> {
        handle_mutex_poison(self.log.lock(), |message| BrokerError::Internal { message })
    }
}

#[derive(Clone)]
pub struct MemoryBroker {
    state: Arc<BrokerState>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new(1)
    }
}

impl MemoryBroker {
    /// Broker creating topics with `partitions` partitions (at least one)
    pub fn new(partitions: usize) -> Self {
        Self::with_max_batch(partitions, DEFAULT_MAX_BATCH)
    }

    pub fn with_max_batch(partitions: usize, max_batch: usize) -> Self {
        Self {
            state: Arc::new(BrokerState {
                partitions: partitions.max(1),
                max_batch: max_batch.max(1),
                log: Mutex::new(LogState::default()),
                appended: Notify::new(),
                sessions: Mutex::new(Vec::new()),
                available: AtomicBool::new(true),
            }),
        }
    }

    pub fn partition_count(&self) -> usize {
        self.state.partitions
    }

    /// While unavailable, sends and subscriptions are refused
    pub fn set_available(&self, available: bool) {
        self.state.available.store(available, Ordering::SeqCst);
    }

    fn is_available(&self) -> bool {
        self.state.available.load(Ordering::SeqCst)
    }

    fn partition_for(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.state.partitions as u64) as usize
    }

    /// Offset the next record of the partition will get
    pub fn end_offset(&self, topic: &str, partition: i32) -> i64 {
        self.state
            .log()
            .ok()
            .and_then(|log| {
                log.topics
                    .get(topic)
                    .and_then(|partitions| partitions.get(partition as usize))
                    .map(|records| records.len() as i64)
            })
            .unwrap_or(0)
    }

    /// Records stored for `topic` across all partitions
    pub fn record_count(&self, topic: &str) -> usize {
        self.state
            .log()
            .ok()
            .and_then(|log| {
                log.topics
                    .get(topic)
                    .map(|partitions| partitions.iter().map(Vec::len).sum())
            })
            .unwrap_or(0)
    }

    pub fn committed(&self, group_id: &str, topic: &str, partition: i32) -> Option<i64> {
        let log = self.state.log().ok()?;
        log.committed
            .get(&(group_id.to_string(), TopicPartition::new(topic, partition)))
            .copied()
    }

    /// True when `group_id` committed the end of every non-empty partition
    pub fn is_fully_committed(&self, group_id: &str, topic: &str) -> bool {
        let Ok(log) = self.state.log() else {
            return false;
        };
        let Some(partitions) = log.topics.get(topic) else {
            return true;
        };
        partitions.iter().enumerate().all(|(index, records)| {
            records.is_empty()
                || log
                    .committed
                    .get(&(group_id.to_string(), TopicPartition::new(topic, index as i32)))
                    .is_some_and(|&offset| offset >= records.len() as i64)
        })
    }

    /// Sessions opened through [`BrokerClient::subscribe`], oldest first
    pub fn sessions(&self) -> Vec<Arc<MemoryConsumerSession>> {
        self.state
            .sessions
            .lock()
            .map(|sessions| sessions.clone())
            .unwrap_or_default()
    }

    /// Join `group_id` on `topic` and return the concrete session
    pub fn open_session(
        &self,
        group_id: &str,
        topic: &str,
        from_beginning: bool,
    ) -> Result<Arc<MemoryConsumerSession>, BrokerError> {
        let positions = {
            let mut log = self.state.log()?;
            let ends: Vec<i64> = log
                .partitions_of(topic, self.state.partitions)
                .iter()
                .map(|records| records.len() as i64)
                .collect();
            ends.into_iter()
                .enumerate()
                .map(|(index, end)| {
                    let key = (group_id.to_string(), TopicPartition::new(topic, index as i32));
                    let start = match log.committed.get(&key) {
                        Some(&committed) => committed,
                        None if from_beginning => 0,
                        None => end,
                    };
                    (index as i32, start)
                })
                .collect()
        };

        let session = Arc::new(MemoryConsumerSession {
            broker: Arc::clone(&self.state),
            group_id: group_id.to_string(),
            topic: topic.to_string(),
            positions: Mutex::new(positions),
            buffered: Mutex::new(VecDeque::new()),
            running: AtomicBool::new(true),
            stale: AtomicBool::new(false),
            failing_commits: AtomicBool::new(false),
            failing_heartbeats: AtomicBool::new(false),
            heartbeats: AtomicUsize::new(0),
            commits: Mutex::new(Vec::new()),
            closed: Notify::new(),
        });
        if let Ok(mut sessions) = self.state.sessions.lock() {
            sessions.push(Arc::clone(&session));
        }
        log::debug!("Group {} joined {} at {:?}", group_id, topic, session.positions());
        Ok(session)
    }
}

#[async_trait]
impl BrokerClient for MemoryBroker {
    async fn send(&self, record: ProducerRecord) -> Result<TopicPartitionOffset, BrokerError> {
        if !self.is_available() {
            return Err(BrokerError::Send {
                topic: record.topic,
                message: "broker unavailable".to_string(),
            });
        }
        let index = self.partition_for(&record.key);
        let offset = {
            let mut log = self.state.log()?;
            let partitions = log.partitions_of(&record.topic, self.state.partitions);
            let records = &mut partitions[index];
            records.push(StoredRecord {
                key: record.key,
                value: record.value,
            });
            records.len() as i64 - 1
        };
        self.state.appended.notify_waiters();

        Ok(TopicPartitionOffset {
            topic: record.topic,
            partition: index as i32,
            offset,
        })
    }

    async fn subscribe(
        &self,
        group_id: &str,
        topic: &str,
        from_beginning: bool,
    ) -> Result<Arc<dyn ConsumerSession>, BrokerError> {
        if !self.is_available() {
            return Err(BrokerError::Connection {
                broker: BROKER_ADDRESS.to_string(),
                message: format!("group {} cannot join {}", group_id, topic),
            });
        }
        let session: Arc<dyn ConsumerSession> = self.open_session(group_id, topic, from_beginning)?;
        Ok(session)
    }
}

/// A consumer group member of a [`MemoryBroker`]
pub struct MemoryConsumerSession {
    broker: Arc<BrokerState>,
    group_id: String,
    topic: String,
    /// partition -> next offset to fetch
    positions: Mutex<HashMap<i32, i64>>,
    buffered: Mutex<VecDeque<MessageBatch>>,
    running: AtomicBool,
    stale: AtomicBool,
    failing_commits: AtomicBool,
    failing_heartbeats: AtomicBool,
    heartbeats: AtomicUsize,
    commits: Mutex<Vec<TopicPartitionOffset>>,
    closed: Notify,
}

impl MemoryConsumerSession {
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Fetch positions, sorted by partition
    pub fn positions(&self) -> Vec<(i32, i64)> {
        let mut positions: Vec<(i32, i64)> = self
            .positions
            .lock()
            .map(|positions| positions.iter().map(|(p, o)| (*p, *o)).collect())
            .unwrap_or_default();
        positions.sort_unstable();
        positions
    }

    pub fn heartbeats(&self) -> usize {
        self.heartbeats.load(Ordering::SeqCst)
    }

    /// Every commit in the order it arrived
    pub fn commits(&self) -> Vec<TopicPartitionOffset> {
        self.commits
            .lock()
            .map(|commits| commits.clone())
            .unwrap_or_default()
    }

    /// Make subsequent commits fail
    pub fn fail_commits(&self, failing: bool) {
        self.failing_commits.store(failing, Ordering::SeqCst);
    }

    pub fn fail_heartbeats(&self, failing: bool) {
        self.failing_heartbeats.store(failing, Ordering::SeqCst);
    }

    /// Mark the current assignment as revoked
    pub fn set_stale(&self, stale: bool) {
        self.stale.store(stale, Ordering::SeqCst);
    }

    /// Take one batch per partition with unread records, advancing the
    /// fetch positions
    pub fn poll_batches(&self) -> Result<Vec<MessageBatch>, BrokerError> {
        let mut positions = handle_mutex_poison(self.positions.lock(), |message| {
            BrokerError::Internal { message }
        })?;
        let log = self.broker.log()?;
        let Some(partitions) = log.topics.get(&self.topic) else {
            return Ok(Vec::new());
        };

        let mut batches = Vec::new();
        for (index, records) in partitions.iter().enumerate() {
            let partition = index as i32;
            let position = positions.entry(partition).or_insert(0);
            let start = (*position).max(0) as usize;
            if start >= records.len() {
                continue;
            }
            let end = records.len().min(start + self.broker.max_batch);
            let messages = records[start..end]
                .iter()
                .enumerate()
                .map(|(i, record)| BrokerMessage {
                    offset: (start + i) as i64,
                    key: Some(record.key.clone().into_bytes()),
                    value: Some(record.value.clone()),
                })
                .collect();
            *position = end as i64;
            batches.push(MessageBatch {
                topic: self.topic.clone(),
                partition,
                messages,
            });
        }
        Ok(batches)
    }

    fn take_buffered(&self) -> Result<Option<MessageBatch>, BrokerError> {
        let mut buffered = handle_mutex_poison(self.buffered.lock(), |message| {
            BrokerError::Internal { message }
        })?;
        if buffered.is_empty() {
            buffered.extend(self.poll_batches()?);
        }
        Ok(buffered.pop_front())
    }
}

#[async_trait]
impl ConsumerSession for MemoryConsumerSession {
    async fn next_batch(&self) -> Result<Option<MessageBatch>, BrokerError> {
        loop {
            let appended = self.broker.appended.notified();
            let closed = self.closed.notified();
            if !self.is_running() {
                return Ok(None);
            }
            if let Some(batch) = self.take_buffered()? {
                return Ok(Some(batch));
            }
            tokio::select! {
                _ = appended => {}
                _ = closed => {}
            }
        }
    }

    async fn heartbeat(&self) -> Result<(), BrokerError> {
        if !self.is_running() {
            return Err(BrokerError::SessionClosed);
        }
        if self.failing_heartbeats.load(Ordering::SeqCst) {
            return Err(BrokerError::Heartbeat {
                message: format!("group {} is rebalancing", self.group_id),
            });
        }
        self.heartbeats.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn commit_offsets(&self, offsets: &[TopicPartitionOffset]) -> Result<(), BrokerError> {
        if self.failing_commits.load(Ordering::SeqCst) {
            return Err(BrokerError::Commit {
                message: format!("group {} rejected commit of {:?}", self.group_id, offsets),
            });
        }

        let mut log = self.broker.log()?;
        let mut commits = handle_mutex_poison(self.commits.lock(), |message| {
            BrokerError::Internal { message }
        })?;
        for position in offsets {
            log.committed.insert(
                (
                    self.group_id.clone(),
                    TopicPartition::new(position.topic.clone(), position.partition),
                ),
                position.offset,
            );
            commits.push(position.clone());
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn is_stale(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.closed.notify_waiters();
    }
}
