//! Stream consumer adapter
//!
//! Binds a log broker to a local [`EventDispatcher`]. Producers publish
//! events onto the `<hostId>_events` topic with
//! [`StreamEventDispatcher::queue_event`]; the consumer side receives them
//! in batches, runs every message of a batch through the local dispatcher
//! concurrently (so priorities can reorder them) and commits the partition
//! watermark as messages finish.
//!
//! Per message:
//!
//! 1. skip when the session is no longer running or the batch went stale
//! 2. decode; a value that is not an event is logged and completed at once
//! 3. record the offset, dispatch locally and wait for the outcome
//! 4. complete the offset and commit if the watermark advanced
//!
//! Heartbeats go out between these steps whenever they are due. A failure
//! to keep the offsets consistent with the broker is fatal: it is reported
//! to the [`FatalHandler`] so the consumer restarts from its last commit.

use crate::core::error_handling::log_error_with_context;
use crate::core::fatal::{FatalHandler, ProcessExit};
use crate::core::mutex::AsyncMutex;
use crate::core::time::{SystemTimeProvider, TimeProvider};
use crate::events::api::{Event, EventDispatcher, Listener};
use crate::stream::broker::{
    BrokerClient, BrokerMessage, ConsumerSession, MessageBatch, ProducerRecord, TopicPartition,
    TopicPartitionOffset,
};
use crate::stream::codec::{EventCodec, JsonCodec};
use crate::stream::error::{BrokerError, FatalError, StreamResult};
use crate::stream::heartbeat::{HeartbeatGate, DEFAULT_HEARTBEAT_INTERVAL};
use crate::stream::offsets::{CommitDecision, PartitionOffsetTracker};
use crate::stream::throttle::throttle_hook;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;

/// Suffix of the per-host event topic
pub const TOPIC_SUFFIX: &str = "_events";

/// Default broker session timeout
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_millis(120_000);

/// Identity and timing of one stream consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
    pub host_id: String,
    pub module_name: String,
    /// `host:port` of the broker, for logs and connection errors
    pub broker: String,
    pub heartbeat_interval: Duration,
    pub session_timeout: Duration,
    /// Longest wait for the commit lock; `None` waits indefinitely
    pub commit_timeout: Option<Duration>,
    pub commit_capacity: usize,
}

impl StreamSettings {
    pub fn new(host_id: impl Into<String>, module_name: impl Into<String>) -> Self {
        Self {
            host_id: host_id.into(),
            module_name: module_name.into(),
            broker: "localhost:9092".to_string(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            commit_timeout: None,
            commit_capacity: 1,
        }
    }

    /// `<moduleName>@<hostId>`, also the consumer group
    pub fn client_id(&self) -> String {
        format!("{}@{}", self.module_name, self.host_id)
    }

    pub fn topic(&self) -> String {
        format!("{}{}", self.host_id, TOPIC_SUFFIX)
    }
}

/// How the messages of one batch ended
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    /// Delivered to every listener
    pub dispatched: usize,
    /// Delivered, but at least one listener finally failed
    pub rejected: usize,
    /// Not an event; completed without dispatch
    pub undecodable: usize,
    /// Left alone because the session stopped or went stale
    pub skipped: usize,
    /// Hit an unrecoverable error
    pub fatal: usize,
}

impl BatchReport {
    fn add(&mut self, outcome: MessageOutcome) {
        match outcome {
            MessageOutcome::Dispatched => self.dispatched += 1,
            MessageOutcome::Rejected => self.rejected += 1,
            MessageOutcome::Undecodable => self.undecodable += 1,
            MessageOutcome::Skipped => self.skipped += 1,
            MessageOutcome::Fatal => self.fatal += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageOutcome {
    Dispatched,
    Rejected,
    Undecodable,
    Skipped,
    Fatal,
}

struct StreamCore<E: Event> {
    settings: StreamSettings,
    client_id: String,
    topic: String,
    broker: Arc<dyn BrokerClient>,
    codec: Arc<dyn EventCodec<E>>,
    dispatcher: EventDispatcher<E>,
    offsets: PartitionOffsetTracker,
    commit_lock: AsyncMutex,
    fatal: Arc<dyn FatalHandler>,
    clock: Arc<dyn TimeProvider>,
    session: OnceCell<Arc<dyn ConsumerSession>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

/// Configures a [`StreamEventDispatcher`]
pub struct StreamDispatcherBuilder<E: Event> {
    settings: StreamSettings,
    broker: Arc<dyn BrokerClient>,
    codec: Option<Arc<dyn EventCodec<E>>>,
    dispatcher: Option<EventDispatcher<E>>,
    fatal: Option<Arc<dyn FatalHandler>>,
    clock: Option<Arc<dyn TimeProvider>>,
}

impl<E: Event> StreamDispatcherBuilder<E> {
    pub fn codec(mut self, codec: Arc<dyn EventCodec<E>>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Local dispatcher to run consumed events through
    pub fn dispatcher(mut self, dispatcher: EventDispatcher<E>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn fatal_handler(mut self, fatal: Arc<dyn FatalHandler>) -> Self {
        self.fatal = Some(fatal);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = Some(clock);
        self
    }
}

impl<E> StreamDispatcherBuilder<E>
where
    E: Event + PartialEq + Serialize + DeserializeOwned,
{
    /// Missing parts default to JSON, a throttled dispatcher, process exit
    /// on fatal errors and the system clock
    pub fn build(self) -> StreamEventDispatcher<E> {
        let codec = self.codec.unwrap_or_else(|| Arc::new(JsonCodec));
        let dispatcher = self.dispatcher.unwrap_or_else(|| {
            EventDispatcher::builder()
                .pause_hook(throttle_hook())
                .build()
        });
        let fatal = self
            .fatal
            .unwrap_or_else(|| Arc::new(ProcessExit::default()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemTimeProvider));

        StreamEventDispatcher {
            core: Arc::new(StreamCore {
                client_id: self.settings.client_id(),
                topic: self.settings.topic(),
                commit_lock: AsyncMutex::new(self.settings.commit_capacity),
                settings: self.settings,
                broker: self.broker,
                codec,
                dispatcher,
                offsets: PartitionOffsetTracker::new(),
                fatal,
                clock,
                session: OnceCell::new(),
                consumer: Mutex::new(None),
            }),
        }
    }
}

/// Event dispatcher backed by a log broker topic
pub struct StreamEventDispatcher<E: Event> {
    core: Arc<StreamCore<E>>,
}

impl<E: Event> Clone for StreamEventDispatcher<E> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<E: Event> StreamEventDispatcher<E> {
    pub fn builder(settings: StreamSettings, broker: Arc<dyn BrokerClient>) -> StreamDispatcherBuilder<E> {
        StreamDispatcherBuilder {
            settings,
            broker,
            codec: None,
            dispatcher: None,
            fatal: None,
            clock: None,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.core.client_id
    }

    pub fn topic(&self) -> &str {
        &self.core.topic
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.core.settings
    }

    /// The local dispatcher consumed events run through
    pub fn dispatcher(&self) -> &EventDispatcher<E> {
        &self.core.dispatcher
    }

    pub fn offsets(&self) -> &PartitionOffsetTracker {
        &self.core.offsets
    }

    /// Publish `event` on the topic; returns where it landed
    pub async fn queue_event(&self, event: E) -> StreamResult<TopicPartitionOffset> {
        let description = event.describe();
        log::info!("Queueing event {}", description);

        let record = ProducerRecord {
            topic: self.core.topic.clone(),
            key: event.event_type().to_string(),
            value: self.core.codec.encode(&event)?,
        };
        let position = self.core.broker.send(record).await?;
        log::debug!("Event {} sent. Metadata {}", description, position);
        Ok(position)
    }

    /// Register a listener; the first call also starts consuming
    ///
    /// Returns false if the listener was already registered.
    pub async fn add_listener(&self, listener: Arc<dyn Listener<E>>) -> StreamResult<bool> {
        let added = self.core.dispatcher.add_listener(listener);
        self.ensure_consuming().await?;
        Ok(added)
    }

    async fn ensure_consuming(&self) -> Result<(), BrokerError> {
        let core = &self.core;
        core.session
            .get_or_try_init(move || async move {
                log::info!(
                    "Connecting {} to {} (session timeout {}ms, heartbeat every {}ms)",
                    core.client_id,
                    core.settings.broker,
                    core.settings.session_timeout.as_millis(),
                    core.settings.heartbeat_interval.as_millis()
                );
                let session = core.broker.subscribe(&core.client_id, &core.topic, true).await?;
                log::info!("Subscribed to {}", core.topic);

                let handle = tokio::spawn(consume(Arc::clone(core), Arc::clone(&session)));
                match core.consumer.lock() {
                    Ok(mut consumer) => *consumer = Some(handle),
                    Err(_) => log::warn!("Consumer task handle could not be stored"),
                }
                Ok::<_, BrokerError>(session)
            })
            .await?;
        Ok(())
    }

    /// Run one batch through the local dispatcher
    ///
    /// Messages are handled concurrently; returns once every one of them
    /// was completed or skipped.
    pub async fn handle_batch(&self, batch: MessageBatch, session: &dyn ConsumerSession) -> BatchReport {
        self.core.handle_batch(batch, session).await
    }

    /// Leave the consumer group once the batch in progress is finished
    pub async fn shutdown(&self) {
        if let Some(session) = self.core.session.get() {
            session.close();
        }
        let handle = self
            .core
            .consumer
            .lock()
            .ok()
            .and_then(|mut consumer| consumer.take());
        if let Some(handle) = handle {
            if let Err(error) = handle.await {
                log::error!("Consumer task of {} ended abnormally: {}", self.core.client_id, error);
            }
        }
        self.core.dispatcher.wait_idle().await;
        log::info!("Consumer {} stopped", self.core.client_id);
    }
}

async fn consume<E: Event>(core: Arc<StreamCore<E>>, session: Arc<dyn ConsumerSession>) {
    loop {
        match session.next_batch().await {
            Ok(Some(batch)) => {
                let report = core.handle_batch(batch, session.as_ref()).await;
                log::trace!("Batch finished: {:?}", report);
            }
            Ok(None) => {
                log::info!("Consumer {} left topic {}", core.client_id, core.topic);
                break;
            }
            Err(source) => {
                core.fail(FatalError::Consumer {
                    topic: core.topic.clone(),
                    source,
                });
                break;
            }
        }
    }
}

impl<E: Event> StreamCore<E> {
    async fn handle_batch(&self, batch: MessageBatch, session: &dyn ConsumerSession) -> BatchReport {
        let partition = batch.topic_partition();
        log::debug!("Received batch of {} message(s) from {}", batch.len(), partition);

        if let Some(first) = batch.messages.first() {
            if let Err(error) = self.offsets.start_partition(&partition, first.offset) {
                log::error!("Could not register start of {}: {}", partition, error);
            }
        }

        let gate = HeartbeatGate::new(Arc::clone(&self.clock), self.settings.heartbeat_interval);
        let outcomes = futures::future::join_all(
            batch
                .messages
                .into_iter()
                .map(|message| self.handle_message(&partition, message, session, &gate)),
        )
        .await;

        let mut report = BatchReport::default();
        for outcome in outcomes {
            report.add(outcome);
        }
        report
    }

    async fn handle_message(
        &self,
        partition: &TopicPartition,
        message: BrokerMessage,
        session: &dyn ConsumerSession,
        gate: &HeartbeatGate,
    ) -> MessageOutcome {
        if !session.is_running() || session.is_stale() {
            return MessageOutcome::Skipped;
        }
        gate.beat_if_due(session).await;

        let offset = message.offset;
        let event = match self.codec.decode(message.value.as_deref()) {
            Ok(event) => Some(event),
            Err(error) => {
                log::error!(
                    "Received a message that is not an event at {} offset {}: {}",
                    partition,
                    offset,
                    error
                );
                None
            }
        };
        let description = event
            .as_ref()
            .map(Event::describe)
            .unwrap_or_else(|| format!("undecodable message at offset {}", offset));

        if let Err(source) = self.offsets.record_received(partition, offset) {
            return self.fail(FatalError::Tracking {
                topic: partition.topic.clone(),
                partition: partition.partition,
                offset,
                event: description,
                source,
            });
        }
        gate.beat_if_due(session).await;

        let outcome = match event {
            Some(event) => {
                log::debug!("Event {}, topic {}, offset {}", description, partition, offset);
                let outcome = match self.dispatcher.queue_event(event).await {
                    Ok(()) => MessageOutcome::Dispatched,
                    Err(error) => {
                        log::warn!("Event {} was not accepted by every listener: {}", description, error);
                        MessageOutcome::Rejected
                    }
                };
                gate.beat_if_due(session).await;
                outcome
            }
            None => MessageOutcome::Undecodable,
        };

        match self
            .complete_and_commit(partition, offset, &description, session, gate)
            .await
        {
            Ok(()) => outcome,
            Err(error) => self.fail(error),
        }
    }

    /// Decision and commit happen under the commit lock, so commits reach
    /// the broker in the order the watermark advanced
    async fn complete_and_commit(
        &self,
        partition: &TopicPartition,
        offset: i64,
        description: &str,
        session: &dyn ConsumerSession,
        gate: &HeartbeatGate,
    ) -> Result<(), FatalError> {
        let locked = self
            .commit_lock
            .with_permit(self.settings.commit_timeout, move || async move {
                let decision = self.offsets.complete(partition, offset).map_err(|source| {
                    FatalError::Tracking {
                        topic: partition.topic.clone(),
                        partition: partition.partition,
                        offset,
                        event: description.to_string(),
                        source,
                    }
                })?;
                gate.beat_if_due(session).await;

                match decision {
                    CommitDecision::Commit { offset: commit, previous } => {
                        log::info!(
                            "Finished event {}. Committing offset {}. Last committed offset {}. Remaining events: {}",
                            description,
                            commit,
                            previous,
                            self.offsets.remaining(partition)
                        );
                        let position = TopicPartitionOffset {
                            topic: partition.topic.clone(),
                            partition: partition.partition,
                            offset: commit,
                        };
                        session
                            .commit_offsets(std::slice::from_ref(&position))
                            .await
                            .map_err(|source| FatalError::Commit {
                                topic: partition.topic.clone(),
                                partition: partition.partition,
                                offset,
                                commit,
                                event: description.to_string(),
                                source,
                            })
                    }
                    CommitDecision::NothingToCommit {
                        candidate,
                        last_committed,
                    } => {
                        log::debug!(
                            "Finished event {}. Nothing to commit - candidate offset {}, last committed {}. Remaining events: {}",
                            description,
                            candidate,
                            last_committed,
                            self.offsets.remaining(partition)
                        );
                        Ok(())
                    }
                }
            })
            .await;

        match locked {
            Ok(result) => result,
            Err(source) => Err(FatalError::CommitLock {
                topic: partition.topic.clone(),
                partition: partition.partition,
                offset,
                source,
            }),
        }
    }

    fn fail(&self, error: FatalError) -> MessageOutcome {
        log_error_with_context(&error, "Stream consumer");
        self.fatal.terminate(&error.to_string());
        MessageOutcome::Fatal
    }
}
