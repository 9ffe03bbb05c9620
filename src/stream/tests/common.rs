//! Shared fixtures for stream tests

use crate::core::fatal::CollectingFatalHandler;
use crate::events::api::{DomainEvent, ErrorScope, Event, Listener, ListenerError, Severity};
use crate::stream::api::{
    BrokerMessage, EventCodec, JsonCodec, MemoryBroker, MessageBatch, StreamEventDispatcher,
    StreamSettings,
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TOPIC: &str = "edge_events";
pub const GROUP: &str = "collector@edge";

pub fn settings() -> StreamSettings {
    StreamSettings::new("edge", "collector")
}

pub fn stream(broker: &MemoryBroker, fatal: Arc<CollectingFatalHandler>) -> StreamEventDispatcher<DomainEvent> {
    StreamEventDispatcher::builder(settings(), Arc::new(broker.clone()))
        .fatal_handler(fatal)
        .build()
}

pub fn file_ready(filename: &str) -> DomainEvent {
    DomainEvent::FileReady {
        pipeline_name: "edge".into(),
        filename: filename.into(),
        force: false,
        archive_to: None,
        high_priority: false,
    }
}

pub fn collection_error(message: &str) -> DomainEvent {
    DomainEvent::CollectionError {
        service_name: "collector".into(),
        source_name: "s1".into(),
        pipeline_name: "edge".into(),
        message: message.into(),
        severity: Severity::Warning,
        scope: ErrorScope::Content,
    }
}

/// Batch of encoded events at consecutive offsets from `first_offset`
pub fn batch(first_offset: i64, events: &[DomainEvent]) -> MessageBatch {
    let messages = events
        .iter()
        .enumerate()
        .map(|(i, event)| BrokerMessage {
            offset: first_offset + i as i64,
            key: Some(event.event_type().as_bytes().to_vec()),
            value: Some(JsonCodec.encode(event).unwrap()),
        })
        .collect();
    MessageBatch {
        topic: TOPIC.into(),
        partition: 0,
        messages,
    }
}

/// Records the event types it is notified about
#[derive(Default)]
pub struct Recorder {
    pub seen: Mutex<Vec<String>>,
    pub delay: Option<Duration>,
    pub refuse: bool,
}

impl Recorder {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Listener<DomainEvent> for Recorder {
    async fn notify(&self, event: &DomainEvent) -> Result<(), ListenerError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.seen.lock().unwrap().push(event.event_type().to_string());
        if self.refuse {
            return Err(ListenerError::do_not_retry("archive unavailable"));
        }
        Ok(())
    }
}

/// Poll `condition` until it holds, failing the test after five seconds
pub async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
