//! Common test utilities and helpers

#![allow(dead_code)]

use async_trait::async_trait;
use eventpipe::core::fatal::CollectingFatalHandler;
use eventpipe::events::api::{DomainEvent, Event, Listener, ListenerError};
use eventpipe::stream::api::{MemoryBroker, StreamEventDispatcher, StreamSettings};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn settings(host_id: &str) -> StreamSettings {
    StreamSettings::new(host_id, "integration")
}

pub fn stream_for(
    host_id: &str,
    broker: &MemoryBroker,
    fatal: Arc<CollectingFatalHandler>,
) -> StreamEventDispatcher<DomainEvent> {
    StreamEventDispatcher::builder(settings(host_id), Arc::new(broker.clone()))
        .fatal_handler(fatal)
        .build()
}

pub fn file_ready(filename: &str, high_priority: bool) -> DomainEvent {
    DomainEvent::FileReady {
        pipeline_name: "edge".into(),
        filename: filename.into(),
        force: false,
        archive_to: None,
        high_priority,
    }
}

/// Listener recording descriptions of delivered events
#[derive(Default)]
pub struct Journal {
    entries: Mutex<Vec<String>>,
    fail_on: Option<&'static str>,
}

impl Journal {
    /// Journal that refuses events whose description contains `needle`
    pub fn failing_on(needle: &'static str) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            fail_on: Some(needle),
        }
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Listener<DomainEvent> for Journal {
    async fn notify(&self, event: &DomainEvent) -> Result<(), ListenerError> {
        let description = event.describe();
        self.entries.lock().unwrap().push(description.clone());
        match self.fail_on {
            Some(needle) if description.contains(needle) => {
                Err(ListenerError::do_not_retry(format!("refusing {}", description)))
            }
            _ => Ok(()),
        }
    }
}

/// Poll `condition` until it holds, panicking after five seconds
pub async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
