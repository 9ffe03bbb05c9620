//! Listeners installed by the binary

use crate::events::api::{Event, Listener, ListenerError};
use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Logs every dispatched event and counts them
pub struct LoggingListener<E> {
    delivered: AtomicUsize,
    _event: PhantomData<fn(E)>,
}

impl<E> Default for LoggingListener<E> {
    fn default() -> Self {
        Self {
            delivered: AtomicUsize::new(0),
            _event: PhantomData,
        }
    }
}

impl<E> LoggingListener<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<E: Event> Listener<E> for LoggingListener<E> {
    async fn notify(&self, event: &E) -> Result<(), ListenerError> {
        let count = self.delivered.fetch_add(1, Ordering::SeqCst) + 1;
        log::info!("#{} {} (priority {:.1})", count, event.describe(), event.priority());
        Ok(())
    }

    fn name(&self) -> &str {
        "LoggingListener"
    }
}
