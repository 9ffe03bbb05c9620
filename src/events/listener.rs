//! Listener capability

use crate::events::error::ListenerError;
use crate::events::event::Event;
use async_trait::async_trait;
use std::sync::Arc;

/// Receives every dispatched event
///
/// `notify` is retried by the dispatcher on [`ListenerError::Failed`], so it
/// should be safe to call again for the same event.
#[async_trait]
pub trait Listener<E: Event>: Send + Sync {
    async fn notify(&self, event: &E) -> Result<(), ListenerError>;

    /// Name used in logs and error reports
    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }
}

/// Listeners unique by pointer identity, kept in registration order
pub(crate) struct ListenerSet<E: Event> {
    listeners: Vec<Arc<dyn Listener<E>>>,
}

impl<E: Event> ListenerSet<E> {
    pub(crate) fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Returns false when this exact listener is already registered
    pub(crate) fn insert(&mut self, listener: Arc<dyn Listener<E>>) -> bool {
        if self.contains(&listener) {
            return false;
        }
        self.listeners.push(listener);
        true
    }

    pub(crate) fn contains(&self, listener: &Arc<dyn Listener<E>>) -> bool {
        self.listeners
            .iter()
            .any(|existing| std::ptr::addr_eq(Arc::as_ptr(existing), Arc::as_ptr(listener)))
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn Listener<E>>> {
        self.listeners.clone()
    }
}
