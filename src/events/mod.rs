//! Event model and in-process dispatch
//!
//! Producers queue events on an [`api::EventDispatcher`]; a single drain task
//! delivers them in priority order to every registered [`api::Listener`],
//! retrying transient listener failures. Each `queue_event` call returns a
//! [`api::CompletionHandle`] that resolves once delivery finished.
//!
//! ```rust,no_run
//! use eventpipe::events::api::{DomainEvent, EventDispatcher, Listener, ListenerError};
//! use std::sync::Arc;
//!
//! struct Audit;
//!
//! #[async_trait::async_trait]
//! impl Listener<DomainEvent> for Audit {
//!     async fn notify(&self, event: &DomainEvent) -> Result<(), ListenerError> {
//!         println!("{:?}", event);
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() {
//! let dispatcher = EventDispatcher::<DomainEvent>::new();
//! dispatcher.add_listener(Arc::new(Audit));
//! let done = dispatcher.queue_event(DomainEvent::file_system_size_stats(10, 100));
//! let _ = done.await;
//! # }
//! ```

// Internal modules - all access should go through api module
pub(crate) mod dispatcher;
pub(crate) mod domain;
pub(crate) mod error;
pub(crate) mod event;
pub(crate) mod listener;

pub mod api;

#[cfg(test)]
mod tests;
