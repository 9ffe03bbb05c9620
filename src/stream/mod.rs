//! Log broker binding for the event dispatcher
//!
//! A [`api::StreamEventDispatcher`] publishes events onto a per-host topic
//! and consumes them back through a local [`crate::events::api::EventDispatcher`].
//! Offsets finish out of order once events are reordered by priority; the
//! [`api::PartitionOffsetTracker`] turns those completions into a commit
//! watermark that never passes an unfinished message.
//!
//! ```rust,no_run
//! use eventpipe::events::api::DomainEvent;
//! use eventpipe::stream::api::{MemoryBroker, StreamEventDispatcher, StreamSettings};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), eventpipe::stream::api::StreamError> {
//! let broker = Arc::new(MemoryBroker::new(1));
//! let stream = StreamEventDispatcher::<DomainEvent>::builder(
//!     StreamSettings::new("edge", "collector"),
//!     broker,
//! )
//! .build();
//!
//! stream.queue_event(DomainEvent::file_system_size_stats(10, 100)).await?;
//! # Ok(())
//! # }
//! ```

pub(crate) mod adapter;
pub(crate) mod broker;
pub(crate) mod codec;
pub(crate) mod error;
pub(crate) mod heartbeat;
pub(crate) mod memory;
pub(crate) mod offsets;
pub(crate) mod throttle;

pub mod api;

#[cfg(test)]
mod tests;
