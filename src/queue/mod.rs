//! Ordered queues and the sequential drain loop
//!
//! # Overview
//!
//! - [`api::LinkedSequence`]: doubly linked list in an index arena with an
//!   editing [`api::Cursor`]
//! - [`api::OrderedSequence`]: comparator-ordered insertion from the tail,
//!   optionally bounded by a maximum displacement
//! - [`api::SortedVec`]: binary-search variant with exact-identity lookup
//! - [`api::Queue`] implementations: [`api::FifoQueue`],
//!   [`api::PriorityQueue`] and [`api::ReducingQueue`]
//! - [`api::SequentialDrainLoop`]: processes a queue one element at a time
//!   with at most one active drain task
//!
//! # Example
//!
//! ```rust,no_run
//! use eventpipe::queue::api::{DrainHooks, PriorityQueue, SequentialDrainLoop};
//! use std::sync::Arc;
//!
//! struct Print;
//!
//! #[async_trait::async_trait]
//! impl DrainHooks<u32> for Print {
//!     async fn process(&self, element: u32) {
//!         println!("{}", element);
//!     }
//! }
//!
//! # async fn example() -> Result<(), eventpipe::queue::api::QueueError> {
//! let queue = PriorityQueue::new(Arc::new(|a: &u32, b: &u32| a.cmp(b)), None);
//! let drain = SequentialDrainLoop::new(Box::new(queue), Arc::new(Print));
//! drain.push(5)?;
//! drain.push(1)?;
//! drain.wait_idle().await;
//! # Ok(())
//! # }
//! ```

// Internal modules - all access should go through api module
pub(crate) mod drain;
pub(crate) mod error;
pub(crate) mod linked;
pub(crate) mod ordered;
pub(crate) mod reducing;
pub(crate) mod sorted;
pub(crate) mod traits;

pub mod api;

#[cfg(test)]
mod tests;
