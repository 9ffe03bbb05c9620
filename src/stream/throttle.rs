//! Dispatch throttling for aggregation events
//!
//! When the next event to dispatch is a data-ready event that feeds an
//! aggregation, the dispatcher holds back briefly so related events still
//! arriving from the stream can be merged with or ordered ahead of it. The
//! longer the pending queue, the shorter the pause.

use crate::events::api::{Event, PauseHook, QueuedEvent};
use crate::queue::api::Queue;
use std::sync::Arc;
use std::time::Duration;

pub const MIN_THROTTLE_MS: u64 = 10;
pub const MAX_THROTTLE_MS: u64 = 100;

/// Pause before dispatching the head of `pending`, if any
pub fn throttle_delay<E: Event>(pending: &dyn Queue<QueuedEvent<E>>) -> Option<Duration> {
    let head = pending.peek()?;
    head.payload().aggregation_period()?;

    let size = pending.len() as u64;
    let millis = MAX_THROTTLE_MS.saturating_sub(size).max(MIN_THROTTLE_MS);
    log::debug!(
        "Delaying dispatch of {} by {}ms, queue size {}",
        head.payload().describe(),
        millis,
        size
    );
    Some(Duration::from_millis(millis))
}

/// [`throttle_delay`] as a dispatcher pause hook
pub fn throttle_hook<E: Event>() -> PauseHook<E> {
    Arc::new(|pending: &dyn Queue<QueuedEvent<E>>| throttle_delay(pending))
}
