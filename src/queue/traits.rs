//! Traits for the queue system
//!
//! [`Queue`] is the seam the drain loop works against, so the dispatcher can
//! run over FIFO, priority or reducing ordering without knowing which.

use std::cmp::Ordering;
use std::sync::Arc;

/// Shared comparator; `Less` means the first argument is dispatched earlier
pub type Comparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// A single-ended queue of pending elements
pub trait Queue<T>: Send {
    /// Add an element; where it lands depends on the implementation
    fn push(&mut self, value: T);

    /// Remove the head element
    fn pop(&mut self) -> Option<T>;

    /// Borrow the head element
    fn peek(&self) -> Option<&T>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate from head to tail
    fn iter(&self) -> Box<dyn Iterator<Item = &T> + '_>;
}

/// Elements that can fold a newly pushed element into themselves
///
/// Used by [`crate::queue::api::ReducingQueue`]. Returning `Err(other)` hands
/// the element back unchanged so the queue can try the next candidate.
pub trait Reducible: Sized {
    fn absorb(&mut self, other: Self) -> Result<(), Self>;
}
