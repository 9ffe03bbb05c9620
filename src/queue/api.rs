//! Public API for the queue system
//!
//! External modules should import from here rather than directly from
//! internal modules.

// Sequences
pub use crate::queue::linked::{Cursor, Iter, LinkedSequence};
pub use crate::queue::ordered::OrderedSequence;
pub use crate::queue::sorted::SortedVec;

// Queue implementations
pub use crate::queue::ordered::{FifoQueue, PriorityQueue};
pub use crate::queue::reducing::ReducingQueue;

// Draining
pub use crate::queue::drain::{DrainHooks, SequentialDrainLoop};

// Error handling
pub use crate::queue::error::{QueueError, QueueResult};

// Traits
pub use crate::queue::traits::{Comparator, Queue, Reducible};
