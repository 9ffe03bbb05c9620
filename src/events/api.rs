//! Public API for the event system
//!
//! External modules should import from here rather than directly from
//! internal modules.

// Event model
pub use crate::events::domain::{
    data_ready_priority, AggPeriod, DomainEvent, ErrorScope, ProcessingResult, Severity,
    DATA_READY_PRIORITY, MAX_ERRORS_IN_EVENT,
};
pub use crate::events::event::{by_priority, events_to_string, Event};

// Dispatch
pub use crate::events::dispatcher::{
    CompletionHandle, DispatcherBuilder, EventDispatcher, PauseHook, QueuedEvent,
};
pub use crate::events::listener::Listener;

// Error handling
pub use crate::events::error::{DispatchError, DispatchResult, ListenerError};
