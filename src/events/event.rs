//! Event trait and log rendering helpers

use crate::events::domain::AggPeriod;
use std::cmp::Ordering;
use std::fmt;

/// Anything the dispatcher can order and deliver
///
/// Lower `priority` values are dispatched earlier.
pub trait Event: fmt::Debug + Send + Sync + 'static {
    fn event_type(&self) -> &str;

    fn priority(&self) -> f64;

    /// Short human description used in logs
    fn describe(&self) -> String {
        self.event_type().to_string()
    }

    /// Aggregation period of a data-ready event; `None` for raw data and
    /// for every other kind of event
    fn aggregation_period(&self) -> Option<AggPeriod> {
        None
    }
}

/// Comparator ordering events by ascending priority
pub fn by_priority<E: Event>(a: &E, b: &E) -> Ordering {
    a.priority().total_cmp(&b.priority())
}

/// Render pending events one per line as `"  20.2: <description>"`
pub fn events_to_string<'a, E, I>(events: I) -> String
where
    E: Event + 'a,
    I: IntoIterator<Item = &'a E>,
{
    events
        .into_iter()
        .map(|event| format!("\n     {:>4.1}: {}", event.priority(), event.describe()))
        .collect()
}
