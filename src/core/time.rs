//! Time provider abstraction for testable time-dependent logic

#[cfg(test)]
use std::sync::{Arc, Mutex};
#[cfg(test)]
use std::time::Duration;
use std::time::Instant;

/// Abstraction over the monotonic clock used for interval measurements
pub trait TimeProvider: Send + Sync {
    /// Get the current monotonic time
    fn now(&self) -> Instant;
}

/// Production time provider backed by the tokio clock
///
/// Reads through `tokio::time::Instant` so that a paused runtime clock
/// (`#[tokio::test(start_paused = true)]`) is honoured.
#[derive(Default, Clone, Debug)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}

/// Mock time provider for deterministic testing
#[derive(Clone)]
#[cfg(test)]
pub struct MockTimeProvider {
    current_instant: Arc<Mutex<Instant>>,
}

#[cfg(test)]
impl MockTimeProvider {
    /// Create a new mock time provider starting at the current instant
    pub fn new() -> Self {
        Self {
            current_instant: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Advance the monotonic clock by the given duration
    pub fn advance_time(&self, duration: Duration) {
        let mut instant = self.current_instant.lock().unwrap();
        *instant += duration;
    }
}

#[cfg(test)]
impl TimeProvider for MockTimeProvider {
    fn now(&self) -> Instant {
        *self.current_instant.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_system_time_provider_follows_tokio_clock() {
        let provider = SystemTimeProvider;

        let before = provider.now();
        tokio::time::advance(Duration::from_secs(5)).await;
        let after = provider.now();

        assert!(after.duration_since(before) >= Duration::from_secs(5));
    }

    #[test]
    fn test_mock_time_provider() {
        let provider = MockTimeProvider::new();

        let initial_instant = provider.now();
        provider.advance_time(Duration::from_secs(10));
        let after_instant = provider.now();

        assert_eq!(
            after_instant.duration_since(initial_instant),
            Duration::from_secs(10)
        );
    }
}
