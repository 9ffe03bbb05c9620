//! Interval-gated consumer heartbeats
//!
//! Long batches keep the group membership alive by heartbeating between
//! processing steps. The gate lets a heartbeat through only when the
//! interval has elapsed since the last one, and never while another one is
//! still in flight.

use crate::core::sync::handle_mutex_poison;
use crate::core::time::TimeProvider;
use crate::stream::broker::ConsumerSession;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Default gap between heartbeats
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(3000);

enum GateState {
    Idle { last: Instant },
    InFlight,
}

pub struct HeartbeatGate {
    clock: Arc<dyn TimeProvider>,
    interval: Duration,
    state: Mutex<GateState>,
}

impl HeartbeatGate {
    /// Gate whose interval starts counting now
    pub fn new(clock: Arc<dyn TimeProvider>, interval: Duration) -> Self {
        let last = clock.now();
        Self {
            clock,
            interval,
            state: Mutex::new(GateState::Idle { last }),
        }
    }

    /// Claim the right to heartbeat; returns the start time when granted
    fn claim(&self) -> Option<Instant> {
        let mut state = handle_mutex_poison(self.state.lock(), |message| message)
            .map_err(|message| log::error!("Heartbeat state unavailable: {}", message))
            .ok()?;
        let now = self.clock.now();
        match *state {
            GateState::Idle { last } if now.saturating_duration_since(last) > self.interval => {
                *state = GateState::InFlight;
                Some(now)
            }
            _ => None,
        }
    }

    fn settle(&self, started: Instant) {
        if let Ok(mut state) = self.state.lock() {
            *state = GateState::Idle { last: started };
        }
    }

    /// Heartbeat through `session` if one is due; returns whether it did
    ///
    /// A failed heartbeat is logged; the session reports a lost membership
    /// through `is_stale` on the next message.
    pub async fn beat_if_due(&self, session: &dyn ConsumerSession) -> bool {
        let Some(started) = self.claim() else {
            return false;
        };

        if let Err(error) = session.heartbeat().await {
            log::warn!("Heartbeat failed: {}", error);
        }
        self.settle(started);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::MockTimeProvider;
    use crate::stream::broker::{MessageBatch, TopicPartitionOffset};
    use crate::stream::error::BrokerError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[derive(Default)]
    struct CountingSession {
        heartbeats: AtomicUsize,
        hold: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl ConsumerSession for CountingSession {
        async fn next_batch(&self) -> Result<Option<MessageBatch>, BrokerError> {
            Ok(None)
        }

        async fn heartbeat(&self) -> Result<(), BrokerError> {
            self.heartbeats.fetch_add(1, Ordering::SeqCst);
            if let Some(hold) = &self.hold {
                hold.notified().await;
            }
            Ok(())
        }

        async fn commit_offsets(&self, _offsets: &[TopicPartitionOffset]) -> Result<(), BrokerError> {
            Ok(())
        }

        fn is_running(&self) -> bool {
            true
        }

        fn is_stale(&self) -> bool {
            false
        }

        fn close(&self) {}
    }

    #[tokio::test]
    async fn test_heartbeat_only_after_interval() {
        let clock = MockTimeProvider::new();
        let gate = HeartbeatGate::new(Arc::new(clock.clone()), Duration::from_millis(3000));
        let session = CountingSession::default();

        assert!(!gate.beat_if_due(&session).await);
        clock.advance_time(Duration::from_millis(3000));
        assert!(!gate.beat_if_due(&session).await);
        clock.advance_time(Duration::from_millis(1));
        assert!(gate.beat_if_due(&session).await);
        assert!(!gate.beat_if_due(&session).await);

        assert_eq!(session.heartbeats.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_heartbeats_never_overlap() {
        let clock = MockTimeProvider::new();
        let gate = Arc::new(HeartbeatGate::new(
            Arc::new(clock.clone()),
            Duration::from_millis(10),
        ));
        let hold = Arc::new(Notify::new());
        let session = Arc::new(CountingSession {
            heartbeats: AtomicUsize::new(0),
            hold: Some(hold.clone()),
        });
        clock.advance_time(Duration::from_millis(20));

        let slow = {
            let gate = gate.clone();
            let session = session.clone();
            tokio::spawn(async move { gate.beat_if_due(session.as_ref()).await })
        };
        while session.heartbeats.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        clock.advance_time(Duration::from_millis(20));
        assert!(!gate.beat_if_due(session.as_ref()).await);

        hold.notify_one();
        assert!(slow.await.unwrap());
        assert_eq!(session.heartbeats.load(Ordering::SeqCst), 1);
    }
}
