//! FIFO-fair async counting semaphore
//!
//! `AsyncMutex` hands permits over in strict arrival order. A released
//! permit goes straight to the oldest waiter and only returns to the free
//! pool when nobody is waiting. Waiters may give up after a timeout; a
//! timed-out waiter is withdrawn from the queue under the same lock that
//! `release()` takes, so it can never be resolved after it failed.
//!
//! # Example
//!
//! ```rust
//! use eventpipe::core::mutex::AsyncMutex;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), eventpipe::core::mutex::MutexError> {
//! let lock = AsyncMutex::new(1);
//!
//! lock.acquire(Some(Duration::from_millis(300))).await?;
//! // ... exclusive section ...
//! lock.release();
//!
//! let value = lock.with_permit(None, || async { 42 }).await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

use crate::core::sync::handle_mutex_poison;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;

/// Errors returned by [`AsyncMutex`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutexError {
    #[error("No capacity available at this moment")]
    NoCapacity,

    #[error("Timeout after {}ms", .timeout.as_millis())]
    Timeout { timeout: Duration },

    #[error("Lock state unavailable: {message}")]
    Internal { message: String },
}

impl MutexError {
    /// Timeouts are expected under contention and safe to retry
    pub fn is_timeout(&self) -> bool {
        matches!(self, MutexError::Timeout { .. })
    }
}

impl crate::core::error_handling::ContextualError for MutexError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}

pub type MutexResult<T> = Result<T, MutexError>;

struct Waiter {
    id: u64,
    grant: oneshot::Sender<()>,
}

struct LockState {
    capacity: usize,
    waiters: VecDeque<Waiter>,
    next_waiter_id: u64,
}

/// Outcome of withdrawing a waiter that stopped waiting
enum Withdrawal {
    /// Still queued; removed without receiving a permit
    Removed,
    /// `release()` already handed the permit over
    Granted,
}

/// FIFO-fair async counting semaphore with optional acquire timeout
pub struct AsyncMutex {
    state: Mutex<LockState>,
}

impl Default for AsyncMutex {
    fn default() -> Self {
        Self::new(1)
    }
}

impl std::fmt::Debug for AsyncMutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncMutex")
            .field("available", &self.available())
            .field("waiting", &self.waiting())
            .finish()
    }
}

impl AsyncMutex {
    /// Create a semaphore with `capacity` permits
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(LockState {
                capacity,
                waiters: VecDeque::new(),
                next_waiter_id: 0,
            }),
        }
    }

    fn lock_state(&self) -> MutexResult<MutexGuard<'_, LockState>> {
        handle_mutex_poison(self.state.lock(), |message| MutexError::Internal { message })
    }

    /// Whether a permit is free right now
    pub fn can_acquire(&self) -> bool {
        self.available() > 0
    }

    /// Number of free permits
    pub fn available(&self) -> usize {
        self.lock_state().map(|s| s.capacity).unwrap_or(0)
    }

    /// Number of callers currently queued in `acquire`
    pub fn waiting(&self) -> usize {
        self.lock_state().map(|s| s.waiters.len()).unwrap_or(0)
    }

    /// Take a permit without waiting
    pub fn try_acquire(&self) -> MutexResult<()> {
        let mut state = self.lock_state()?;
        if state.capacity > 0 {
            state.capacity -= 1;
            Ok(())
        } else {
            Err(MutexError::NoCapacity)
        }
    }

    /// Wait for a permit, optionally giving up after `timeout`
    ///
    /// Waiters are served in call order. On timeout the waiter is removed
    /// from the queue and `MutexError::Timeout` is returned; if the permit
    /// was handed over in the same instant the permit is kept and `Ok(())`
    /// is returned instead.
    pub async fn acquire(&self, timeout: Option<Duration>) -> MutexResult<()> {
        let mut pending = {
            let mut state = self.lock_state()?;
            if state.capacity > 0 {
                state.capacity -= 1;
                return Ok(());
            }

            let (grant, receiver) = oneshot::channel();
            let id = state.next_waiter_id;
            state.next_waiter_id += 1;
            state.waiters.push_back(Waiter { id, grant });

            PendingAcquire {
                mutex: self,
                id,
                receiver,
                settled: false,
            }
        };

        let outcome = match timeout {
            None => (&mut pending.receiver).await.map_err(|_| MutexError::Internal {
                message: "Semaphore dropped while waiting".to_string(),
            }),
            Some(limit) => match tokio::time::timeout(limit, &mut pending.receiver).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(_)) => Err(MutexError::Internal {
                    message: "Semaphore dropped while waiting".to_string(),
                }),
                Err(_) => match self.withdraw(pending.id, &mut pending.receiver)? {
                    Withdrawal::Removed => {
                        log::debug!(
                            "Waiter {} timed out after {}ms",
                            pending.id,
                            limit.as_millis()
                        );
                        Err(MutexError::Timeout { timeout: limit })
                    }
                    Withdrawal::Granted => Ok(()),
                },
            },
        };

        pending.settled = true;
        outcome
    }

    /// Return a permit, handing it to the oldest live waiter if any
    pub fn release(&self) {
        let mut state = match self.lock_state() {
            Ok(state) => state,
            Err(e) => {
                log::error!("Unable to release permit: {}", e);
                return;
            }
        };

        while let Some(waiter) = state.waiters.pop_front() {
            // A closed receiver belongs to a cancelled acquire; skip it
            if waiter.grant.send(()).is_ok() {
                return;
            }
        }

        state.capacity += 1;
    }

    /// Run `operation` while holding a permit
    ///
    /// The permit is released when the operation finishes, or when the
    /// returned future is dropped part-way.
    pub async fn with_permit<F, Fut, T>(&self, timeout: Option<Duration>, operation: F) -> MutexResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.acquire(timeout).await?;
        let _permit = HeldPermit { mutex: self };
        Ok(operation().await)
    }

    fn withdraw(&self, id: u64, receiver: &mut oneshot::Receiver<()>) -> MutexResult<Withdrawal> {
        let mut state = self.lock_state()?;
        if let Some(position) = state.waiters.iter().position(|w| w.id == id) {
            state.waiters.remove(position);
            return Ok(Withdrawal::Removed);
        }
        drop(state);

        match receiver.try_recv() {
            Ok(()) => Ok(Withdrawal::Granted),
            Err(_) => Ok(Withdrawal::Removed),
        }
    }
}

/// Queue entry owned by an in-flight `acquire` call
struct PendingAcquire<'a> {
    mutex: &'a AsyncMutex,
    id: u64,
    receiver: oneshot::Receiver<()>,
    settled: bool,
}

impl Drop for PendingAcquire<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        // acquire() was cancelled mid-wait
        if let Ok(Withdrawal::Granted) = self.mutex.withdraw(self.id, &mut self.receiver) {
            self.mutex.release();
        }
    }
}

struct HeldPermit<'a> {
    mutex: &'a AsyncMutex,
}

impl Drop for HeldPermit<'_> {
    fn drop(&mut self) {
        self.mutex.release();
    }
}
