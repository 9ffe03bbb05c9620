//! Single-flight sequential drain loop
//!
//! Elements pushed onto a [`SequentialDrainLoop`] are processed one at a
//! time by a single spawned task. The task exists only while there is work:
//! it is started by `push`/`resume` when the loop is idle and exits when the
//! queue runs dry or the loop is stopped. The `running` flag is flipped under
//! the queue lock, so two drains of the same queue can never overlap.

use crate::core::sync::handle_mutex_poison;
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::traits::Queue;
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;

/// Work performed by the drain loop
#[async_trait]
pub trait DrainHooks<T>: Send + Sync {
    /// Called before each pop with the pending elements. Returning a
    /// duration makes the loop sleep that long before taking the head,
    /// which may have changed by then.
    fn pause_before_next(&self, _pending: &dyn Queue<T>) -> Option<Duration> {
        None
    }

    /// Called under the queue lock right after `element` was popped
    fn on_dequeue(&self, _element: &T, _remaining: &dyn Queue<T>) {}

    /// Process one element; the next element is not started until this
    /// completes
    async fn process(&self, element: T);
}

struct DrainState<T> {
    queue: Box<dyn Queue<T>>,
    running: bool,
    stopped: bool,
}

struct Shared<T> {
    state: Mutex<DrainState<T>>,
    hooks: Arc<dyn DrainHooks<T>>,
    idle: Notify,
}

impl<T> Shared<T> {
    fn lock(&self) -> QueueResult<MutexGuard<'_, DrainState<T>>> {
        handle_mutex_poison(self.state.lock(), |message| QueueError::Poisoned { message })
    }
}

/// Queue plus the task that drains it
pub struct SequentialDrainLoop<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for SequentialDrainLoop<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + 'static> SequentialDrainLoop<T> {
    pub fn new(queue: Box<dyn Queue<T>>, hooks: Arc<dyn DrainHooks<T>>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(DrainState {
                    queue,
                    running: false,
                    stopped: false,
                }),
                hooks,
                idle: Notify::new(),
            }),
        }
    }

    /// Queue an element and start draining if the loop is idle
    ///
    /// Must be called from within a tokio runtime.
    pub fn push(&self, element: T) -> QueueResult<()> {
        let mut state = self.shared.lock()?;
        state.queue.push(element);
        self.start_if_idle(&mut state);
        Ok(())
    }

    /// Stop after the element currently being processed
    pub fn stop(&self) -> QueueResult<()> {
        let mut state = self.shared.lock()?;
        if !state.stopped {
            log::debug!("Drain loop stopped with {} pending", state.queue.len());
        }
        state.stopped = true;
        Ok(())
    }

    /// Clear the stop flag and drain whatever accumulated meanwhile
    pub fn resume(&self) -> QueueResult<()> {
        let mut state = self.shared.lock()?;
        state.stopped = false;
        self.start_if_idle(&mut state);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.shared.lock().map(|state| state.queue.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_running(&self) -> bool {
        self.shared
            .lock()
            .map(|state| state.running)
            .unwrap_or(false)
    }

    pub fn is_stopped(&self) -> bool {
        self.shared
            .lock()
            .map(|state| state.stopped)
            .unwrap_or(true)
    }

    /// Inspect the pending elements under the queue lock
    pub fn snapshot<R>(&self, f: impl FnOnce(&dyn Queue<T>) -> R) -> QueueResult<R> {
        let state = self.shared.lock()?;
        Ok(f(state.queue.as_ref()))
    }

    /// Wait until no drain task is active
    ///
    /// Returns immediately for a stopped loop once its current element is
    /// done, even if elements remain queued.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if !self.is_running() {
                return;
            }
            notified.await;
        }
    }

    fn start_if_idle(&self, state: &mut DrainState<T>) {
        if state.running || state.stopped || state.queue.is_empty() {
            return;
        }
        state.running = true;
        let shared = Arc::clone(&self.shared);
        tokio::spawn(drain(shared));
    }
}

async fn drain<T: Send + 'static>(shared: Arc<Shared<T>>) {
    loop {
        let pause = match next_step(&shared, |state, hooks| {
            Some(hooks.pause_before_next(state.queue.as_ref()))
        }) {
            Some(pause) => pause,
            None => break,
        };

        if let Some(duration) = pause {
            tokio::time::sleep(duration).await;
        }

        let element = match next_step(&shared, |state, hooks| {
            let element = state.queue.pop()?;
            hooks.on_dequeue(&element, state.queue.as_ref());
            Some(element)
        }) {
            Some(element) => element,
            None => break,
        };

        // A panic must not end the task while `running` is still set
        if let Err(panic) = AssertUnwindSafe(shared.hooks.process(element))
            .catch_unwind()
            .await
        {
            log::error!("Drain loop element panicked: {}", panic_message(panic.as_ref()));
        }
    }
    shared.idle.notify_waiters();
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Run `step` under the lock unless the loop should wind down, in which case
/// the running flag is cleared in the same critical section
fn next_step<T, R>(
    shared: &Shared<T>,
    step: impl FnOnce(&mut DrainState<T>, &dyn DrainHooks<T>) -> Option<R>,
) -> Option<R> {
    let mut state = match shared.lock() {
        Ok(state) => state,
        Err(err) => {
            log::error!("Drain loop aborted: {}", err);
            return None;
        }
    };

    if state.stopped || state.queue.is_empty() {
        state.running = false;
        return None;
    }

    let result = step(&mut *state, shared.hooks.as_ref());
    if result.is_none() {
        state.running = false;
    }
    result
}
