//! Priority-ordered event dispatcher
//!
//! Events are queued with [`EventDispatcher::queue_event`] and delivered one
//! at a time, lowest priority value first, to every registered listener.
//! Each listener call is retried under the dispatcher's [`RetryPolicy`].
//! The returned [`CompletionHandle`] resolves once every listener has seen
//! the event, or rejects with the first listener failure. A failing listener
//! does not stop delivery to the listeners after it.

use crate::core::retry::{retry_async_when, RetryPolicy};
use crate::core::sync::{handle_rwlock_read, handle_rwlock_write};
use crate::events::error::{DispatchError, DispatchResult, ListenerError};
use crate::events::event::{by_priority, events_to_string, Event};
use crate::events::listener::{Listener, ListenerSet};
use crate::queue::api::{
    DrainHooks, Queue, QueueError, Reducible, ReducingQueue, SequentialDrainLoop,
};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;

type Completion = oneshot::Sender<DispatchResult<()>>;

/// Decides, before each dispatch, whether to hold back for a while
pub type PauseHook<E> =
    Arc<dyn Fn(&dyn Queue<QueuedEvent<E>>) -> Option<Duration> + Send + Sync>;

/// An event waiting in the dispatcher queue together with the handles
/// waiting on it
pub struct QueuedEvent<E> {
    payload: E,
    completions: Vec<Completion>,
}

impl<E> QueuedEvent<E> {
    pub fn payload(&self) -> &E {
        &self.payload
    }

    /// Number of handles that will be resolved by this event
    pub fn waiters(&self) -> usize {
        self.completions.len()
    }
}

impl<E: PartialEq> Reducible for QueuedEvent<E> {
    fn absorb(&mut self, other: Self) -> Result<(), Self> {
        if self.payload == other.payload {
            self.completions.extend(other.completions);
            Ok(())
        } else {
            Err(other)
        }
    }
}

/// Resolves when the queued event has been dispatched
///
/// `Ok(())` when every listener accepted it, otherwise the first listener
/// failure. Dropping the handle does not cancel the dispatch.
#[must_use = "a completion handle does nothing unless awaited"]
pub struct CompletionHandle {
    receiver: oneshot::Receiver<DispatchResult<()>>,
    event: String,
}

impl CompletionHandle {
    fn new(event: String) -> (Completion, Self) {
        let (sender, receiver) = oneshot::channel();
        (sender, Self { receiver, event })
    }

    /// Description of the event this handle waits for
    pub fn event(&self) -> &str {
        &self.event
    }
}

impl Future for CompletionHandle {
    type Output = DispatchResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|outcome| {
            outcome.unwrap_or_else(|_| {
                Err(DispatchError::Abandoned {
                    event: self.event.clone(),
                })
            })
        })
    }
}

/// Listener registry and delivery logic, run by the drain loop
struct DispatchCore<E: Event> {
    listeners: RwLock<ListenerSet<E>>,
    retry: RetryPolicy,
    pause: Option<PauseHook<E>>,
}

impl<E: Event> DispatchCore<E> {
    fn listeners(&self) -> Vec<Arc<dyn Listener<E>>> {
        handle_rwlock_read(self.listeners.read(), |message| message)
            .map(|set| set.snapshot())
            .unwrap_or_else(|message| {
                log::error!("Listener registry unavailable: {}", message);
                Vec::new()
            })
    }

    async fn dispatch(&self, queued: QueuedEvent<E>) {
        let QueuedEvent {
            payload,
            mut completions,
        } = queued;
        let description = payload.describe();

        for listener in self.listeners() {
            let name = listener.name().to_string();
            log::trace!("Notifying listener {} about event {}", name, description);

            let outcome = retry_async_when(
                &name,
                self.retry.clone(),
                ListenerError::is_retryable,
                || listener.notify(&payload),
            )
            .await;

            if let Err(error) = outcome {
                log::error!(
                    "Error while notifying listener {} about event {}: {}",
                    name,
                    description,
                    error
                );
                let failure = DispatchError::ListenerFailed {
                    listener: name,
                    event: description.clone(),
                    source: error,
                };
                for completion in completions.drain(..) {
                    let _ = completion.send(Err(failure.clone()));
                }
            }
        }

        log::debug!(
            "Resolving {} handle(s) associated with event {}",
            completions.len(),
            description
        );
        for completion in completions {
            let _ = completion.send(Ok(()));
        }
        log::debug!("Dispatched  {}", description);
    }
}

#[async_trait]
impl<E: Event> DrainHooks<QueuedEvent<E>> for DispatchCore<E> {
    fn pause_before_next(&self, pending: &dyn Queue<QueuedEvent<E>>) -> Option<Duration> {
        self.pause.as_ref().and_then(|pause| pause(pending))
    }

    fn on_dequeue(&self, element: &QueuedEvent<E>, remaining: &dyn Queue<QueuedEvent<E>>) {
        if log::log_enabled!(log::Level::Info) {
            log::info!(
                "Dispatching {}. Remaining queue {}",
                element.payload.describe(),
                events_to_string(remaining.iter().map(QueuedEvent::payload))
            );
        }
    }

    async fn process(&self, element: QueuedEvent<E>) {
        self.dispatch(element).await;
    }
}

/// Configures an [`EventDispatcher`]
pub struct DispatcherBuilder<E: Event> {
    retry: RetryPolicy,
    max_displacement: Option<usize>,
    pause: Option<PauseHook<E>>,
    queue: Option<Box<dyn Queue<QueuedEvent<E>>>>,
}

impl<E: Event> Default for DispatcherBuilder<E> {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            max_displacement: None,
            pause: None,
            queue: None,
        }
    }
}

impl<E: Event> DispatcherBuilder<E> {
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Bound how many queued events a new event may overtake
    pub fn max_displacement(mut self, max_displacement: Option<usize>) -> Self {
        self.max_displacement = max_displacement;
        self
    }

    pub fn pause_hook(mut self, pause: PauseHook<E>) -> Self {
        self.pause = Some(pause);
        self
    }

    /// Replace the default reducing priority queue
    pub fn queue(mut self, queue: Box<dyn Queue<QueuedEvent<E>>>) -> Self {
        self.queue = Some(queue);
        self
    }
}

impl<E: Event + PartialEq> DispatcherBuilder<E> {
    pub fn build(self) -> EventDispatcher<E> {
        let queue: Box<dyn Queue<QueuedEvent<E>>> = match self.queue {
            Some(queue) => queue,
            None => Box::new(ReducingQueue::new(
                Arc::new(|a: &QueuedEvent<E>, b: &QueuedEvent<E>| {
                    by_priority(&a.payload, &b.payload)
                }),
                self.max_displacement,
            )),
        };
        let core = Arc::new(DispatchCore {
            listeners: RwLock::new(ListenerSet::new()),
            retry: self.retry,
            pause: self.pause,
        });
        let hooks: Arc<dyn DrainHooks<QueuedEvent<E>>> = core.clone();

        EventDispatcher {
            drain: SequentialDrainLoop::new(queue, hooks),
            core,
        }
    }
}

/// Queue + drain loop + listener set
pub struct EventDispatcher<E: Event> {
    drain: SequentialDrainLoop<QueuedEvent<E>>,
    core: Arc<DispatchCore<E>>,
}

impl<E: Event> Clone for EventDispatcher<E> {
    fn clone(&self) -> Self {
        Self {
            drain: self.drain.clone(),
            core: Arc::clone(&self.core),
        }
    }
}

impl<E: Event + PartialEq> EventDispatcher<E> {
    /// Dispatcher with the default retry policy and an unbounded
    /// reducing priority queue
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> DispatcherBuilder<E> {
        DispatcherBuilder::default()
    }
}

impl<E: Event + PartialEq> Default for EventDispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> EventDispatcher<E> {
    /// Queue an event for dispatch
    ///
    /// Must be called from within a tokio runtime. An event equal to one
    /// already pending is merged into it and shares its outcome.
    pub fn queue_event(&self, event: E) -> CompletionHandle {
        let description = event.describe();
        log::trace!(
            "Received    {} (priority {})",
            description,
            event.priority()
        );

        let (completion, handle) = CompletionHandle::new(description.clone());
        let queued = QueuedEvent {
            payload: event,
            completions: vec![completion],
        };

        match self.drain.push(queued) {
            Ok(()) => {
                if log::log_enabled!(log::Level::Info) {
                    log::info!("Received    {}. Updated queue {}", description, self.render_queue());
                }
            }
            Err(error) => {
                // The element was never queued, so its sender is gone with it
                log::error!("Could not queue event {}: {}", description, error);
                let (completion, handle) = CompletionHandle::new(description);
                let _ = completion.send(Err(DispatchError::Queue(error)));
                return handle;
            }
        }

        handle
    }

    /// Register a listener; returns false if it was already registered
    ///
    /// Already dispatched events are not replayed.
    pub fn add_listener(&self, listener: Arc<dyn Listener<E>>) -> bool {
        match handle_rwlock_write(self.core.listeners.write(), |message| message) {
            Ok(mut set) => {
                let name = listener.name().to_string();
                let added = set.insert(listener);
                if added {
                    log::debug!("Registered listener {}", name);
                }
                added
            }
            Err(message) => {
                log::error!("Listener registry unavailable: {}", message);
                false
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        handle_rwlock_read(self.core.listeners.read(), |message| message)
            .map(|set| set.len())
            .unwrap_or(0)
    }

    /// Finish the event in flight, then hold further events
    pub fn stop(&self) -> Result<(), QueueError> {
        self.drain.stop()
    }

    pub fn resume(&self) -> Result<(), QueueError> {
        self.drain.resume()
    }

    pub fn is_stopped(&self) -> bool {
        self.drain.is_stopped()
    }

    /// Descriptions of the queued events, head first
    pub fn pending(&self) -> Vec<String> {
        self.drain
            .snapshot(|queue| queue.iter().map(|queued| queued.payload.describe()).collect())
            .unwrap_or_default()
    }

    pub fn pending_count(&self) -> usize {
        self.drain.len()
    }

    /// Wait until the queue is drained, or the dispatcher is stopped and
    /// the event in flight finished
    pub async fn wait_idle(&self) {
        self.drain.wait_idle().await;
    }

    fn render_queue(&self) -> String {
        self.drain
            .snapshot(|queue| events_to_string(queue.iter().map(QueuedEvent::payload)))
            .unwrap_or_default()
    }
}
