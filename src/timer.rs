// ABOUTME: Cancellable, generation-tagged timer slots
// Shared by the reconnect countdown, the latency probe interval and the resize settle delay

use std::future::Future;
use tokio::task::JoinHandle;
use tracing::trace;

/// Generation number carried by every event a timer emits
pub type Generation = u64;

/// One armed timer task. Dropping the handle aborts the task.
#[derive(Debug)]
pub struct TimerHandle {
    generation: Generation,
    task: JoinHandle<()>,
}

impl TimerHandle {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Holds at most one armed timer of a given kind.
///
/// Arming always cancels the predecessor first, and every arm gets a fresh
/// generation so that a firing which was already queued when the timer got
/// cancelled can be recognised as stale by the event loop.
#[derive(Debug)]
pub struct TimerSlot {
    name: &'static str,
    current: Option<TimerHandle>,
    next_generation: Generation,
}

impl TimerSlot {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            current: None,
            next_generation: 0,
        }
    }

    /// Arm the slot with the task built by `make`, cancelling any armed task
    pub fn arm<F, Fut>(&mut self, make: F) -> Generation
    where
        F: FnOnce(Generation) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.next_generation += 1;
        let generation = self.next_generation;
        let task = tokio::spawn(make(generation));
        trace!("Armed {} timer (generation {})", self.name, generation);
        self.current = Some(TimerHandle { generation, task });
        generation
    }

    /// Cancel the armed task. Returns true if one was armed.
    pub fn cancel(&mut self) -> bool {
        match self.current.take() {
            Some(handle) => {
                trace!(
                    "Cancelled {} timer (generation {})",
                    self.name,
                    handle.generation
                );
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.current.is_some()
    }

    /// Whether `generation` belongs to the currently armed task
    pub fn is_current(&self, generation: Generation) -> bool {
        self.current
            .as_ref()
            .is_some_and(|handle| handle.generation == generation)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}
