//! Host schedulers for deferred flag writes
//!
//! A probe never blocks. A delayed write is handed to a [`Scheduler`] as a
//! task and the returned [`TimerHandle`] is kept so the write can be
//! cancelled when readiness flips again.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;

/// A deferred unit of work
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Invoke-after-delay primitive
pub trait Scheduler: Send + Sync {
    /// Run `task` once `delay` has elapsed
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle;
}

/// Cancels a scheduled task
///
/// Cancelling is silent and succeeds whether or not the task already ran.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl TimerHandle {
    /// A handle that runs `cancel` at most once
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle with nothing to cancel
    pub fn detached() -> Self {
        Self { cancel: None }
    }

    /// Cancel the task; does nothing if it already ran
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

/// Schedules tasks on a tokio runtime
///
/// Without a pinned handle the runtime is looked up when a task is
/// scheduled. Outside any runtime a detached thread sleeps instead.
#[derive(Debug, Clone, Default)]
pub struct TokioScheduler {
    handle: Option<Handle>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always spawn onto the given runtime
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
        match self.handle.clone().or_else(|| Handle::try_current().ok()) {
            Some(handle) => {
                let join = handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    task();
                });
                TimerHandle::new(move || join.abort())
            }
            None => {
                tracing::trace!(
                    delay_ms = delay.as_millis() as u64,
                    "no tokio runtime, scheduling on a thread"
                );
                let signal = Arc::new(CancelSignal::default());
                let waiter = signal.clone();
                std::thread::spawn(move || {
                    if !waiter.wait(delay) {
                        task();
                    }
                });
                TimerHandle::new(move || signal.cancel())
            }
        }
    }
}

/// Wakes a sleeping fallback thread as soon as its task is cancelled
#[derive(Default)]
struct CancelSignal {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

impl CancelSignal {
    /// Sleep up to `delay`; true when cancelled before it elapsed
    fn wait(&self, delay: Duration) -> bool {
        let guard = self.cancelled.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .wake
            .wait_timeout_while(guard, delay, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    fn cancel(&self) {
        *self.cancelled.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.wake.notify_one();
    }
}

struct Entry {
    id: u64,
    due: Duration,
    task: Task,
}

#[derive(Default)]
struct Queue {
    now: Duration,
    next_id: u64,
    entries: Vec<Entry>,
}

impl Queue {
    /// Remove the earliest entry due at or before `limit`
    fn pop_due(&mut self, limit: Duration) -> Option<Entry> {
        let idx = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.due <= limit)
            .min_by_key(|(_, e)| (e.due, e.id))
            .map(|(idx, _)| idx)?;
        Some(self.entries.remove(idx))
    }
}

/// A virtual-clock scheduler for deterministic tests
///
/// Nothing runs until the clock is advanced. Clones share one queue.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    queue: Arc<Mutex<Queue>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed on the virtual clock
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Number of tasks waiting to run
    pub fn pending(&self) -> usize {
        self.lock().entries.len()
    }

    /// Move the clock forward, running every task that falls due in order
    ///
    /// Returns the number of tasks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.lock().now.saturating_add(by);
        let ran = self.drain(target);
        let mut queue = self.lock();
        queue.now = queue.now.max(target);
        ran
    }

    /// Run every queued task regardless of its deadline
    ///
    /// The clock stops at the last deadline that ran.
    pub fn run_all(&self) -> usize {
        self.drain(Duration::MAX)
    }

    fn drain(&self, limit: Duration) -> usize {
        let mut ran = 0;
        loop {
            let entry = {
                let mut queue = self.lock();
                let Some(entry) = queue.pop_due(limit) else {
                    break;
                };
                queue.now = queue.now.max(entry.due);
                entry
            };
            (entry.task)();
            ran += 1;
        }
        ran
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
        let id = {
            let mut queue = self.lock();
            let id = queue.next_id;
            queue.next_id += 1;
            let due = queue.now.saturating_add(delay);
            queue.entries.push(Entry { id, due, task });
            id
        };

        let queue = self.queue.clone();
        TimerHandle::new(move || {
            queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entries
                .retain(|e| e.id != id);
        })
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queue = self.lock();
        f.debug_struct("ManualScheduler")
            .field("now", &queue.now)
            .field("pending", &queue.entries.len())
            .finish()
    }
}
