//! Timer Implementation

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, trace};

/// Errors that can occur when arming a timer
#[derive(Debug, Error)]
pub enum TimerError {
    /// The OS refused to start the timer thread
    #[error("Failed to spawn timer thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Wake-up state shared between a schedule's thread and `stop()`
struct Shared {
    active: Mutex<bool>,
    wake: Condvar,
}

impl Shared {
    fn new() -> Self {
        Self {
            active: Mutex::new(true),
            wake: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until `deadline` or until the schedule is cancelled.
    ///
    /// Returns the guard so the caller can decide under the lock whether to
    /// fire; `*guard == false` means cancelled.
    fn wait_until<'a>(&self, mut guard: MutexGuard<'a, bool>, deadline: Instant) -> MutexGuard<'a, bool> {
        while *guard {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            guard = self
                .wake
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        guard
    }

    fn cancel(&self) {
        let mut active = self.lock();
        *active = false;
        self.wake.notify_all();
    }
}

/// Marks the schedule inactive when its thread exits, including by a
/// panicking callback
struct ExitGuard(Arc<Shared>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        *self.0.lock() = false;
    }
}

/// Deadline far enough out to never fire
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// `start + delay`, saturating at a deadline that never arrives
fn deadline_after(start: Instant, delay: Duration) -> Instant {
    start
        .checked_add(delay)
        .or_else(|| start.checked_add(FAR_FUTURE))
        .unwrap_or(start)
}

/// One armed schedule
struct Schedule {
    shared: Arc<Shared>,
    handle: JoinHandle<()>,
}

/// Cancellable callback timer.
///
/// A `Timer` holds at most one schedule. Arming it again stops the previous
/// schedule first. All methods take `&self`, so a timer can be shared
/// (e.g. in an `Arc`) and stopped from any thread, including from inside
/// its own callback.
pub struct Timer {
    /// Name given to the background thread
    name: String,
    /// Currently armed schedule, if any
    slot: Mutex<Option<Schedule>>,
}

impl Timer {
    /// Create an idle timer
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot: Mutex::new(None),
        }
    }

    /// Run `callback` once after `delay`, unless stopped first
    pub fn set_timeout<F>(&self, callback: F, delay: Duration) -> Result<(), TimerError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.stop();

        let shared = Arc::new(Shared::new());
        let thread_shared = Arc::clone(&shared);
        let deadline = deadline_after(Instant::now(), delay);

        let handle = self.spawn(move || {
            let _exit = ExitGuard(Arc::clone(&thread_shared));
            let mut active = thread_shared.wait_until(thread_shared.lock(), deadline);
            if !*active {
                return;
            }
            // One-shot: the schedule is spent once it fires
            *active = false;
            drop(active);
            callback();
        })?;

        self.install(Schedule { shared, handle });
        debug!("Timer '{}' armed: timeout {:?}", self.name, delay);
        Ok(())
    }

    /// Run `callback` every `interval` until stopped.
    ///
    /// The first call happens one `interval` after arming. Ticks are
    /// scheduled against absolute deadlines, so a slow callback delays the
    /// next tick but does not accumulate drift.
    pub fn set_interval<F>(&self, mut callback: F, interval: Duration) -> Result<(), TimerError>
    where
        F: FnMut() + Send + 'static,
    {
        self.stop();

        let shared = Arc::new(Shared::new());
        let thread_shared = Arc::clone(&shared);

        let handle = self.spawn(move || {
            let _exit = ExitGuard(Arc::clone(&thread_shared));
            let mut deadline = deadline_after(Instant::now(), interval);
            loop {
                let active = thread_shared.wait_until(thread_shared.lock(), deadline);
                if !*active {
                    return;
                }
                drop(active);

                callback();

                deadline = deadline_after(deadline, interval);
                let now = Instant::now();
                if deadline < now {
                    trace!("Timer tick overran by {:?}", now - deadline);
                    deadline = now;
                }
            }
        })?;

        self.install(Schedule { shared, handle });
        debug!("Timer '{}' armed: interval {:?}", self.name, interval);
        Ok(())
    }

    /// Cancel the current schedule.
    ///
    /// Idempotent and callable from any thread. When called from another
    /// thread it waits for the timer thread to finish, so the callback is
    /// never invoked after `stop()` returns. When called from inside the
    /// callback it only cancels; joining its own thread is skipped.
    ///
    /// Do not call `stop()` while holding a lock the callback also takes.
    pub fn stop(&self) {
        let schedule = self.slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(schedule) = schedule else {
            return;
        };

        schedule.shared.cancel();

        if schedule.handle.thread().id() == thread::current().id() {
            trace!("Timer '{}' stopped from its own callback", self.name);
            return;
        }

        // A panicking callback already logged through the panic hook
        let _ = schedule.handle.join();
        debug!("Timer '{}' stopped", self.name);
    }

    /// Whether a schedule is armed and has not fired (one-shot) or been stopped
    pub fn is_active(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|schedule| *schedule.shared.lock())
            .unwrap_or(false)
    }

    /// Name of this timer
    pub fn name(&self) -> &str {
        &self.name
    }

    fn spawn<F>(&self, body: F) -> Result<JoinHandle<()>, TimerError>
    where
        F: FnOnce() + Send + 'static,
    {
        thread::Builder::new()
            .name(format!("timer-{}", self.name))
            .spawn(body)
            .map_err(|source| TimerError::Spawn {
                name: self.name.clone(),
                source,
            })
    }

    fn install(&self, schedule: Schedule) {
        let previous = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(schedule);

        // Lost a race with a concurrent re-arm: retire the other schedule
        if let Some(previous) = previous {
            previous.shared.cancel();
            if previous.handle.thread().id() != thread::current().id() {
                let _ = previous.handle.join();
            }
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("name", &self.name)
            .field("active", &self.is_active())
            .finish()
    }
}
