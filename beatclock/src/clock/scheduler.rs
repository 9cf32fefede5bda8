use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use tracing::debug;

use crate::event::TimedEvent;
use crate::queue::EventQueue;
use crate::time::{self, Timeline};
use crate::util::lock;

use super::{ClockError, SchedulingError};

/// State shared between a clock, its scheduler handles and its dispatch
/// thread.
///
/// Locks, when nested, are always taken in the order `dispatch` then
/// `timeline`.
pub(super) struct Shared {
    pub(super) timeline: Mutex<Timeline>,
    pub(super) dispatch: Mutex<DispatchState>,
    // Notified on every change that may affect the wait of the dispatch
    // thread.
    pub(super) wake: Condvar,
    pub(super) running: AtomicBool,
}

/// State guarded by the dispatch lock.
pub(super) struct DispatchState {
    pub(super) queue: EventQueue,
    pub(super) exit_requested: bool,
    // Beat time of the slice being dispatched, if any.
    pub(super) frozen_time: Option<f64>,
    pub(super) worker: Option<ThreadId>,
}

impl DispatchState {
    pub(super) fn is_worker_thread(&self) -> bool {
        self.worker == Some(thread::current().id())
    }
}

impl Shared {
    pub(super) fn new(bpm: f64) -> Self {
        Self {
            timeline: Mutex::new(Timeline::new(bpm)),
            dispatch: Mutex::new(DispatchState {
                queue: EventQueue::new(),
                exit_requested: false,
                frozen_time: None,
                worker: None,
            }),
            wake: Condvar::new(),
            running: AtomicBool::new(false),
        }
    }

    pub(super) fn lock_timeline(&self) -> MutexGuard<'_, Timeline> {
        lock(&self.timeline)
    }

    pub(super) fn lock_dispatch(&self) -> MutexGuard<'_, DispatchState> {
        lock(&self.dispatch)
    }

    /// Inserts events and wakes the dispatch thread.
    fn insert(&self, events: Vec<TimedEvent>) {
        let mut state = self.lock_dispatch();
        state.queue.extend(events);
        self.wake.notify_one();
    }
}

/// A handle to the event queue and timeline of a
/// [`Clock`](crate::clock::Clock).
///
/// A `Scheduler` is cheap to clone and can be used from any thread, including
/// from within a payload executed by the dispatch thread. It cannot start or
/// stop the clock: this is reserved to the owner of the [`Clock`].
///
/// [`Clock`]: crate::clock::Clock
///
/// # Examples
///
/// A payload that re-schedules a fixed pattern two beats after each
/// execution through a scheduler handle.
///
/// ```
/// use beatclock::clock::{Clock, Scheduler};
/// use beatclock::event::{Callback, TimedEvent};
///
/// fn looper(scheduler: Scheduler, pattern: Vec<TimedEvent>) -> Callback {
///     Callback::once(move |cx| {
///         scheduler.schedule_shifted(&pattern, cx.time()).unwrap();
///         scheduler
///             .schedule(TimedEvent::new(
///                 cx.time() + 2.0,
///                 looper(scheduler.clone(), pattern.clone()),
///             ))
///             .unwrap();
///     })
/// }
///
/// let clock = Clock::new(120.0).unwrap();
/// let pattern = vec![
///     TimedEvent::new(0.0, Callback::once(|cx| println!("kick at {}", cx.time()))),
///     TimedEvent::new(1.0, Callback::once(|cx| println!("snare at {}", cx.time()))),
/// ];
/// clock
///     .schedule(TimedEvent::new(0.0, looper(clock.scheduler(), pattern)))
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct Scheduler {
    pub(super) shared: Arc<Shared>,
}

impl Scheduler {
    pub(super) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Returns the current beat time.
    ///
    /// When called from the dispatch thread, i.e. from within a payload, the
    /// frozen beat time of the slice being dispatched is returned instead of
    /// the live beat time.
    pub fn beat_time(&self) -> f64 {
        {
            let state = self.shared.lock_dispatch();
            if state.is_worker_thread() {
                if let Some(time) = state.frozen_time {
                    return time;
                }
            }
        }

        self.shared.lock_timeline().now()
    }

    /// Returns the tempo in beats per minute.
    pub fn bpm(&self) -> f64 {
        self.shared.lock_timeline().bpm()
    }

    /// Changes the tempo without changing the current beat time.
    ///
    /// The tempo must be finite and strictly positive. Pending events keep
    /// their beat time: a tempo change moves their wall-clock due time.
    pub fn set_bpm(&self, bpm: f64) -> Result<(), ClockError> {
        if !time::is_valid_bpm(bpm) {
            return Err(ClockError::InvalidBpm(bpm));
        }

        let previous = {
            let mut timeline = self.shared.lock_timeline();
            let previous = timeline.bpm();
            timeline.set_bpm(bpm);

            previous
        };

        // The dispatch lock is taken so that the notification cannot slip in
        // between the computation of a wait and the wait itself.
        {
            let _state = self.shared.lock_dispatch();
            self.shared.wake.notify_one();
        }
        debug!(previous, bpm, "tempo changed");

        Ok(())
    }

    /// Returns `true` if the dispatch thread is active.
    ///
    /// This is always `true` when called from within a payload.
    pub fn is_running(&self) -> bool {
        if self.is_worker_thread() {
            return true;
        }

        self.shared.running.load(Ordering::Acquire)
    }

    /// Schedules an event.
    ///
    /// An event scheduled at or before the current beat time is dispatched
    /// at the next opportunity. An error is returned if its time is not
    /// finite.
    pub fn schedule(&self, event: TimedEvent) -> Result<(), SchedulingError> {
        check_time(event.time())?;
        self.shared.insert(vec![event]);

        Ok(())
    }

    /// Schedules several events at once.
    ///
    /// Either all events are scheduled or, if one of them has a non-finite
    /// time, none is.
    pub fn schedule_all(
        &self,
        events: impl IntoIterator<Item = TimedEvent>,
    ) -> Result<(), SchedulingError> {
        let events: Vec<_> = events.into_iter().collect();
        for event in &events {
            check_time(event.time())?;
        }
        self.shared.insert(events);

        Ok(())
    }

    /// Schedules copies of the provided events shifted by `delta` beats.
    ///
    /// This makes it possible to keep a pattern around and schedule it
    /// repeatedly at various positions of the timeline. Either all events are
    /// scheduled or none is.
    pub fn schedule_shifted(&self, events: &[TimedEvent], delta: f64) -> Result<(), SchedulingError> {
        check_time(delta)?;

        self.schedule_all(events.iter().map(|event| event.time_shifted(delta)))
    }

    /// Returns the number of events waiting to be dispatched.
    pub fn pending(&self) -> usize {
        self.shared.lock_dispatch().queue.len()
    }

    pub(super) fn is_worker_thread(&self) -> bool {
        self.shared.lock_dispatch().is_worker_thread()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("bpm", &self.bpm())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

fn check_time(time: f64) -> Result<(), SchedulingError> {
    if !time.is_finite() {
        return Err(SchedulingError::InvalidTime(time));
    }

    Ok(())
}
