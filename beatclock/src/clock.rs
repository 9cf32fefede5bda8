//! Beat clock and event dispatch.
//!
//! This module contains most notably the [`Clock`], its [`Scheduler`] handle
//! and the [`ClockInit`] clock builder.
//!
//! # Clock lifecycle
//!
//! A clock is created stopped at beat 0. Events can be scheduled at any time,
//! whether the clock is running or not.
//!
//! 1. [`Clock::start()`] lets beat time advance and spawns the dispatch
//!    thread,
//! 2. [`Clock::stop()`] terminates the dispatch thread, waiting until the
//!    payload being executed (if any) returns, and freezes beat time,
//! 3. [`Clock::reset()`] rewinds a stopped clock to beat 0 and discards all
//!    pending events.
//!
//! A stopped clock can be started again: beat time resumes from where it was
//! frozen and pending events are dispatched as their time comes.
//!
//! # Dispatch order
//!
//! All payloads are executed sequentially on the dispatch thread. Events are
//! dispatched by slices of events sharing the same beat time, in increasing
//! order of beat time. Within a slice, events are executed in the order in
//! which they were scheduled. An event scheduled at a beat time that is
//! already past is dispatched at the next opportunity rather than dropped.
//!
//! # Payload panics
//!
//! A panic in a payload is caught by the dispatch thread. What happens next
//! is selected with [`ClockInit::set_panic_policy()`]; see [`PanicPolicy`].
//!
//! # Examples
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use std::thread;
//! use std::time::Duration;
//!
//! use beatclock::clock::Clock;
//! use beatclock::event::{Callback, TimedEvent};
//!
//! // 6000 bpm, i.e. 100 beats per second.
//! let clock = Clock::new(6000.0).unwrap();
//!
//! let count = Arc::new(AtomicUsize::new(0));
//! for beat in 0..4 {
//!     let count = count.clone();
//!     let event = TimedEvent::new(
//!         beat as f64,
//!         Callback::once(move |_| {
//!             count.fetch_add(1, Ordering::Relaxed);
//!         }),
//!     );
//!     clock.schedule(event).unwrap();
//! }
//!
//! clock.start().unwrap();
//! thread::sleep(Duration::from_millis(200));
//! clock.stop().unwrap();
//!
//! assert_eq!(count.load(Ordering::Relaxed), 4);
//! ```

mod init;
mod scheduler;
mod worker;

pub use init::{ClockConfig, ClockInit, PanicPolicy};
pub use scheduler::Scheduler;

use std::any::Any;
use std::error::Error;
use std::fmt;
use std::io;
use std::mem;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use crate::event::TimedEvent;
use crate::util::lock;

use scheduler::Shared;

/// A beat clock dispatching timed events from a dedicated thread.
///
/// A `Clock` owns the dispatch thread: only the owner can start, stop or reset
/// the clock. Scheduling and tempo control are also available through
/// [`Scheduler`] handles obtained with [`Clock::scheduler()`].
///
/// Dropping a running clock stops it.
pub struct Clock {
    scheduler: Scheduler,
    // Run lock: serializes start, stop and reset.
    worker: Mutex<Option<JoinHandle<Result<(), ExecutionError>>>>,
    config: ClockConfig,
}

impl Clock {
    /// Creates a stopped clock with the specified tempo and a default
    /// configuration.
    pub fn new(bpm: f64) -> Result<Self, ClockError> {
        ClockInit::new().set_bpm(bpm).init()
    }

    /// Creates a clock from a validated configuration.
    pub(crate) fn from_config(config: ClockConfig) -> Self {
        let shared = Arc::new(Shared::new(config.bpm));

        Self {
            scheduler: Scheduler::new(shared),
            worker: Mutex::new(None),
            config,
        }
    }

    /// Returns a new handle to the event queue and timeline of this clock.
    pub fn scheduler(&self) -> Scheduler {
        self.scheduler.clone()
    }

    /// Returns the current beat time.
    ///
    /// See [`Scheduler::beat_time()`].
    pub fn beat_time(&self) -> f64 {
        self.scheduler.beat_time()
    }

    /// Returns the tempo in beats per minute.
    pub fn bpm(&self) -> f64 {
        self.scheduler.bpm()
    }

    /// Changes the tempo without changing the current beat time.
    ///
    /// See [`Scheduler::set_bpm()`].
    pub fn set_bpm(&self, bpm: f64) -> Result<(), ClockError> {
        self.scheduler.set_bpm(bpm)
    }

    /// Returns `true` if the dispatch thread is active.
    ///
    /// See [`Scheduler::is_running()`].
    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Schedules an event.
    ///
    /// See [`Scheduler::schedule()`].
    pub fn schedule(&self, event: TimedEvent) -> Result<(), SchedulingError> {
        self.scheduler.schedule(event)
    }

    /// Schedules several events at once.
    ///
    /// See [`Scheduler::schedule_all()`].
    pub fn schedule_all(
        &self,
        events: impl IntoIterator<Item = TimedEvent>,
    ) -> Result<(), SchedulingError> {
        self.scheduler.schedule_all(events)
    }

    /// Schedules copies of the provided events shifted by `delta` beats.
    ///
    /// See [`Scheduler::schedule_shifted()`].
    pub fn schedule_shifted(&self, events: &[TimedEvent], delta: f64) -> Result<(), SchedulingError> {
        self.scheduler.schedule_shifted(events, delta)
    }

    /// Returns the number of events waiting to be dispatched.
    pub fn pending(&self) -> usize {
        self.scheduler.pending()
    }

    /// Returns the configuration this clock was built with.
    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    /// Starts the clock.
    ///
    /// Beat time resumes from its current value and a dispatch thread is
    /// spawned. An error is returned if the clock is already running, if the
    /// dispatch loop halted and was not stopped yet, or if this method is
    /// called from a payload.
    pub fn start(&self) -> Result<(), ClockError> {
        if self.scheduler.is_worker_thread() {
            return Err(ClockError::CalledFromWorker);
        }

        let mut worker = lock(&self.worker);
        if let Some(handle) = &*worker {
            return Err(if handle.is_finished() {
                ClockError::Halted
            } else {
                ClockError::AlreadyRunning
            });
        }

        let shared = &self.scheduler.shared;
        {
            let mut state = shared.lock_dispatch();
            state.exit_requested = false;
            shared.lock_timeline().start();
        }
        shared.running.store(true, Ordering::Release);

        let worker_shared = shared.clone();
        let panic_policy = self.config.panic_policy;
        let name = self.config.thread_name.clone();
        let spawned = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let span = tracing::info_span!("clock", name = %name);
                let _enter = span.enter();

                worker::run(worker_shared, panic_policy)
            });

        match spawned {
            Ok(handle) => *worker = Some(handle),
            Err(e) => {
                shared.running.store(false, Ordering::Release);
                shared.lock_timeline().stop();

                return Err(ClockError::Spawn(e));
            }
        }
        drop(worker);

        debug!(beat_time = self.beat_time(), bpm = self.bpm(), "clock started");

        Ok(())
    }

    /// Stops the clock.
    ///
    /// This method blocks until the dispatch thread has terminated: once it
    /// returns, no payload is executing and none will be executed until the
    /// clock is started again. Beat time is then frozen.
    ///
    /// An error is returned if the clock is not running or if this method is
    /// called from a payload. If the dispatch loop halted because a payload
    /// panicked, the clock is stopped all the same and the panic is returned as
    /// a [`ClockError::Execution`] error.
    pub fn stop(&self) -> Result<(), ClockError> {
        if self.scheduler.is_worker_thread() {
            return Err(ClockError::CalledFromWorker);
        }

        let mut worker = lock(&self.worker);
        let handle = worker.take().ok_or(ClockError::NotRunning)?;
        let result = self.shutdown(handle);
        drop(worker);

        debug!(beat_time = self.beat_time(), "clock stopped");

        result.map_err(ClockError::Execution)
    }

    /// Rewinds a stopped clock to beat 0 and discards all pending events.
    ///
    /// The tempo is left unchanged. An error is returned if the clock is
    /// running or if this method is called from a payload.
    pub fn reset(&self) -> Result<(), ClockError> {
        if self.scheduler.is_worker_thread() {
            return Err(ClockError::CalledFromWorker);
        }

        let worker = lock(&self.worker);
        if let Some(handle) = &*worker {
            return Err(if handle.is_finished() {
                ClockError::Halted
            } else {
                ClockError::AlreadyRunning
            });
        }

        let shared = &self.scheduler.shared;
        let queue = {
            let mut state = shared.lock_dispatch();
            state.frozen_time = None;
            shared.lock_timeline().reset();

            mem::take(&mut state.queue)
        };
        drop(worker);

        // Payloads may use a scheduler when dropped, so the discarded events
        // are only dropped once the dispatch lock is released.
        let discarded = queue.len();
        drop(queue);

        debug!(discarded, "clock reset");

        Ok(())
    }

    /// Requests the exit of the dispatch thread, joins it and freezes beat
    /// time.
    fn shutdown(
        &self,
        handle: JoinHandle<Result<(), ExecutionError>>,
    ) -> Result<(), ExecutionError> {
        let shared = &self.scheduler.shared;
        {
            let mut state = shared.lock_dispatch();
            state.exit_requested = true;
            shared.wake.notify_all();
        }

        let outcome = handle.join();

        {
            let mut state = shared.lock_dispatch();
            state.worker = None;
            state.frozen_time = None;
            shared.lock_timeline().stop();
        }
        shared.running.store(false, Ordering::Release);

        match outcome {
            Ok(result) => result,
            Err(payload) => Err(ExecutionError::WorkerPanic { payload }),
        }
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        let shared = &self.scheduler.shared;
        let handle = lock(&self.worker).take();

        match handle {
            // The last owner of the clock may be a payload: the dispatch
            // thread cannot join itself, so it is only asked to exit.
            Some(_) if self.scheduler.is_worker_thread() => {
                let mut state = shared.lock_dispatch();
                state.exit_requested = true;
                shared.running.store(false, Ordering::Release);
                drop(state);
                debug!("clock dropped from its own dispatch thread");
            }
            Some(handle) => match self.shutdown(handle) {
                Ok(()) => debug!("running clock dropped and stopped"),
                Err(e) => error!("running clock dropped and stopped: {}", e),
            },
            None => {}
        }

        // Pending payloads holding a `Scheduler` keep the shared state alive,
        // so the queue is emptied explicitly. It is dropped after the dispatch
        // lock is released.
        let queue = mem::take(&mut shared.lock_dispatch().queue);
        drop(queue);
    }
}

impl fmt::Debug for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clock")
            .field("beat_time", &self.beat_time())
            .field("bpm", &self.bpm())
            .field("running", &self.is_running())
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

/// Error returned when a clock operation is called in the wrong state or
/// with invalid arguments.
#[derive(Debug)]
pub enum ClockError {
    /// The tempo is not a finite, strictly positive number.
    InvalidBpm(f64),
    /// The clock is already running.
    AlreadyRunning,
    /// The clock is not running.
    NotRunning,
    /// The dispatch loop halted on a payload panic; the clock must be stopped
    /// to retrieve the error before it can be started or reset.
    Halted,
    /// Starting, stopping or resetting was attempted from the dispatch
    /// thread.
    CalledFromWorker,
    /// The dispatch thread could not be spawned.
    Spawn(io::Error),
    /// The dispatch loop terminated abnormally.
    Execution(ExecutionError),
}

impl fmt::Display for ClockError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBpm(bpm) => {
                write!(fmt, "the tempo must be finite and positive, got {} bpm", bpm)
            }
            Self::AlreadyRunning => fmt.write_str("the clock is already running"),
            Self::NotRunning => fmt.write_str("the clock is not running"),
            Self::Halted => fmt.write_str(
                "the dispatch loop halted after a payload panic and the clock must be stopped",
            ),
            Self::CalledFromWorker => {
                fmt.write_str("the clock cannot be started, stopped or reset from its dispatch thread")
            }
            Self::Spawn(e) => write!(fmt, "the dispatch thread could not be spawned: {}", e),
            Self::Execution(e) => write!(fmt, "{}", e),
        }
    }
}

impl Error for ClockError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Spawn(e) => Some(e),
            Self::Execution(e) => Some(e),
            _ => None,
        }
    }
}

/// Error returned when an event cannot be scheduled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SchedulingError {
    /// The beat time or time shift is not a finite number.
    InvalidTime(f64),
}

impl fmt::Display for SchedulingError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTime(time) => {
                write!(fmt, "the scheduled beat time must be finite, got {}", time)
            }
        }
    }
}

impl Error for SchedulingError {}

/// Error returned when the dispatch loop terminated abnormally.
pub enum ExecutionError {
    /// A payload panicked and the clock was configured with
    /// [`PanicPolicy::Halt`].
    Panic {
        /// Beat time of the slice being dispatched.
        time: f64,
        /// Payload of the panic.
        payload: Box<dyn Any + Send + 'static>,
    },
    /// The dispatch thread panicked outside of a payload.
    WorkerPanic {
        /// Payload of the panic.
        payload: Box<dyn Any + Send + 'static>,
    },
}

impl ExecutionError {
    /// Returns the panic message, if the panic payload is a string.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Panic { payload, .. } | Self::WorkerPanic { payload } => {
                worker::panic_message(&**payload)
            }
        }
    }
}

impl fmt::Debug for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Panic { time, .. } => f
                .debug_struct("Panic")
                .field("time", time)
                .field("message", &self.message())
                .finish_non_exhaustive(),
            Self::WorkerPanic { .. } => f
                .debug_struct("WorkerPanic")
                .field("message", &self.message())
                .finish_non_exhaustive(),
        }
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = self.message().unwrap_or(worker::NON_STRING_PANIC);
        match self {
            Self::Panic { time, .. } => {
                write!(fmt, "a payload panicked at beat {}: {}", time, message)
            }
            Self::WorkerPanic { .. } => write!(fmt, "the dispatch thread panicked: {}", message),
        }
    }
}

impl Error for ExecutionError {}
