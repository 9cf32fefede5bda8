//! Dispatch loop of the clock thread.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use tracing::{error, trace, warn};

use crate::event::{Context, TimedEvent};

use super::scheduler::Shared;
use super::{ExecutionError, PanicPolicy};

pub(super) const NON_STRING_PANIC: &str = "<non-string panic payload>";

/// Runs the dispatch loop until an exit is requested or, with
/// [`PanicPolicy::Halt`], until a payload panics.
pub(super) fn run(shared: Arc<Shared>, panic_policy: PanicPolicy) -> Result<(), ExecutionError> {
    let mut state = shared.lock_dispatch();
    state.worker = Some(thread::current().id());

    loop {
        if state.exit_requested {
            return Ok(());
        }

        let Some(due_time) = state.queue.earliest_time() else {
            state = shared
                .wake
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
            continue;
        };

        // Lock order: dispatch, then timeline.
        let wait = shared.lock_timeline().wall_time_until(due_time);
        match wait {
            Some(duration) if duration.is_zero() => {}
            Some(duration) => {
                // An early wake-up, whether spurious or caused by a new event
                // or a tempo change, re-derives the wait.
                state = shared
                    .wake
                    .wait_timeout(state, duration)
                    .map(|(state, _)| state)
                    .unwrap_or_else(|e| e.into_inner().0);
                continue;
            }
            None => {
                state = shared
                    .wake
                    .wait(state)
                    .unwrap_or_else(|e| e.into_inner());
                continue;
            }
        }

        let Some((time, slice)) = state.queue.pop_earliest_slice() else {
            continue;
        };
        state.frozen_time = Some(time);
        drop(state);

        let cx = Context::new(time, shared.lock_timeline().bpm());
        trace!(time, events = slice.len(), "dispatching slice");

        let mut follow_ups = Vec::new();
        let mut slice = slice.into_iter();
        while let Some(event) = slice.next() {
            match panic::catch_unwind(AssertUnwindSafe(|| event.execute(&cx))) {
                Ok(events) => follow_ups.extend(events),
                Err(payload) => match panic_policy {
                    PanicPolicy::Continue => {
                        error!(
                            time,
                            "payload panicked, dispatch goes on: {}",
                            panic_message(&*payload).unwrap_or(NON_STRING_PANIC)
                        );
                    }
                    PanicPolicy::Halt => {
                        error!(
                            time,
                            "payload panicked, dispatch halted: {}",
                            panic_message(&*payload).unwrap_or(NON_STRING_PANIC)
                        );

                        // Keep what was not dispatched so it can be inspected
                        // or dispatched after a restart.
                        let follow_ups = orderable(follow_ups);
                        let mut state = shared.lock_dispatch();
                        state.queue.extend(slice);
                        state.queue.extend(follow_ups);
                        state.frozen_time = None;
                        shared.running.store(false, Ordering::Release);

                        return Err(ExecutionError::Panic { time, payload });
                    }
                },
            }
        }

        // Nothing may be logged while the dispatch lock is held since log
        // timers may read the beat time.
        let follow_ups = orderable(follow_ups);
        state = shared.lock_dispatch();
        state.queue.extend(follow_ups);
        state.frozen_time = None;
    }
}

/// Discards the events returned by payloads that cannot be ordered.
fn orderable(mut follow_ups: Vec<TimedEvent>) -> Vec<TimedEvent> {
    follow_ups.retain(|event| {
        let time = event.time();
        if !time.is_finite() {
            warn!(time, "discarding follow-up event with a non-finite time");
            return false;
        }

        true
    });

    follow_ups
}

/// Extracts the message of a panic payload, if it is a string.
pub(super) fn panic_message(payload: &(dyn Any + Send)) -> Option<&str> {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        Some(msg)
    } else {
        payload.downcast_ref::<String>().map(String::as_str)
    }
}
