//! Timed events and the payload contract.
//!
//! A [`TimedEvent`] pairs a beat time with a boxed [`Payload`]. Payloads are
//! executed by the dispatch thread of a [`Clock`](crate::clock::Clock) when
//! their beat time is reached and may return follow-up events, which is how
//! cascades such as a note on scheduling its own note off are expressed.
//!
//! This module also provides ready-made payloads:
//!
//! * [`SendMessage`] and [`NoteOnOff`], which deliver [`ChannelMessage`]s to a
//!   [`MessageSink`],
//! * [`Callback`], which wraps a closure.
//!
//! # Examples
//!
//! A payload that counts down, re-scheduling itself one beat later until the
//! counter reaches zero.
//!
//! ```
//! use beatclock::event::{Context, Payload, TimedEvent};
//!
//! #[derive(Clone)]
//! struct Countdown(u32);
//!
//! impl Payload for Countdown {
//!     fn execute(self: Box<Self>, cx: &Context) -> Vec<TimedEvent> {
//!         println!("{} at beat {}", self.0, cx.time());
//!         if self.0 == 0 {
//!             return Vec::new();
//!         }
//!
//!         vec![TimedEvent::new(cx.time() + 1.0, Countdown(self.0 - 1))]
//!     }
//!
//!     fn time_shifted(&self, _delta: f64) -> Box<dyn Payload> {
//!         Box::new(self.clone())
//!     }
//! }
//!
//! let event = TimedEvent::new(4.0, Countdown(3));
//! let follow_ups = event.execute(&Context::new(4.0, 120.0));
//!
//! assert_eq!(follow_ups.len(), 1);
//! assert_eq!(follow_ups[0].time(), 5.0);
//! ```

mod callback;
mod messages;

pub use callback::Callback;
pub use messages::{ChannelMessage, MessageError, MessageSink, NoteOnOff, SendMessage};

pub use midly::num::{u14, u4, u7};
pub use midly::{MidiMessage, PitchBend};

use std::fmt;

use dyn_clone::DynClone;

/// The executable part of a [`TimedEvent`].
///
/// Payloads are cloneable trait objects so that event sequences can be kept
/// and re-scheduled, see
/// [`Scheduler::schedule_shifted`](crate::clock::Scheduler::schedule_shifted).
pub trait Payload: DynClone + Send + Sync + 'static {
    /// Executes the payload at the beat time given by the context.
    ///
    /// The returned events are inserted into the queue of the clock once the
    /// call returns. Returned events scheduled at or before the current time
    /// are dispatched at the next opportunity, after the current slice.
    fn execute(self: Box<Self>, cx: &Context) -> Vec<TimedEvent>;

    /// Returns a copy of this payload with any beat time it embeds shifted by
    /// `delta`.
    ///
    /// The scheduled time of the enclosing event is shifted separately by
    /// [`TimedEvent::time_shifted`], so payloads that do not store a time
    /// simply return a clone of themselves.
    fn time_shifted(&self, delta: f64) -> Box<dyn Payload>;
}

dyn_clone::clone_trait_object!(Payload);

/// A payload scheduled at a beat time.
#[derive(Clone)]
pub struct TimedEvent {
    time: f64,
    payload: Box<dyn Payload>,
}

impl TimedEvent {
    /// Creates an event scheduled at the specified beat time.
    pub fn new(time: f64, payload: impl Payload) -> Self {
        Self {
            time,
            payload: Box::new(payload),
        }
    }

    /// Creates an event from an already boxed payload.
    pub fn from_boxed(time: f64, payload: Box<dyn Payload>) -> Self {
        Self { time, payload }
    }

    /// Returns the scheduled beat time.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Returns a copy of this event scheduled `delta` beats later (or earlier
    /// if `delta` is negative).
    pub fn time_shifted(&self, delta: f64) -> Self {
        Self {
            time: self.time + delta,
            payload: self.payload.time_shifted(delta),
        }
    }

    /// Consumes the event, executes its payload and returns the follow-up
    /// events.
    pub fn execute(self, cx: &Context) -> Vec<TimedEvent> {
        self.payload.execute(cx)
    }
}

impl fmt::Debug for TimedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimedEvent")
            .field("time", &self.time)
            .finish_non_exhaustive()
    }
}

/// The execution context of a payload.
///
/// The beat time seen by a payload is frozen at the scheduled time of the
/// slice being dispatched, however long the payloads of that slice take to
/// execute.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Context {
    time: f64,
    bpm: f64,
}

impl Context {
    /// Creates a context for the specified beat time and tempo.
    ///
    /// The dispatch thread of a clock builds contexts on its own; this
    /// constructor is mostly useful to execute payloads in isolation.
    pub fn new(time: f64, bpm: f64) -> Self {
        Self { time, bpm }
    }

    /// Returns the frozen beat time of the dispatched slice.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Returns the tempo, in beats per minute, when the slice was dispatched.
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Converts a wall-clock duration in seconds into beats at the current
    /// tempo.
    pub fn beats_in(&self, secs: f64) -> f64 {
        secs * self.bpm / 60.0
    }
}
