//! A beat-time message scheduler driven by a live, tempo-adjustable clock.
//!
//! Beatclock dispatches timed events on a virtual timeline measured in beats
//! rather than seconds. The timeline advances in real time at a tempo given in
//! beats per minute, which can be changed at any moment without beat time
//! jumping. Events are executed on a dedicated thread when their beat time is
//! reached, and may in turn return follow-up events: a note that schedules its
//! own release, or a pattern that re-schedules itself one bar later, are both
//! expressed this way.
//!
//! # A practical overview
//!
//! Using the crate typically involves three activities:
//!
//! 1. the definition of payloads, i.e. what should happen at a given beat,
//! 2. the creation of a clock and the scheduling of the first events,
//! 3. the control of the clock: start, tempo changes, stop and reset.
//!
//! ## Payloads
//!
//! A [`TimedEvent`](event::TimedEvent) pairs a beat time with a boxed
//! [`Payload`](event::Payload). The payload is executed once, with a
//! [`Context`](event::Context) giving the beat time of the event and the
//! current tempo, and returns a list of follow-up events.
//!
//! Payloads for the most common needs are provided in the [`event`] module:
//!
//! * [`SendMessage`](event::SendMessage) delivers a
//!   [`ChannelMessage`](event::ChannelMessage) such as a note on, a control
//!   change or a pitch bend to a user-provided
//!   [`MessageSink`](event::MessageSink),
//! * [`NoteOnOff`](event::NoteOnOff) sends a note on and schedules the
//!   matching note off a given number of beats later,
//! * [`Callback`](event::Callback) wraps a closure.
//!
//! Custom payloads only need to implement the [`Payload`](event::Payload)
//! trait.
//!
//! ## Clock and scheduling
//!
//! A [`Clock`](clock::Clock) is created with
//! [`Clock::new`](clock::Clock::new) or, for more control over the dispatch
//! thread, with the [`ClockInit`](clock::ClockInit) builder. Events can be
//! scheduled at any time through the clock itself or through cloneable
//! [`Scheduler`](clock::Scheduler) handles, including from within payloads.
//!
//! Events are kept in an [`EventQueue`](queue::EventQueue) ordered by beat
//! time. Events sharing the same beat time form a slice and are executed in
//! the order in which they were scheduled.
//!
//! ## Clock control
//!
//! A clock is created stopped at beat 0. Starting it spawns the dispatch
//! thread and lets beat time advance; stopping it joins the dispatch thread
//! and freezes beat time until the next start. While a slice is being
//! dispatched, the beat time seen by its payloads is frozen at the beat time
//! of the slice.
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use std::thread;
//! use std::time::Duration;
//!
//! use beatclock::clock::Clock;
//! use beatclock::event::{u4, u7, ChannelMessage, MessageSink, NoteOnOff, TimedEvent};
//!
//! // A sink recording everything it receives.
//! #[derive(Default)]
//! struct Recorder(Mutex<Vec<ChannelMessage>>);
//!
//! impl MessageSink for Recorder {
//!     fn send(&self, message: &ChannelMessage) {
//!         self.0.lock().unwrap().push(*message);
//!     }
//! }
//!
//! let recorder = Arc::new(Recorder::default());
//!
//! // 1200 bpm, i.e. 20 beats per second.
//! let clock = Clock::new(1200.0).unwrap();
//!
//! // A C major arpeggio, each note lasting half a beat.
//! let channel = u4::from(0);
//! for (beat, key) in [60, 64, 67].into_iter().enumerate() {
//!     let note = NoteOnOff::new(recorder.clone(), channel, u7::from(key), u7::from(100), 0.5)
//!         .unwrap();
//!     clock.schedule(TimedEvent::new(beat as f64, note)).unwrap();
//! }
//!
//! clock.start().unwrap();
//! thread::sleep(Duration::from_millis(400));
//! clock.stop().unwrap();
//!
//! let sent = recorder.0.lock().unwrap();
//! assert_eq!(sent.len(), 6);
//! assert_eq!(
//!     sent[1],
//!     ChannelMessage::note_off(channel, u7::from(60), u7::from(0))
//! );
//! ```
//!
//! # Logging
//!
//! Clock state changes and payload panics are reported with the
//! [`tracing`](https://docs.rs/tracing) crate. The dispatch thread enters a
//! `clock` span whose `name` field is the thread name set with
//! [`ClockInit::set_thread_name`](clock::ClockInit::set_thread_name).
//!
//! With the `tracing-timer` feature, the `tracing` module provides a timer
//! that stamps log lines with the beat time of a clock.
//!
//! # Feature flags
//!
//! * `serde`: serialization of [`ClockConfig`](clock::ClockConfig),
//! * `tracing-timer`: the beat-time log timer.
#![warn(missing_docs, missing_debug_implementations, unreachable_pub)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod clock;
pub mod event;
pub mod queue;
mod time;
#[cfg(feature = "tracing-timer")]
pub mod tracing;
mod util;
