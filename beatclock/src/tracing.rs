//! Beat-time stamping of log lines.
//!
//! # Overview
//!
//! By default, the [`tracing_subscriber::fmt`][mod@tracing_subscriber::fmt]
//! subscriber stamps events with the wall clock time. When debugging a
//! sequence, it is often more useful to know at which beat something happened.
//! This module provides the [`BeatTime`] timer, which stamps events with the
//! beat time of a clock while the clock is running and reverts to another
//! timer otherwise.
//!
//! Within a payload, the stamp is the frozen beat time of the slice being
//! dispatched.
//!
//! # Configuration
//!
//! ```
//! use beatclock::clock::Clock;
//! use beatclock::tracing::BeatTime;
//!
//! let clock = Clock::new(120.0).unwrap();
//!
//! tracing_subscriber::fmt()
//!     .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
//!     .with_timer(BeatTime::with_system_timer(clock.scheduler()))
//!     .init();
//! ```
//!
//! Events emitted while the clock runs are then stamped with the beat time,
//! other events with the system time:
//!
//! ```text
//! [beat 12.000000]  INFO clock{name="beatclock"}: my_sequencer: bar 4
//! 2024-09-10T14:39:24.670921Z  INFO my_sequencer: sequence done
//! ```
//!
//! `BeatTime::with_system_timer_always()` prepends the system time to all
//! events, followed by the beat time while the clock runs:
//!
//! ```text
//! 2024-09-10T14:39:22.124945Z [beat 12.000000]  INFO clock{name="beatclock"}: my_sequencer: bar 4
//! 2024-09-10T14:39:24.670921Z  INFO my_sequencer: sequence done
//! ```

use std::fmt;

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};

use crate::clock::Scheduler;

/// A timer that can be used in conjunction with the
/// [`tracing-subscriber`][tracing_subscriber] crate to stamp events with the
/// beat time of a clock instead of (or on top of) the wall clock time.
///
/// See the [module-level documentation][crate::tracing] for more details.
#[derive(Debug)]
pub struct BeatTime<const VERBOSE: bool, T> {
    scheduler: Scheduler,
    sys_timer: T,
}

impl BeatTime<false, SystemTime> {
    /// Constructs a new beat-time timer which falls back to the
    /// [`SystemTime`] timer while the clock is stopped.
    pub fn with_system_timer(scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            sys_timer: SystemTime,
        }
    }
}

impl BeatTime<true, SystemTime> {
    /// Constructs a new beat-time timer which prepends a [`SystemTime`]
    /// timestamp to all events, followed by the beat time while the clock is
    /// running.
    pub fn with_system_timer_always(scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            sys_timer: SystemTime,
        }
    }
}

impl<T: FormatTime> BeatTime<false, T> {
    /// Constructs a new beat-time timer which falls back to the provided timer
    /// while the clock is stopped.
    pub fn with_custom_timer(scheduler: Scheduler, sys_timer: T) -> Self {
        Self {
            scheduler,
            sys_timer,
        }
    }
}

impl<T: FormatTime> BeatTime<true, T> {
    /// Constructs a new beat-time timer which prepends a timestamp generated
    /// with the provided timer to all events, followed by the beat time while
    /// the clock is running.
    pub fn with_custom_timer_always(scheduler: Scheduler, sys_timer: T) -> Self {
        Self {
            scheduler,
            sys_timer,
        }
    }
}

impl<const VERBOSE: bool, T: FormatTime> FormatTime for BeatTime<VERBOSE, T> {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        if !self.scheduler.is_running() {
            return self.sys_timer.format_time(w);
        }

        if VERBOSE {
            self.sys_timer.format_time(w)?;
            w.write_char(' ')?;
        }
        write!(w, "[beat {:.6}]", self.scheduler.beat_time())
    }
}
