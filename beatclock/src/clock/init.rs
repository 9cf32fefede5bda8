use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::time;

use super::{Clock, ClockError};

/// Behavior of the dispatch thread when a payload panics.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PanicPolicy {
    /// Halt the dispatch loop.
    ///
    /// The events of the slice that were not yet executed are put back into
    /// the queue, beat time keeps advancing and the panic is reported by the
    /// next call to [`Clock::stop()`], after which the clock can be started
    /// again.
    #[default]
    Halt,
    /// Log the panic and go on with the dispatch of the remaining events.
    Continue,
}

/// Configuration of a [`Clock`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClockConfig {
    /// Initial tempo in beats per minute.
    pub bpm: f64,
    /// Behavior on payload panics.
    pub panic_policy: PanicPolicy,
    /// Name given to the dispatch thread.
    pub thread_name: String,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            panic_policy: PanicPolicy::default(),
            thread_name: String::from("beatclock"),
        }
    }
}

/// Builder for a [`Clock`].
///
/// # Examples
///
/// ```
/// use beatclock::clock::{ClockInit, PanicPolicy};
///
/// let clock = ClockInit::new()
///     .set_bpm(96.0)
///     .set_panic_policy(PanicPolicy::Continue)
///     .set_thread_name("sequencer")
///     .init()
///     .unwrap();
///
/// assert_eq!(clock.bpm(), 96.0);
/// assert!(!clock.is_running());
/// ```
#[derive(Default)]
pub struct ClockInit {
    config: ClockConfig,
}

impl ClockInit {
    /// Creates a builder with a default configuration: 120 bpm and
    /// [`PanicPolicy::Halt`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder initialized from an existing configuration.
    pub fn from_config(config: ClockConfig) -> Self {
        Self { config }
    }

    /// Sets the initial tempo in beats per minute.
    pub fn set_bpm(mut self, bpm: f64) -> Self {
        self.config.bpm = bpm;

        self
    }

    /// Sets the behavior of the dispatch thread on payload panics.
    pub fn set_panic_policy(mut self, panic_policy: PanicPolicy) -> Self {
        self.config.panic_policy = panic_policy;

        self
    }

    /// Sets the name of the dispatch thread.
    ///
    /// The name is also recorded in the `clock` tracing span entered by the
    /// dispatch thread.
    pub fn set_thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();

        self
    }

    /// Builds a stopped clock at beat 0.
    ///
    /// An error is returned if the tempo is not finite and strictly positive.
    pub fn init(self) -> Result<Clock, ClockError> {
        if !time::is_valid_bpm(self.config.bpm) {
            return Err(ClockError::InvalidBpm(self.config.bpm));
        }

        Ok(Clock::from_config(self.config))
    }
}

impl fmt::Debug for ClockInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockInit")
            .field("config", &self.config)
            .finish()
    }
}
