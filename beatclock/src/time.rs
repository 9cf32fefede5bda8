//! Beat-time timeline.
//!
//! The timeline maps wall-clock time, as measured by the system's monotonic
//! clock, to beat time. While running, beat time advances at the tempo in
//! beats per minute; while stopped it is frozen. Both tempo changes and
//! stop/start cycles re-base the timeline so that beat time never jumps.

use std::time::{Duration, Instant};

/// Longest single wait derived from the timeline.
///
/// Far-future events are waited for in several steps; this bounds the
/// conversion of beat durations into `Duration`s.
pub(crate) const MAX_WAIT: Duration = Duration::from_secs(3600);

/// A pausable, tempo-adjustable mapping from wall-clock time to beat time.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Timeline {
    bpm: f64,
    // Wall-clock time matched to `offset`, set only while running.
    reference: Option<Instant>,
    // Beat time at `reference`, or the frozen beat time while stopped.
    offset: f64,
}

impl Timeline {
    /// Creates a stopped timeline at beat 0.
    ///
    /// The tempo must have been checked with [`is_valid_bpm`].
    pub(crate) fn new(bpm: f64) -> Self {
        debug_assert!(is_valid_bpm(bpm));

        Self {
            bpm,
            reference: None,
            offset: 0.0,
        }
    }

    pub(crate) fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Returns the current beat time.
    pub(crate) fn now(&self) -> f64 {
        self.beat_time_at(Instant::now())
    }

    /// Returns the beat time at the specified wall-clock time.
    pub(crate) fn beat_time_at(&self, instant: Instant) -> f64 {
        match self.reference {
            Some(reference) => {
                let elapsed = instant.saturating_duration_since(reference);

                self.offset + elapsed.as_secs_f64() * self.bpm / 60.0
            }
            None => self.offset,
        }
    }

    /// Changes the tempo without changing the current beat time.
    pub(crate) fn set_bpm(&mut self, bpm: f64) {
        self.set_bpm_at(bpm, Instant::now());
    }

    pub(crate) fn set_bpm_at(&mut self, bpm: f64, instant: Instant) {
        debug_assert!(is_valid_bpm(bpm));

        if self.reference.is_some() {
            self.offset = self.beat_time_at(instant);
            self.reference = Some(instant);
        }
        self.bpm = bpm;
    }

    /// Lets beat time advance from its current value.
    pub(crate) fn start(&mut self) {
        self.start_at(Instant::now());
    }

    pub(crate) fn start_at(&mut self, instant: Instant) {
        if self.reference.is_none() {
            self.reference = Some(instant);
        }
    }

    /// Freezes beat time at its current value.
    pub(crate) fn stop(&mut self) {
        self.stop_at(Instant::now());
    }

    pub(crate) fn stop_at(&mut self, instant: Instant) {
        self.offset = self.beat_time_at(instant);
        self.reference = None;
    }

    /// Stops the timeline and rewinds it to beat 0.
    pub(crate) fn reset(&mut self) {
        self.offset = 0.0;
        self.reference = None;
    }

    /// Returns the wall-clock time left until the specified beat time, capped
    /// to [`MAX_WAIT`].
    ///
    /// `Duration::ZERO` is returned if the beat time is due, and `None` if the
    /// timeline is stopped.
    pub(crate) fn wall_time_until(&self, time: f64) -> Option<Duration> {
        self.wall_time_until_at(time, Instant::now())
    }

    pub(crate) fn wall_time_until_at(&self, time: f64, instant: Instant) -> Option<Duration> {
        self.reference?;

        let remaining = time - self.beat_time_at(instant);
        if remaining <= 0.0 {
            return Some(Duration::ZERO);
        }

        let secs = remaining * 60.0 / self.bpm;

        Some(
            Duration::try_from_secs_f64(secs)
                .unwrap_or(MAX_WAIT)
                .min(MAX_WAIT),
        )
    }
}

/// Checks that a tempo is finite and strictly positive.
pub(crate) fn is_valid_bpm(bpm: f64) -> bool {
    bpm.is_finite() && bpm > 0.0
}
