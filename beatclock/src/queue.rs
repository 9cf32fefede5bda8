//! Time-ordered event queue.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::event::TimedEvent;

/// A collection of events ordered by beat time.
///
/// Events sharing the same beat time form a *slice*; they are returned
/// together by [`pop_earliest_slice()`](EventQueue::pop_earliest_slice) in
/// insertion order.
///
/// The queue performs no synchronization of its own: a
/// [`Clock`](crate::clock::Clock) keeps its queue behind its dispatch lock.
#[derive(Default)]
pub struct EventQueue {
    slices: BTreeMap<TimeKey, Vec<TimedEvent>>,
    len: usize,
}

impl EventQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an event.
    ///
    /// This operation has *O*(log(*N*)) complexity, where *N* is the number of
    /// distinct beat times in the queue.
    pub fn insert(&mut self, event: TimedEvent) {
        self.slices
            .entry(TimeKey::new(event.time()))
            .or_default()
            .push(event);
        self.len += 1;
    }

    /// Returns the earliest beat time in the queue, or `None` if the queue is
    /// empty.
    pub fn earliest_time(&self) -> Option<f64> {
        self.slices.first_key_value().map(|(key, _)| key.0)
    }

    /// Removes and returns all events scheduled at the earliest beat time,
    /// together with that time.
    ///
    /// Events are returned in insertion order.
    pub fn pop_earliest_slice(&mut self) -> Option<(f64, Vec<TimedEvent>)> {
        let (key, slice) = self.slices.pop_first()?;
        self.len -= slice.len();

        Some((key.0, slice))
    }

    /// Returns `true` if the queue holds no events.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of events in the queue.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Discards all events.
    pub fn clear(&mut self) {
        self.slices.clear();
        self.len = 0;
    }
}

impl Extend<TimedEvent> for EventQueue {
    fn extend<I: IntoIterator<Item = TimedEvent>>(&mut self, events: I) {
        for event in events {
            self.insert(event);
        }
    }
}

impl fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("len", &self.len)
            .field("earliest_time", &self.earliest_time())
            .finish_non_exhaustive()
    }
}

/// A totally ordered beat time.
///
/// `-0.0` is folded into `0.0` so that both land in the same slice.
#[derive(Copy, Clone, Debug)]
struct TimeKey(f64);

impl TimeKey {
    fn new(time: f64) -> Self {
        // Adding positive zero maps -0.0 to 0.0 and leaves all other values
        // unchanged.
        Self(time + 0.0)
    }
}

impl PartialEq for TimeKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TimeKey {}

impl PartialOrd for TimeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}
