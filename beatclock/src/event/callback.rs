use std::fmt;
use std::sync::Arc;

use super::{Context, Payload, TimedEvent};

/// A payload invoking a closure.
///
/// The closure is shared between copies of the payload, so cloning and time
/// shifting are cheap. Whatever events the closure returns are scheduled as
/// follow-ups.
///
/// # Examples
///
/// A metronome ticking every beat, forever.
///
/// ```
/// use beatclock::event::{Callback, TimedEvent};
///
/// fn tick() -> Callback {
///     Callback::new(|cx| {
///         println!("tick at beat {}", cx.time());
///
///         vec![TimedEvent::new(cx.time() + 1.0, tick())]
///     })
/// }
///
/// let first_tick = TimedEvent::new(0.0, tick());
/// ```
#[derive(Clone)]
pub struct Callback {
    func: Arc<dyn Fn(&Context) -> Vec<TimedEvent> + Send + Sync>,
}

impl Callback {
    /// Creates a payload from a closure returning follow-up events.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Context) -> Vec<TimedEvent> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
        }
    }

    /// Creates a payload from a closure without follow-up events.
    pub fn once<F>(func: F) -> Self
    where
        F: Fn(&Context) + Send + Sync + 'static,
    {
        Self::new(move |cx| {
            func(cx);

            Vec::new()
        })
    }
}

impl Payload for Callback {
    fn execute(self: Box<Self>, cx: &Context) -> Vec<TimedEvent> {
        (self.func)(cx)
    }

    fn time_shifted(&self, _delta: f64) -> Box<dyn Payload> {
        Box::new(self.clone())
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback").finish_non_exhaustive()
    }
}
