//! Event dispatch order, timing and cascades.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use beatclock::clock::{Clock, Scheduler, SchedulingError};
use beatclock::event::{
    u4, u7, Callback, ChannelMessage, Context, MessageSink, NoteOnOff, SendMessage, TimedEvent,
};

// 100 beats per second.
const FAST_BPM: f64 = 6000.0;

type Log<T> = Arc<Mutex<Vec<T>>>;

fn log_event<T>(time: f64, log: &Log<T>, entry: T) -> TimedEvent
where
    T: Clone + Send + Sync + 'static,
{
    let log = log.clone();

    TimedEvent::new(
        time,
        Callback::once(move |_| log.lock().unwrap().push(entry.clone())),
    )
}

fn run_for(clock: &Clock, duration: Duration) {
    clock.start().unwrap();
    thread::sleep(duration);
    clock.stop().unwrap();
}

#[test]
fn dispatch_in_time_order() {
    const EVENT_COUNT: usize = 40;

    let clock = Clock::new(FAST_BPM).unwrap();
    let log = Log::default();

    // Scramble the scheduling order with a stride coprime to the event count.
    for i in 0..EVENT_COUNT {
        let beat = ((i * 7) % EVENT_COUNT) as f64 * 0.25;
        clock.schedule(log_event(beat, &log, beat)).unwrap();
    }

    run_for(&clock, Duration::from_millis(300));

    let log = log.lock().unwrap();
    let expected: Vec<f64> = (0..EVENT_COUNT).map(|i| i as f64 * 0.25).collect();
    assert_eq!(*log, expected);
}

#[test]
fn dispatch_ties_in_scheduling_order() {
    let clock = Clock::new(FAST_BPM).unwrap();
    let log = Log::default();

    clock.schedule(log_event(2.0, &log, "c")).unwrap();
    clock.schedule(log_event(1.0, &log, "a")).unwrap();
    clock
        .schedule_all([
            log_event(2.0, &log, "d"),
            log_event(1.0, &log, "b"),
            log_event(2.0, &log, "e"),
        ])
        .unwrap();
    clock.schedule(log_event(2.0, &log, "f")).unwrap();

    run_for(&clock, Duration::from_millis(100));

    assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c", "d", "e", "f"]);
}

#[test]
fn dispatch_at_tempo() {
    // At 120 bpm, beats 0, 1 and 2 are due after 0s, 0.5s and 1s.
    const TOLERANCE: Duration = Duration::from_millis(150);

    let clock = Clock::new(120.0).unwrap();
    let log: Log<Duration> = Log::default();
    let t0 = Arc::new(Mutex::new(None::<Instant>));

    for beat in [0.0, 1.0, 2.0] {
        let log = log.clone();
        let t0 = t0.clone();
        let event = TimedEvent::new(
            beat,
            Callback::once(move |_| {
                let t0 = t0.lock().unwrap().unwrap();
                log.lock().unwrap().push(t0.elapsed());
            }),
        );
        clock.schedule(event).unwrap();
    }

    *t0.lock().unwrap() = Some(Instant::now());
    run_for(&clock, Duration::from_millis(1300));

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 3);
    for (elapsed, expected_ms) in log.iter().zip([0, 500, 1000]) {
        let expected = Duration::from_millis(expected_ms);
        assert!(*elapsed + Duration::from_millis(2) >= expected);
        assert!(*elapsed <= expected + TOLERANCE);
    }
}

#[test]
fn dispatch_past_due_events() {
    let clock = Clock::new(FAST_BPM).unwrap();
    let log = Log::default();

    clock.start().unwrap();
    thread::sleep(Duration::from_millis(50));

    // Beat 1 and beat -3 are long past: both fire at the next opportunity, in
    // time order.
    clock
        .schedule_all([log_event(1.0, &log, 1.0), log_event(-3.0, &log, -3.0)])
        .unwrap();
    thread::sleep(Duration::from_millis(50));
    clock.stop().unwrap();

    assert_eq!(*log.lock().unwrap(), vec![-3.0, 1.0]);
    assert_eq!(clock.pending(), 0);
}

#[test]
fn dispatch_frozen_time_in_payload() {
    let clock = Clock::new(FAST_BPM).unwrap();
    let scheduler = clock.scheduler();
    let log: Log<(f64, f64, bool)> = Log::default();

    for _ in 0..3 {
        let scheduler = scheduler.clone();
        let log = log.clone();
        let event = TimedEvent::new(
            1.5,
            Callback::once(move |cx| {
                // 20ms amount to 2 beats of wall-clock time.
                thread::sleep(Duration::from_millis(20));
                log.lock().unwrap().push((
                    cx.time(),
                    scheduler.beat_time(),
                    scheduler.is_running(),
                ));
            }),
        );
        clock.schedule(event).unwrap();
    }

    run_for(&clock, Duration::from_millis(200));

    assert_eq!(*log.lock().unwrap(), vec![(1.5, 1.5, true); 3]);

    // Outside of payloads the live beat time is visible again.
    assert!(clock.beat_time() > 1.5);
}

#[test]
fn dispatch_context_bpm() {
    let clock = Clock::new(FAST_BPM).unwrap();
    let log: Log<Context> = Log::default();

    let event = {
        let log = log.clone();
        TimedEvent::new(
            0.5,
            Callback::once(move |cx| log.lock().unwrap().push(*cx)),
        )
    };
    clock.schedule(event).unwrap();

    run_for(&clock, Duration::from_millis(50));

    assert_eq!(*log.lock().unwrap(), vec![Context::new(0.5, FAST_BPM)]);
}

#[test]
fn dispatch_stops_with_clock() {
    const EVENT_COUNT: usize = 1000;

    let clock = Clock::new(FAST_BPM).unwrap();
    let count = Arc::new(AtomicUsize::new(0));

    // One event every 0.1 beat, i.e. every millisecond.
    let events = (0..EVENT_COUNT).map(|i| {
        let count = count.clone();
        TimedEvent::new(
            i as f64 * 0.1,
            Callback::once(move |_| {
                count.fetch_add(1, Ordering::Relaxed);
            }),
        )
    });
    clock.schedule_all(events).unwrap();

    run_for(&clock, Duration::from_millis(100));
    let dispatched = count.load(Ordering::Relaxed);
    assert!(dispatched > 0);
    assert!(dispatched < EVENT_COUNT);

    thread::sleep(Duration::from_millis(100));
    assert_eq!(count.load(Ordering::Relaxed), dispatched);
    assert_eq!(dispatched + clock.pending(), EVENT_COUNT);
}

// A sink logging the beat time at which each message is received.
struct BeatSink {
    scheduler: Scheduler,
    log: Log<(f64, ChannelMessage)>,
}

impl MessageSink for BeatSink {
    fn send(&self, message: &ChannelMessage) {
        let beat_time = self.scheduler.beat_time();
        self.log.lock().unwrap().push((beat_time, *message));
    }
}

#[test]
fn dispatch_note_cascade() {
    let clock = Clock::new(FAST_BPM).unwrap();
    let log = Log::default();
    let sink = Arc::new(BeatSink {
        scheduler: clock.scheduler(),
        log: log.clone(),
    });

    let (channel, key) = (u4::from(9), u7::from(36));
    let note = NoteOnOff::new(sink.clone(), channel, key, u7::from(127), 2.0).unwrap();
    clock.schedule(TimedEvent::new(1.0, note)).unwrap();
    let cc = ChannelMessage::control_change(channel, u7::from(7), u7::from(64));
    clock
        .schedule(TimedEvent::new(2.0, SendMessage::new(sink, cc)))
        .unwrap();

    run_for(&clock, Duration::from_millis(150));

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            (1.0, ChannelMessage::note_on(channel, key, u7::from(127))),
            (2.0, cc),
            (3.0, ChannelMessage::note_off(channel, key, u7::from(0))),
        ]
    );
}

fn countdown(log: Log<f64>, remaining: usize) -> Callback {
    Callback::new(move |cx| {
        log.lock().unwrap().push(cx.time());
        if remaining == 0 {
            return Vec::new();
        }

        vec![TimedEvent::new(
            cx.time() + 1.0,
            countdown(log.clone(), remaining - 1),
        )]
    })
}

#[test]
fn dispatch_self_propagating_event() {
    let clock = Clock::new(FAST_BPM).unwrap();
    let log = Log::default();

    clock
        .schedule(TimedEvent::new(0.0, countdown(log.clone(), 4)))
        .unwrap();

    run_for(&clock, Duration::from_millis(150));

    assert_eq!(*log.lock().unwrap(), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    assert_eq!(clock.pending(), 0);
}

#[test]
fn dispatch_follow_ups_within_slice_time() {
    let clock = Clock::new(FAST_BPM).unwrap();
    let log = Log::default();

    // A follow-up due at the current time runs after the current slice.
    let event = {
        let log = log.clone();
        let follow_up = log_event(1.0, &log, "follow-up");
        TimedEvent::new(
            1.0,
            Callback::new(move |_| {
                log.lock().unwrap().push("first");
                vec![follow_up.clone()]
            }),
        )
    };
    clock.schedule(event).unwrap();
    clock.schedule(log_event(1.0, &log, "second")).unwrap();

    run_for(&clock, Duration::from_millis(100));

    assert_eq!(*log.lock().unwrap(), vec!["first", "second", "follow-up"]);
}

#[test]
fn dispatch_shifted_pattern() {
    let clock = Clock::new(FAST_BPM).unwrap();
    let log = Log::default();

    let pattern = vec![log_event(0.0, &log, "kick"), log_event(0.5, &log, "hat")];
    clock.schedule_shifted(&pattern, 4.0).unwrap();
    clock.schedule_shifted(&pattern, 2.0).unwrap();
    assert_eq!(clock.pending(), 4);

    run_for(&clock, Duration::from_millis(100));

    assert_eq!(*log.lock().unwrap(), vec!["kick", "hat", "kick", "hat"]);
    // The pattern itself is left untouched.
    assert_eq!(pattern[1].time(), 0.5);
}

#[test]
fn dispatch_from_payload_scheduler() {
    let clock = Clock::new(FAST_BPM).unwrap();
    let log = Log::default();

    let event = {
        let scheduler = clock.scheduler();
        let log = log.clone();
        TimedEvent::new(
            1.0,
            Callback::once(move |cx| {
                scheduler
                    .schedule(log_event(cx.time() + 0.5, &log, cx.time() + 0.5))
                    .unwrap();
            }),
        )
    };
    clock.schedule(event).unwrap();

    run_for(&clock, Duration::from_millis(100));

    assert_eq!(*log.lock().unwrap(), vec![1.5]);
}

#[test]
fn dispatch_rejects_non_finite_times() {
    let clock = Clock::new(FAST_BPM).unwrap();
    let log = Log::default();

    assert_eq!(
        clock.schedule(log_event(f64::INFINITY, &log, ())),
        Err(SchedulingError::InvalidTime(f64::INFINITY))
    );
    assert!(matches!(
        clock.schedule(log_event(f64::NAN, &log, ())),
        Err(SchedulingError::InvalidTime(_))
    ));

    // All or nothing.
    assert!(clock
        .schedule_all([log_event(1.0, &log, ()), log_event(f64::NAN, &log, ())])
        .is_err());
    assert!(clock
        .schedule_shifted(&[log_event(1.0, &log, ())], f64::NEG_INFINITY)
        .is_err());
    assert_eq!(clock.pending(), 0);
}

#[test]
fn dispatch_discards_non_finite_follow_ups() {
    let clock = Clock::new(FAST_BPM).unwrap();
    let log = Log::default();

    let event = {
        let log = log.clone();
        TimedEvent::new(
            0.0,
            Callback::new(move |cx| {
                vec![
                    log_event(f64::NAN, &log, "nan"),
                    log_event(cx.time() + 1.0, &log, "next"),
                ]
            }),
        )
    };
    clock.schedule(event).unwrap();

    run_for(&clock, Duration::from_millis(100));

    assert_eq!(*log.lock().unwrap(), vec!["next"]);
    assert_eq!(clock.pending(), 0);
}
