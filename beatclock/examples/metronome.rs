//! Example: metronome with an accent on the first beat of each bar.
//!
//! This example demonstrates in particular:
//!
//! * self-propagating events,
//! * note cascades with `NoteOnOff`,
//! * live tempo changes from a payload,
//! * beat-time stamping of log lines.
//!
//! Run with `RUST_LOG=debug` to see the clock logs:
//!
//! ```text
//! $ RUST_LOG=debug cargo run --example metronome --features tracing-timer
//! ```

use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::info;

use beatclock::clock::{ClockInit, Scheduler};
use beatclock::event::{
    u4, u7, Callback, ChannelMessage, MessageSink, MidiMessage, NoteOnOff, TimedEvent,
};
use beatclock::tracing::BeatTime;

/// Percussion channel.
const CHANNEL: u8 = 9;
/// Side stick, used for the accent.
const ACCENT: u8 = 37;
/// Closed hi-hat.
const CLICK: u8 = 42;
const BEATS_PER_BAR: u32 = 4;
const BARS: u32 = 4;

/// A sink printing every message and counting note ons.
#[derive(Default)]
struct Console {
    notes: AtomicUsize,
}

impl MessageSink for Console {
    fn send(&self, message: &ChannelMessage) {
        if let MidiMessage::NoteOn { key, .. } = message.message() {
            self.notes.fetch_add(1, Ordering::Relaxed);
            info!(key = key.as_int(), "click");
        }
    }
}

/// Plays one click and schedules the next one, speeding up by 10% every bar.
fn tick(scheduler: Scheduler, sink: Arc<Console>, beat: u32) -> Callback {
    Callback::new(move |cx| {
        let accent = beat % BEATS_PER_BAR == 0;
        let (key, vel) = if accent { (ACCENT, 127) } else { (CLICK, 80) };

        if accent && beat != 0 {
            info!(bar = beat / BEATS_PER_BAR, "next bar");
            if let Err(e) = scheduler.set_bpm(cx.bpm() * 1.1) {
                tracing::error!("{}", e);
            }
        }

        let mut events = Vec::new();
        let note = NoteOnOff::new(
            sink.clone(),
            u4::from(CHANNEL),
            u7::from(key),
            u7::from(vel),
            0.25,
        );
        match note {
            Ok(note) => events.push(TimedEvent::new(cx.time(), note)),
            Err(e) => tracing::error!("{}", e),
        }
        if beat + 1 < BEATS_PER_BAR * BARS {
            events.push(TimedEvent::new(
                cx.time() + 1.0,
                tick(scheduler.clone(), sink.clone(), beat + 1),
            ));
        }

        events
    })
}

fn main() -> Result<(), Box<dyn Error>> {
    let clock = ClockInit::new()
        .set_bpm(240.0)
        .set_thread_name("metronome")
        .init()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_timer(BeatTime::with_system_timer(clock.scheduler()))
        .init();

    let sink = Arc::new(Console::default());
    clock
        .schedule(TimedEvent::new(0.0, tick(clock.scheduler(), sink.clone(), 0)))?;

    clock.start()?;
    // Four bars at 240 bpm or faster take less than 4 seconds.
    thread::sleep(Duration::from_secs(4));
    clock.stop()?;

    info!(beat_time = clock.beat_time(), bpm = clock.bpm(), "done");
    assert_eq!(sink.notes.load(Ordering::Relaxed), (BEATS_PER_BAR * BARS) as usize);
    assert_eq!(clock.pending(), 0);

    Ok(())
}
