//! Channel message payloads.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use midly::live::LiveEvent;
use midly::num::{u4, u7};
use midly::{MidiMessage, PitchBend};

use super::{Context, Payload, TimedEvent};

/// A channel voice message: a [`MidiMessage`] addressed to one of the 16
/// channels.
///
/// Value ranges are enforced by the `midly` integer types, so any
/// `ChannelMessage` can be encoded as is. Encoding to the wire format is left
/// to the [`MessageSink`], see [`ChannelMessage::live_event()`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChannelMessage {
    channel: u4,
    message: MidiMessage,
}

impl ChannelMessage {
    /// Creates a message addressed to the specified channel.
    pub fn new(channel: u4, message: MidiMessage) -> Self {
        Self { channel, message }
    }

    /// Creates a note on message.
    pub fn note_on(channel: u4, key: u7, vel: u7) -> Self {
        Self::new(channel, MidiMessage::NoteOn { key, vel })
    }

    /// Creates a note off message.
    pub fn note_off(channel: u4, key: u7, vel: u7) -> Self {
        Self::new(channel, MidiMessage::NoteOff { key, vel })
    }

    /// Creates a control change message.
    pub fn control_change(channel: u4, controller: u7, value: u7) -> Self {
        Self::new(channel, MidiMessage::Controller { controller, value })
    }

    /// Creates a pitch bend message.
    pub fn pitch_bend(channel: u4, bend: PitchBend) -> Self {
        Self::new(channel, MidiMessage::PitchBend { bend })
    }

    /// Creates a program change message.
    pub fn program_change(channel: u4, program: u7) -> Self {
        Self::new(channel, MidiMessage::ProgramChange { program })
    }

    /// Returns the channel the message is addressed to.
    pub fn channel(&self) -> u4 {
        self.channel
    }

    /// Returns the message proper.
    pub fn message(&self) -> &MidiMessage {
        &self.message
    }

    /// Returns the message as a live event, ready to be written to a device.
    pub fn live_event(&self) -> LiveEvent<'static> {
        LiveEvent::Midi {
            channel: self.channel,
            message: self.message,
        }
    }
}

/// A destination for channel messages, typically an output device.
pub trait MessageSink: Send + Sync {
    /// Delivers a message.
    ///
    /// This is called from the dispatch thread and should not block for long
    /// since it delays all events that follow.
    fn send(&self, message: &ChannelMessage);
}

/// A payload delivering a single channel message.
#[derive(Clone)]
pub struct SendMessage {
    sink: Arc<dyn MessageSink>,
    message: ChannelMessage,
}

impl SendMessage {
    /// Creates a payload sending `message` to `sink`.
    pub fn new(sink: Arc<dyn MessageSink>, message: ChannelMessage) -> Self {
        Self { sink, message }
    }

    /// Returns the message to be sent.
    pub fn message(&self) -> &ChannelMessage {
        &self.message
    }
}

impl Payload for SendMessage {
    fn execute(self: Box<Self>, _cx: &Context) -> Vec<TimedEvent> {
        self.sink.send(&self.message);

        Vec::new()
    }

    fn time_shifted(&self, _delta: f64) -> Box<dyn Payload> {
        Box::new(self.clone())
    }
}

impl fmt::Debug for SendMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendMessage")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// A payload that starts a note and schedules its release.
///
/// On execution the note on message is sent immediately and a [`SendMessage`]
/// event carrying the note off, with a zero release velocity, is returned for
/// `duration` beats later.
#[derive(Clone)]
pub struct NoteOnOff {
    sink: Arc<dyn MessageSink>,
    channel: u4,
    key: u7,
    vel: u7,
    duration: f64,
}

impl NoteOnOff {
    /// Creates a note lasting `duration` beats.
    ///
    /// The duration must be finite and non-negative.
    pub fn new(
        sink: Arc<dyn MessageSink>,
        channel: u4,
        key: u7,
        vel: u7,
        duration: f64,
    ) -> Result<Self, MessageError> {
        if !(duration.is_finite() && duration >= 0.0) {
            return Err(MessageError::InvalidDuration(duration));
        }

        Ok(Self {
            sink,
            channel,
            key,
            vel,
            duration,
        })
    }

    /// Returns the duration of the note in beats.
    pub fn duration(&self) -> f64 {
        self.duration
    }
}

impl Payload for NoteOnOff {
    fn execute(self: Box<Self>, cx: &Context) -> Vec<TimedEvent> {
        let Self {
            sink,
            channel,
            key,
            vel,
            duration,
        } = *self;

        sink.send(&ChannelMessage::note_on(channel, key, vel));

        let note_off = ChannelMessage::note_off(channel, key, u7::from(0));
        let note_off = SendMessage::new(sink, note_off);

        vec![TimedEvent::new(cx.time() + duration, note_off)]
    }

    fn time_shifted(&self, _delta: f64) -> Box<dyn Payload> {
        Box::new(self.clone())
    }
}

impl fmt::Debug for NoteOnOff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoteOnOff")
            .field("channel", &self.channel)
            .field("key", &self.key)
            .field("vel", &self.vel)
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

/// Error returned when a note payload is built with invalid values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MessageError {
    /// The note duration is negative or not finite.
    InvalidDuration(f64),
}

impl fmt::Display for MessageError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDuration(duration) => {
                write!(fmt, "note duration {} is not a finite, non-negative number", duration)
            }
        }
    }
}

impl Error for MessageError {}
