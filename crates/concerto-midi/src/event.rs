//! RT-safe MIDI event types with sample-accurate timing.

use crate::error::{Error, Result};
use midi_msg::{Channel, ChannelVoiceMsg, ControlChange, MidiMsg};

/// Channel-voice MIDI event positioned inside a processing block.
///
/// `frame_offset` is relative to the first sample of the block the event is
/// delivered in and always lies in `[0, block_size)` once the engine hands it
/// to a plugin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MidiEvent {
    pub frame_offset: usize,
    pub channel: Channel,
    pub msg: ChannelVoiceMsg,
}

impl MidiEvent {
    #[inline]
    pub fn new(frame_offset: usize, channel: Channel, msg: ChannelVoiceMsg) -> Self {
        Self {
            frame_offset,
            channel,
            msg,
        }
    }

    #[inline]
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(
            0,
            Channel::from_u8(channel),
            ChannelVoiceMsg::NoteOn { note, velocity },
        )
    }

    #[inline]
    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(
            0,
            Channel::from_u8(channel),
            ChannelVoiceMsg::NoteOff { note, velocity },
        )
    }

    #[inline]
    pub fn control_change(channel: u8, control: u8, value: u8) -> Self {
        Self::new(
            0,
            Channel::from_u8(channel),
            ChannelVoiceMsg::ControlChange {
                control: ControlChange::CC { control, value },
            },
        )
    }

    #[inline]
    pub fn pitch_bend(channel: u8, bend: u16) -> Self {
        Self::new(
            0,
            Channel::from_u8(channel),
            ChannelVoiceMsg::PitchBend { bend },
        )
    }

    #[inline]
    pub fn program_change(channel: u8, program: u8) -> Self {
        Self::new(
            0,
            Channel::from_u8(channel),
            ChannelVoiceMsg::ProgramChange { program },
        )
    }

    /// Same event moved to another offset.
    #[inline]
    pub fn at(mut self, frame_offset: usize) -> Self {
        self.frame_offset = frame_offset;
        self
    }

    #[inline]
    pub fn channel_num(&self) -> u8 {
        self.channel as u8
    }

    #[inline]
    pub fn is_note_on(&self) -> bool {
        matches!(self.msg, ChannelVoiceMsg::NoteOn { velocity, .. } if velocity > 0)
    }

    #[inline]
    pub fn is_note_off(&self) -> bool {
        matches!(
            self.msg,
            ChannelVoiceMsg::NoteOff { .. } | ChannelVoiceMsg::NoteOn { velocity: 0, .. }
        )
    }

    #[inline]
    pub fn note(&self) -> Option<u8> {
        match self.msg {
            ChannelVoiceMsg::NoteOn { note, .. }
            | ChannelVoiceMsg::NoteOff { note, .. }
            | ChannelVoiceMsg::PolyPressure { note, .. } => Some(note),
            _ => None,
        }
    }

    #[inline]
    pub fn velocity(&self) -> Option<u8> {
        match self.msg {
            ChannelVoiceMsg::NoteOn { velocity, .. }
            | ChannelVoiceMsg::NoteOff { velocity, .. } => Some(velocity),
            _ => None,
        }
    }

    /// Packs the event into at most three wire bytes, returning the byte count.
    pub fn to_raw(&self) -> ([u8; 3], usize) {
        let status_channel = self.channel_num() & 0x0F;
        let (status, d1, d2, len) = match self.msg {
            ChannelVoiceMsg::NoteOff { note, velocity } => (0x80, note, velocity, 3),
            ChannelVoiceMsg::NoteOn { note, velocity } => (0x90, note, velocity, 3),
            ChannelVoiceMsg::PolyPressure { note, pressure } => (0xA0, note, pressure, 3),
            ChannelVoiceMsg::ControlChange {
                control: ControlChange::CC { control, value },
            } => (0xB0, control, value, 3),
            ChannelVoiceMsg::ProgramChange { program } => (0xC0, program, 0, 2),
            ChannelVoiceMsg::ChannelPressure { pressure } => (0xD0, pressure, 0, 2),
            ChannelVoiceMsg::PitchBend { bend } => {
                (0xE0, (bend & 0x7F) as u8, ((bend >> 7) & 0x7F) as u8, 3)
            }
            // High-resolution and compound messages have no 3-byte form.
            _ => (0xB0, 0, 0, 0),
        };
        ([status | status_channel, d1 & 0x7F, d2 & 0x7F], len)
    }

    /// Parses one raw message. Anything but a channel-voice message is an
    /// error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (msg, _len) = MidiMsg::from_midi(bytes)?;
        match msg {
            MidiMsg::ChannelVoice { channel, msg } => Ok(Self {
                frame_offset: 0,
                channel,
                msg,
            }),
            other => Err(Error::Parse(format!(
                "expected a channel voice message, got {other:?}"
            ))),
        }
    }
}

/// A MIDI event addressed to a plugin instance at an absolute sample time.
///
/// `time` counts samples since the engine started; the queue orders on it and
/// the engine converts it into a block-relative `frame_offset` on delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduledEvent {
    pub time: u64,
    /// Raw id of the receiving plugin instance.
    pub target: u64,
    pub event: MidiEvent,
}

impl ScheduledEvent {
    #[inline]
    pub fn new(time: u64, target: u64, event: MidiEvent) -> Self {
        Self {
            time,
            target,
            event,
        }
    }

    /// Event positioned relative to a block starting at `block_start`.
    ///
    /// Late events (scheduled before the block) land on frame 0.
    #[inline]
    pub fn in_block(&self, block_start: u64) -> MidiEvent {
        let offset = self.time.saturating_sub(block_start) as usize;
        self.event.at(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on() {
        let event = MidiEvent::note_on(1, 60, 100);
        assert!(event.is_note_on());
        assert!(!event.is_note_off());
        assert_eq!(event.note(), Some(60));
        assert_eq!(event.velocity(), Some(100));
        assert_eq!(event.channel_num(), 1);
    }

    #[test]
    fn test_note_on_zero_velocity_is_note_off() {
        let event = MidiEvent::note_on(0, 60, 0);
        assert!(!event.is_note_on());
        assert!(event.is_note_off());
    }

    #[test]
    fn test_raw_bytes() {
        let (bytes, len) = MidiEvent::note_on(2, 64, 90).to_raw();
        assert_eq!(len, 3);
        assert_eq!(bytes, [0x92, 64, 90]);

        let (bytes, len) = MidiEvent::program_change(0, 5).to_raw();
        assert_eq!(len, 2);
        assert_eq!(&bytes[..2], &[0xC0, 5]);
    }

    #[test]
    fn test_from_bytes() {
        assert!(matches!(
            MidiEvent::from_bytes(&[0xF8]),
            Err(Error::Parse(_))
        ));
        assert!(matches!(MidiEvent::from_bytes(&[]), Err(Error::Parse(_))));
        let event = MidiEvent::from_bytes(&[0x90, 60, 100]).unwrap();
        assert!(event.is_note_on());
        assert_eq!(event.note(), Some(60));
        assert_eq!(event.frame_offset, 0);
    }

    #[test]
    fn test_in_block_offsets() {
        let scheduled = ScheduledEvent::new(1_030, 7, MidiEvent::note_on(0, 60, 100));
        assert_eq!(scheduled.in_block(1_024).frame_offset, 6);
        // Late event clamps to the first frame.
        assert_eq!(scheduled.in_block(2_048).frame_offset, 0);
    }
}
