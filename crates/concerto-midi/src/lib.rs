//! MIDI subsystem for the Concerto plugin host.
//!
//! - [`MidiEvent`]: sample-offset channel-voice event
//! - [`ScheduledEvent`]: event addressed to a plugin at an absolute sample time
//! - [`midi_queue`]: lock-free producer / ordered consumer pair feeding the audio thread
//! - [`SampleClock`]: shared time base for stamping live input
//! - `HardwareInput` (feature `midi-io`): hardware ports via midir
//!
//! # Example
//!
//! ```
//! use concerto_midi::{midi_queue, MidiEvent};
//!
//! let (producer, mut consumer) = midi_queue(256);
//! producer.enqueue(128, 1, MidiEvent::note_on(0, 60, 100));
//! producer.enqueue(64, 1, MidiEvent::note_off(0, 48, 0));
//!
//! let due = consumer.drain(256);
//! assert_eq!(due[0].time, 64);
//! assert_eq!(due[1].time, 128);
//! ```

pub mod error;
pub use error::{Error, Result};

mod event;
pub use event::{MidiEvent, ScheduledEvent};

mod queue;
pub use queue::{midi_queue, Enqueued, MidiConsumer, MidiProducer, DEFAULT_QUEUE_CAPACITY};

mod clock;
pub use clock::SampleClock;

#[cfg(feature = "midi-io")]
mod input;
#[cfg(feature = "midi-io")]
pub use input::{HardwareInput, MidiInputDevice};

pub use midi_msg::{Channel, ChannelVoiceMsg, ControlChange};
