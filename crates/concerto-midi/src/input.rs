//! Hardware MIDI input feeding the engine's MIDI queue.

use crate::clock::SampleClock;
use crate::error::{Error, Result};
use crate::queue::{Enqueued, MidiProducer};
use crate::MidiEvent;
use midir::{MidiInput, MidiInputConnection};
use tracing::{debug, info};

/// Information about an available MIDI input device
#[derive(Debug, Clone)]
pub struct MidiInputDevice {
    /// Device index (for connection)
    pub index: usize,
    /// Device name
    pub name: String,
}

/// Open connection from a hardware port into the queue.
///
/// Every channel-voice message is stamped with the clock's current position
/// and addressed to `target`. Dropping the value closes the port.
pub struct HardwareInput {
    name: String,
    _connection: MidiInputConnection<()>,
}

impl HardwareInput {
    pub fn list_devices() -> Result<Vec<MidiInputDevice>> {
        let midi_input = MidiInput::new("concerto-device-list")?;
        let devices = midi_input
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| MidiInputDevice {
                index,
                name: midi_input
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Unknown Device {index}")),
            })
            .collect();
        Ok(devices)
    }

    pub fn connect(
        device_index: usize,
        producer: MidiProducer,
        clock: SampleClock,
        target: u64,
    ) -> Result<Self> {
        let midi_input = MidiInput::new("concerto-midi-input")?;
        let ports = midi_input.ports();
        let port = ports
            .get(device_index)
            .ok_or_else(|| Error::MidiDevice(format!("MIDI device {device_index} not found")))?;

        let name = midi_input
            .port_name(port)
            .unwrap_or_else(|_| format!("Device {device_index}"));

        let connection = midi_input.connect(
            port,
            "concerto-input",
            move |_timestamp, message, _| match MidiEvent::from_bytes(message) {
                Ok(event) => {
                    if producer.enqueue(clock.now(), target, event) == Enqueued::DroppedOldest {
                        debug!("MIDI queue full, dropped oldest pending event");
                    }
                }
                Err(e) => debug!("Ignoring MIDI message: {:?}", e),
            },
            (),
        )?;

        info!(device = %name, target, "Connected MIDI input");
        Ok(Self {
            name,
            _connection: connection,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
