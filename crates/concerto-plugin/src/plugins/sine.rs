use concerto_core::{
    AudioBlock, ParameterInfo, Plugin, PluginCategory, PluginDescriptor, PluginError,
    ProcessError,
};
use concerto_midi::MidiEvent;
use std::f64::consts::TAU;

pub const LEVEL_PARAM: u32 = 0;

/// Monophonic sine voice driven by note-on/off, last note wins.
///
/// Notes start and stop on the exact frame of their event.
pub struct SinePlugin {
    descriptor: PluginDescriptor,
    sample_rate: f64,
    level: f32,
    note: Option<u8>,
    amplitude: f32,
    phase: f64,
    increment: f64,
}

impl SinePlugin {
    pub fn new() -> Self {
        Self {
            descriptor: PluginDescriptor::new("concerto.builtin.sine", "Sine")
                .vendor("Concerto")
                .category(PluginCategory::Instrument)
                .audio_io(0, 2)
                .midi(true)
                .parameter(ParameterInfo::new(LEVEL_PARAM, "level", 0.0, 1.0, 0.5)),
            sample_rate: 44100.0,
            level: 0.5,
            note: None,
            amplitude: 0.0,
            phase: 0.0,
            increment: 0.0,
        }
    }

    fn handle(&mut self, event: &MidiEvent) {
        if let (true, Some(note), Some(velocity)) =
            (event.is_note_on(), event.note(), event.velocity())
        {
            let frequency = 440.0 * 2f64.powf((note as f64 - 69.0) / 12.0);
            self.note = Some(note);
            self.amplitude = velocity as f32 / 127.0;
            self.phase = 0.0;
            self.increment = frequency / self.sample_rate;
        } else if event.is_note_off() && event.note() == self.note {
            self.note = None;
        }
    }

    #[inline]
    fn next_sample(&mut self) -> f32 {
        if self.note.is_none() {
            return 0.0;
        }
        let value = (self.phase * TAU).sin() as f32 * self.amplitude * self.level;
        self.phase = (self.phase + self.increment).fract();
        value
    }
}

impl Default for SinePlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for SinePlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn activate(&mut self, sample_rate: f64, _max_block_size: usize) -> Result<(), PluginError> {
        self.sample_rate = sample_rate;
        self.reset();
        Ok(())
    }

    fn process(
        &mut self,
        _input: &AudioBlock,
        midi: &[MidiEvent],
        output: &mut AudioBlock,
    ) -> Result<(), ProcessError> {
        let mut events = midi.iter().peekable();
        for frame in 0..output.frames() {
            while let Some(event) = events.next_if(|e| e.frame_offset <= frame) {
                self.handle(event);
            }
            let value = self.next_sample();
            for ch in 0..output.channels() {
                output.channel_mut(ch)[frame] = value;
            }
        }
        Ok(())
    }

    fn set_parameter(&mut self, id: u32, value: f64) {
        if id == LEVEL_PARAM {
            self.level = value as f32;
        }
    }

    fn reset(&mut self) {
        self.note = None;
        self.phase = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_note_starts_on_its_frame() {
        let mut plugin = SinePlugin::new();
        plugin.activate(48000.0, 64).unwrap();
        let input = AudioBlock::new(1, 64);
        let mut output = AudioBlock::new(1, 64);

        let midi = [MidiEvent::note_on(0, 69, 127).at(10)];
        plugin.process(&input, &midi, &mut output).unwrap();

        let samples = output.channel(0);
        assert!(samples[..11].iter().all(|&s| s == 0.0));
        assert!(samples[11] > 0.0);
    }

    #[test]
    fn test_note_off_stops_voice() {
        let mut plugin = SinePlugin::new();
        plugin.activate(48000.0, 32).unwrap();
        let input = AudioBlock::new(1, 32);
        let mut output = AudioBlock::new(1, 32);

        let midi = [
            MidiEvent::note_on(0, 60, 100).at(0),
            MidiEvent::note_off(0, 60, 0).at(16),
        ];
        plugin.process(&input, &midi, &mut output).unwrap();
        assert!(output.channel(0)[1..16].iter().any(|&s| s != 0.0));
        assert!(output.channel(0)[16..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_a4_matches_reference_sine() {
        let mut plugin = SinePlugin::new();
        plugin.activate(48000.0, 64).unwrap();
        plugin.set_parameter(LEVEL_PARAM, 1.0);
        let input = AudioBlock::new(1, 64);
        let mut output = AudioBlock::new(1, 64);

        plugin
            .process(&input, &[MidiEvent::note_on(0, 69, 127)], &mut output)
            .unwrap();
        for (k, &sample) in output.channel(0).iter().enumerate() {
            let expected = (TAU * 440.0 * k as f64 / 48000.0).sin() as f32;
            assert_abs_diff_eq!(sample, expected, epsilon = 1e-4);
        }
    }
}
