use concerto_core::{
    AudioBlock, ParameterInfo, Plugin, PluginCategory, PluginDescriptor, PluginError,
    ProcessError,
};
use concerto_midi::MidiEvent;

pub const GAIN_PARAM: u32 = 0;

/// Linear gain. Unity pass-through at the default setting.
pub struct GainPlugin {
    descriptor: PluginDescriptor,
    gain: f32,
}

impl GainPlugin {
    pub fn new() -> Self {
        Self {
            descriptor: PluginDescriptor::new("concerto.builtin.gain", "Gain")
                .vendor("Concerto")
                .category(PluginCategory::Utility)
                .parameter(ParameterInfo::new(GAIN_PARAM, "gain", 0.0, 4.0, 1.0)),
            gain: 1.0,
        }
    }
}

impl Default for GainPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for GainPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn activate(&mut self, _sample_rate: f64, _max_block_size: usize) -> Result<(), PluginError> {
        Ok(())
    }

    fn process(
        &mut self,
        input: &AudioBlock,
        _midi: &[MidiEvent],
        output: &mut AudioBlock,
    ) -> Result<(), ProcessError> {
        output.clear();
        output.add_from(input, self.gain);
        Ok(())
    }

    fn set_parameter(&mut self, id: u32, value: f64) {
        if id == GAIN_PARAM {
            self.gain = value as f32;
        }
    }
}
