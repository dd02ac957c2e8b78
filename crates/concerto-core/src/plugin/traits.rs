use super::descriptor::PluginDescriptor;
use crate::buffer::AudioBlock;
use crate::error::{PluginError, ProcessError};
use concerto_midi::MidiEvent;

/// Capability set every hosted plugin provides, whatever its binary format.
///
/// `process` is called on the audio thread. Implementations must not
/// allocate, lock or block there; size everything in `activate`.
pub trait Plugin: Send {
    fn descriptor(&self) -> &PluginDescriptor;

    /// Prepare for processing at `sample_rate` with blocks of at most
    /// `max_block_size` frames.
    fn activate(&mut self, sample_rate: f64, max_block_size: usize) -> Result<(), PluginError>;

    /// Render one block. `midi` is sorted by `frame_offset`, and every offset
    /// is below `output.frames()`.
    fn process(
        &mut self,
        input: &AudioBlock,
        midi: &[MidiEvent],
        output: &mut AudioBlock,
    ) -> Result<(), ProcessError>;

    /// Apply a parameter value. Values arrive already clamped to the
    /// parameter's range.
    fn set_parameter(&mut self, id: u32, value: f64);

    /// Stop hook, called before the instance is released or re-negotiated.
    fn deactivate(&mut self) {}

    /// Clear internal DSP state (delay lines, voices).
    fn reset(&mut self) {}

    fn latency_samples(&self) -> usize {
        self.descriptor().latency_samples
    }
}
