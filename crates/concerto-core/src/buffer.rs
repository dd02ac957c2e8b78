//! Fixed-capacity planar audio buffers.

/// Multi-channel block of samples, stored planar.
///
/// Storage is sized once for `max_frames`; changing the active frame count
/// with [`set_frames`](Self::set_frames) never reallocates, so blocks can be
/// reused on the audio thread.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBlock {
    data: Vec<f32>,
    channels: usize,
    frames: usize,
    max_frames: usize,
}

impl AudioBlock {
    pub fn new(channels: usize, max_frames: usize) -> Self {
        Self {
            data: vec![0.0; channels * max_frames],
            channels,
            frames: max_frames,
            max_frames,
        }
    }

    /// Builds a block from per-channel sample vectors of equal length.
    ///
    /// # Panics
    /// Panics if the channels differ in length.
    pub fn from_channels(channels: &[Vec<f32>]) -> Self {
        let frames = channels.first().map_or(0, Vec::len);
        let mut block = Self::new(channels.len(), frames);
        for (index, samples) in channels.iter().enumerate() {
            assert_eq!(samples.len(), frames, "channel {index} length mismatch");
            block.channel_mut(index).copy_from_slice(samples);
        }
        block
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Active frame count.
    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    #[inline]
    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    /// Sets the active frame count, clamped to the allocated capacity.
    #[inline]
    pub fn set_frames(&mut self, frames: usize) -> usize {
        self.frames = frames.min(self.max_frames);
        self.frames
    }

    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        let start = index * self.max_frames;
        &self.data[start..start + self.frames]
    }

    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        let start = index * self.max_frames;
        &mut self.data[start..start + self.frames]
    }

    /// All channels at once, as disjoint mutable slices.
    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut [f32]> + '_ {
        let frames = self.frames;
        self.data
            .chunks_mut(self.max_frames.max(1))
            .take(self.channels)
            .map(move |plane| &mut plane[..frames])
    }

    /// Zeroes the active frames of every channel.
    #[inline]
    pub fn clear(&mut self) {
        for ch in 0..self.channels {
            self.channel_mut(ch).fill(0.0);
        }
    }

    /// Copies `other` into `self`. Missing channels are left silent.
    pub fn copy_from(&mut self, other: &AudioBlock) {
        self.clear();
        self.add_from(other, 1.0);
    }

    /// Mixes `other * gain` into `self`.
    ///
    /// Channels beyond the shorter of the two blocks are ignored.
    pub fn add_from(&mut self, other: &AudioBlock, gain: f32) {
        let channels = self.channels.min(other.channels);
        let frames = self.frames.min(other.frames);
        for ch in 0..channels {
            let src = &other.channel(ch)[..frames];
            let dst = &mut self.channel_mut(ch)[..frames];
            for (d, s) in dst.iter_mut().zip(src) {
                *d += s * gain;
            }
        }
    }

    pub fn scale(&mut self, gain: f32) {
        for ch in 0..self.channels {
            for sample in self.channel_mut(ch) {
                *sample *= gain;
            }
        }
    }

    pub fn is_silent(&self) -> bool {
        (0..self.channels).all(|ch| self.channel(ch).iter().all(|&s| s == 0.0))
    }

    /// Loads interleaved samples, returning the number of frames read.
    pub fn read_interleaved(&mut self, input: &[f32], input_channels: usize) -> usize {
        if input_channels == 0 {
            return 0;
        }
        let frames = self.set_frames(input.len() / input_channels);
        for ch in 0..self.channels {
            let max_frames = self.max_frames;
            let dst = &mut self.data[ch * max_frames..ch * max_frames + frames];
            if ch < input_channels {
                for (frame, d) in dst.iter_mut().enumerate() {
                    *d = input[frame * input_channels + ch];
                }
            } else {
                dst.fill(0.0);
            }
        }
        frames
    }

    /// Writes the active frames into an interleaved buffer.
    ///
    /// Output channels this block does not have are written as silence.
    pub fn write_interleaved(&self, output: &mut [f32], output_channels: usize) {
        if output_channels == 0 {
            return;
        }
        let frames = self.frames.min(output.len() / output_channels);
        for frame in 0..frames {
            for ch in 0..output_channels {
                output[frame * output_channels + ch] = if ch < self.channels {
                    self.data[ch * self.max_frames + frame]
                } else {
                    0.0
                };
            }
        }
    }
}
