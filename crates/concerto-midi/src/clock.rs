//! Shared sample clock used to timestamp MIDI input.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Absolute sample position of the block the audio thread is about to render.
///
/// The audio thread is the only writer; input threads read it to stamp
/// incoming events so they land in the next block.
#[derive(Clone, Debug, Default)]
pub struct SampleClock {
    position: Arc<AtomicU64>,
}

impl SampleClock {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn now(&self) -> u64 {
        self.position.load(Ordering::Acquire)
    }

    /// Moves the clock forward by `frames`. Audio thread only.
    #[inline]
    pub fn advance(&self, frames: u64) -> u64 {
        self.position.fetch_add(frames, Ordering::AcqRel) + frames
    }

    #[inline]
    pub fn set(&self, position: u64) {
        self.position.store(position, Ordering::Release);
    }
}
