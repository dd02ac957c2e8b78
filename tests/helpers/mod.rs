//! Test helpers and fixtures for Concerto integration tests
//!
//! Engines here never open an audio device; tests drive the processor one
//! block at a time.
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Exact operations (passthrough, unity gain)
//! - `DSP_EPSILON` (1e-4): Oscillators
//! - `SILENCE_THRESHOLD` (0.0001): Silence detection (-80dB)

#![allow(dead_code)]

pub mod tolerances;

use concerto::prelude::*;
use concerto::{PluginError, ProcessError};
use tracing_subscriber::EnvFilter;

/// Default test sample rate (matches common hardware)
pub const TEST_SAMPLE_RATE: f64 = 48000.0;

/// Small block so sample offsets are easy to reason about.
pub const TEST_BLOCK_SIZE: usize = 64;

/// Mono engine with the per-plugin deadline off, so results never depend on
/// machine load.
pub fn test_engine() -> ConcertoEngine {
    test_builder()
        .build()
        .expect("Failed to create test engine")
}

/// Routes engine logs to the test output. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn test_builder() -> ConcertoEngineBuilder {
    init_tracing();
    ConcertoEngine::builder()
        .sample_rate(TEST_SAMPLE_RATE)
        .block_size(TEST_BLOCK_SIZE)
        .channels(1)
        .process_budget(None)
        .builtin("broken", || Ok(Box::new(BrokenPlugin::new()) as Box<dyn Plugin>))
}

/// Renders one block from a mono input signal and returns the output channel.
pub fn render(engine: &ConcertoEngine, input: &[f32]) -> Vec<f32> {
    let input = AudioBlock::from_channels(&[input.to_vec()]);
    let mut output = AudioBlock::new(1, input.frames());
    engine.process_block(Some(&input), &mut output);
    output.channel(0).to_vec()
}

/// Renders one block with no input.
pub fn render_silence_in(engine: &ConcertoEngine) -> Vec<f32> {
    let mut output = AudioBlock::new(engine.channels(), engine.block_size());
    engine.process_block(None, &mut output);
    output.channel(0).to_vec()
}

/// Repeating {1.0, -1.0, 0.5, -0.5} pattern.
pub fn test_signal(len: usize) -> Vec<f32> {
    [1.0, -1.0, 0.5, -0.5].iter().copied().cycle().take(len).collect()
}

/// Calculate peak amplitude of a signal.
pub fn peak(samples: &[f32]) -> f32 {
    samples
        .iter()
        .map(|s| s.abs())
        .fold(0.0_f32, |a, b| a.max(b))
}

pub fn is_silent(samples: &[f32]) -> bool {
    peak(samples) < tolerances::SILENCE_THRESHOLD
}

/// Assert two signals are equal sample by sample within `epsilon`.
pub fn assert_signals_eq(actual: &[f32], expected: &[f32], epsilon: f32) {
    assert_eq!(actual.len(), expected.len(), "signal length mismatch");
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() <= epsilon,
            "sample {i}: got {a}, expected {e} (epsilon {epsilon})"
        );
    }
}

/// Fails every block with a plugin error code.
pub struct BrokenPlugin {
    descriptor: PluginDescriptor,
}

impl BrokenPlugin {
    pub fn new() -> Self {
        Self {
            descriptor: PluginDescriptor::new("test.broken", "Broken"),
        }
    }
}

impl Plugin for BrokenPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn activate(&mut self, _: f64, _: usize) -> Result<(), PluginError> {
        Ok(())
    }

    fn process(
        &mut self,
        _: &AudioBlock,
        _: &[MidiEvent],
        output: &mut AudioBlock,
    ) -> Result<(), ProcessError> {
        // Garbage the engine must not let through.
        for sample in output.channel_mut(0) {
            *sample = 1.0;
        }
        Err(ProcessError::Plugin { code: -1 })
    }

    fn set_parameter(&mut self, _: u32, _: f64) {}
}
