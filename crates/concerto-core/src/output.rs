//! CPAL audio output driving an [`AudioProcessor`].

use crate::config::EngineConfig;
use crate::engine::{AudioProcessor, EngineShared};
use crate::health::EngineEvent;
use crate::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use std::sync::Arc;

/// Wrapper to hold a `cpal::Stream` in a `Send` context.
///
/// `cpal::Stream` is `!Send` due to platform internals. The handle is only
/// reachable through the owning engine's mutex and is dropped there.
struct StreamHandle(#[allow(dead_code)] cpal::Stream);

// SAFETY: see `StreamHandle`; never accessed concurrently.
unsafe impl Send for StreamHandle {}

/// A running output stream.
///
/// A stream error halts processing and reports
/// [`EngineEvent::DeviceLost`]. The stream is not reopened automatically;
/// drop this value and start a new one.
pub struct AudioOutput {
    device_name: String,
    channels: usize,
    shared: Arc<EngineShared>,
    _stream: StreamHandle,
}

impl AudioOutput {
    pub fn start(
        config: &EngineConfig,
        device_index: Option<usize>,
        processor: Arc<Mutex<AudioProcessor>>,
    ) -> Result<Self> {
        let device = get_device(device_index)?;
        let device_name = device.name()?;
        let default_config = device.default_output_config()?;
        let shared = processor.lock().shared();

        let stream_config = cpal::StreamConfig {
            channels: config.channels as cpal::ChannelCount,
            sample_rate: cpal::SampleRate(config.sample_rate as u32),
            buffer_size: cpal::BufferSize::Fixed(config.block_size as cpal::FrameCount),
        };

        let stream = match default_config.sample_format() {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &stream_config, &processor, &shared)?
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&device, &stream_config, &processor, &shared)?
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&device, &stream_config, &processor, &shared)?
            }
            format => {
                return Err(Error::InvalidConfig(format!(
                    "Unsupported sample format: {format:?}"
                )));
            }
        };
        stream.play()?;

        shared.halted.set(false);
        tracing::info!(
            device = %device_name,
            sample_rate = config.sample_rate,
            block_size = config.block_size,
            "Audio output started"
        );

        Ok(Self {
            device_name,
            channels: config.channels,
            shared,
            _stream: StreamHandle(stream),
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Whether the stream has failed and processing is halted.
    pub fn is_lost(&self) -> bool {
        self.shared.halted.get()
    }

    /// List available output devices.
    pub fn list_devices() -> Result<Vec<String>> {
        cpal::default_host()
            .output_devices()?
            .enumerate()
            .map(|(i, d)| Ok(format!("{i}: {}", d.name()?)))
            .collect()
    }
}

fn get_device(index: Option<usize>) -> Result<cpal::Device> {
    let host = cpal::default_host();

    match index {
        Some(i) => {
            let devices: Vec<_> = host.output_devices()?.collect();
            let count = devices.len();
            devices.into_iter().nth(i).ok_or_else(|| {
                Error::InvalidDevice(format!("Device index {i} out of range ({count} available)"))
            })
        }
        None => host
            .default_output_device()
            .ok_or_else(|| Error::InvalidDevice("No output device available".into())),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    processor: &Arc<Mutex<AudioProcessor>>,
    shared: &Arc<EngineShared>,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;
    let block_size = match config.buffer_size {
        cpal::BufferSize::Fixed(frames) => frames as usize,
        cpal::BufferSize::Default => 0,
    };

    // Sized for the negotiated block; grows once if the device hands out more.
    let mut scratch = vec![0.0f32; block_size * channels];
    let processor = Arc::clone(processor);
    let rt_shared = Arc::clone(shared);
    let err_shared = Arc::clone(shared);

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                if scratch.len() < data.len() {
                    scratch.resize(data.len(), 0.0);
                }
                let buffer = &mut scratch[..data.len()];

                match processor.try_lock() {
                    Some(mut processor) => processor.process_interleaved(None, buffer, channels),
                    None => {
                        buffer.fill(0.0);
                        rt_shared.health.record_xrun();
                    }
                }

                for (sample, value) in data.iter_mut().zip(buffer.iter()) {
                    *sample = T::from_sample(*value);
                }
            }));

            if result.is_err() {
                for sample in data.iter_mut() {
                    *sample = T::from_sample(0.0);
                }
            }
        },
        move |err| {
            err_shared.halted.set(true);
            err_shared.health.emit(EngineEvent::DeviceLost {
                reason: err.to_string(),
            });
        },
        None,
    )?;

    Ok(stream)
}
