//! Plugin metadata exposed by every plugin regardless of format.

use serde::{Deserialize, Serialize};

/// Plugin category for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PluginCategory {
    Instrument,
    Effect,
    Analyzer,
    Utility,
    #[default]
    Other,
}

/// Audio I/O configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioIO {
    /// Number of audio input channels
    pub inputs: usize,
    /// Number of audio output channels
    pub outputs: usize,
}

impl AudioIO {
    /// Stereo in, stereo out
    pub fn stereo() -> Self {
        Self {
            inputs: 2,
            outputs: 2,
        }
    }
}

/// Describes one automatable parameter. Values are plain (not normalized).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub id: u32,
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub default: f64,
    pub automatable: bool,
}

impl ParameterInfo {
    /// `default` is clamped into `min..=max` when that range is well formed.
    pub fn new(id: u32, name: impl Into<String>, min: f64, max: f64, default: f64) -> Self {
        let default = if min <= max {
            default.clamp(min, max)
        } else {
            default
        };
        Self {
            id,
            name: name.into(),
            min,
            max,
            default,
            automatable: true,
        }
    }

    #[inline]
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Unique plugin ID (reverse-domain style)
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Vendor/author name
    pub vendor: String,

    /// Version string
    pub version: String,

    pub category: PluginCategory,

    /// Audio I/O configuration
    pub audio_io: AudioIO,

    /// Does this plugin receive MIDI?
    pub receives_midi: bool,

    /// Plugin latency in samples
    pub latency_samples: usize,

    pub parameters: Vec<ParameterInfo>,
}

impl PluginDescriptor {
    /// Create new metadata with required fields
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            vendor: String::new(),
            version: "1.0.0".to_string(),
            category: PluginCategory::Other,
            audio_io: AudioIO::stereo(),
            receives_midi: false,
            latency_samples: 0,
            parameters: Vec::new(),
        }
    }

    pub fn vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn category(mut self, category: PluginCategory) -> Self {
        self.category = category;
        self
    }

    pub fn audio_io(mut self, inputs: usize, outputs: usize) -> Self {
        self.audio_io = AudioIO { inputs, outputs };
        self
    }

    pub fn midi(mut self, receives_midi: bool) -> Self {
        self.receives_midi = receives_midi;
        self
    }

    pub fn latency(mut self, samples: usize) -> Self {
        self.latency_samples = samples;
        self
    }

    pub fn parameter(mut self, info: ParameterInfo) -> Self {
        self.parameters.push(info);
        self
    }

    pub fn find_parameter(&self, id: u32) -> Option<&ParameterInfo> {
        self.parameters.iter().find(|p| p.id == id)
    }
}
