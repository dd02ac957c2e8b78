//! Real-time plugin host kernel.
//!
//! # Primary API
//!
//! - [`engine::create`]: builds a [`GraphController`] / [`AudioProcessor`] pair
//! - [`PluginInstance`]: lifecycle, parameters and failure tracking for one plugin
//! - [`RoutingTable`]: acyclic routing between `Input`, plugins and `Output`
//! - [`EngineHealth`] / [`HealthMonitor`]: counters and the monitoring event stream
//!
//! # Feature-gated APIs
//!
//! - `"device"`: [`AudioOutput`], a CPAL stream driving the processor
//!
//! # Example
//!
//! ```
//! use concerto_core::{engine, AudioBlock, EngineConfig, NodeRef};
//!
//! let config = EngineConfig { block_size: 64, channels: 1, ..Default::default() };
//! let mut parts = engine::create(&config)?;
//! parts.controller.add_edge(NodeRef::Input, NodeRef::Output)?;
//!
//! let input = AudioBlock::from_channels(&[vec![0.5; 64]]);
//! let mut output = AudioBlock::new(1, 64);
//! parts.processor.process_block(Some(&input), &mut output);
//! assert_eq!(output.channel(0)[0], 0.5);
//! # Ok::<(), concerto_core::Error>(())
//! ```

pub mod error;
pub use error::{Error, PluginError, ProcessError, Result, RoutingError};

pub mod config;
pub use config::EngineConfig;

mod buffer;
pub use buffer::AudioBlock;

pub(crate) mod lockfree;
pub use lockfree::{AtomicDouble, AtomicFlag, AtomicFloat};

pub mod plugin;
pub use plugin::{
    AudioIO, ParameterBank, ParameterInfo, Plugin, PluginCategory, PluginDescriptor, PluginId,
    PluginInstance, PluginState,
};

pub mod graph;
pub use graph::{Feed, FeedSource, GraphSnapshot, NodeRef, RoutingEdge, RoutingTable, ScheduledNode};

pub mod health;
pub use health::{CpuLoad, CpuMeter, EngineEvent, EngineHealth, HealthMonitor, HealthReport};

pub mod engine;
pub use engine::{AudioProcessor, EngineParts, GraphController};

#[cfg(feature = "device")]
mod output;
#[cfg(feature = "device")]
pub use output::AudioOutput;

pub use concerto_midi::{MidiEvent, MidiProducer, SampleClock, ScheduledEvent};
