//! # Concerto - Real-time Plugin Host Engine
//!
//! Loads audio/MIDI plugins, routes audio between them through an acyclic
//! graph, delivers MIDI at sample-accurate offsets and renders fixed-size
//! blocks without locking or allocating on the audio thread.
//!
//! ## Architecture
//!
//! Concerto is an umbrella crate that coordinates:
//! - **concerto-midi** - MIDI events and the lock-free MIDI event queue
//! - **concerto-core** - Plugin adapter, routing graph, block processor, health counters
//! - **concerto-plugin** - Plugin host manager, loaders, discovery, built-in plugins
//!
//! ## Quick Start
//!
//! ```
//! use concerto::prelude::*;
//!
//! let mut engine = ConcertoEngine::builder()
//!     .sample_rate(48000.0)
//!     .block_size(128)
//!     .build()?;
//!
//! let synth = engine.load_plugin("builtin:sine")?;
//! engine.connect(synth, NodeRef::Output)?;
//! engine.send_midi(synth, MidiEvent::note_on(0, 69, 100).at(16));
//!
//! let mut output = AudioBlock::new(2, 128);
//! engine.process_block(None, &mut output);
//! assert_eq!(output.channel(0)[0], 0.0);
//! assert!(!output.is_silent());
//! # Ok::<(), concerto::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `device` - Audio output through CPAL
//! - `midi-io` - Hardware MIDI input through midir
//! - `full` - Everything enabled

/// Re-export of concerto-core for direct access
pub use concerto_core as core;

/// Re-export of concerto-midi
pub use concerto_midi as midi;

/// Re-export of concerto-plugin
pub use concerto_plugin as plugin;

pub use concerto_core::{
    AudioBlock, AudioIO, CpuLoad, EngineConfig, EngineEvent, HealthMonitor, HealthReport,
    MidiEvent, MidiProducer, NodeRef, ParameterInfo, Plugin, PluginCategory, PluginDescriptor,
    PluginError, PluginId, PluginInstance, PluginState, ProcessError, RoutingEdge, RoutingError,
};

pub use concerto_midi::Enqueued;

pub use concerto_plugin::{
    HostError, PluginInfo, PluginLoadError, PluginLoader, PluginScanner, ScannedPlugin,
};

mod error;
pub use error::{Error, Result};

mod builder;
mod engine;

pub use builder::ConcertoEngineBuilder;
pub use engine::ConcertoEngine;

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{ConcertoEngine, ConcertoEngineBuilder};

    pub use crate::core::{AudioBlock, EngineConfig, NodeRef, PluginId, PluginState};

    pub use crate::core::{Plugin, PluginDescriptor, ProcessError};

    pub use crate::midi::MidiEvent;

    pub use crate::core::{EngineEvent, HealthReport};
}
