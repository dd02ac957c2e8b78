//! Real-Time Processing Engine.
//!
//! [`create`] splits the engine into its two execution contexts:
//!
//! - [`GraphController`] lives on the control thread. It owns the routing
//!   table, publishes immutable [`GraphSnapshot`](crate::graph::GraphSnapshot)s
//!   and reclaims retired ones.
//! - [`AudioProcessor`] is moved to the audio thread. It renders blocks from
//!   whichever snapshot is current when the block starts.
//!
//! The two sides share only atomics, an `ArcSwap` and the MIDI hand-off.

mod controller;
mod processor;

pub use controller::GraphController;
pub use processor::AudioProcessor;

use crate::config::EngineConfig;
use crate::graph::GraphSnapshot;
use crate::health::{EngineHealth, HealthMonitor};
use crate::lockfree::AtomicFlag;
use crate::Result;
use arc_swap::ArcSwap;
use concerto_midi::{midi_queue, MidiProducer, SampleClock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// State shared between the control and audio threads.
pub(crate) struct EngineShared {
    pub(crate) snapshot: ArcSwap<GraphSnapshot>,
    /// Epoch of the snapshot the audio thread loaded most recently.
    pub(crate) rt_epoch: AtomicU64,
    pub(crate) in_block: AtomicBool,
    pub(crate) halted: AtomicFlag,
    pub(crate) clock: SampleClock,
    pub(crate) health: Arc<EngineHealth>,
}

impl EngineShared {
    /// Whether nothing published before `epoch` can still be in use by the
    /// audio thread.
    #[inline]
    pub(crate) fn quiescent_since(&self, epoch: u64) -> bool {
        !self.in_block.load(Ordering::SeqCst) || self.rt_epoch.load(Ordering::SeqCst) >= epoch
    }
}

/// Everything [`create`] hands out.
pub struct EngineParts {
    pub controller: GraphController,
    pub processor: AudioProcessor,
    pub midi: MidiProducer,
    pub health: Arc<EngineHealth>,
    pub monitor: HealthMonitor,
    pub clock: SampleClock,
}

/// Validates `config` and builds a connected controller / processor pair.
pub fn create(config: &EngineConfig) -> Result<EngineParts> {
    config.validate()?;

    let (health, monitor) = EngineHealth::new(config.monitor_capacity);
    let clock = SampleClock::new();
    let shared = Arc::new(EngineShared {
        snapshot: ArcSwap::from_pointee(GraphSnapshot::empty()),
        rt_epoch: AtomicU64::new(0),
        in_block: AtomicBool::new(false),
        halted: AtomicFlag::new(false),
        clock: clock.clone(),
        health: Arc::clone(&health),
    });
    let (midi, consumer) = midi_queue(config.midi_queue_capacity);

    tracing::debug!(
        sample_rate = config.sample_rate,
        block_size = config.block_size,
        channels = config.channels,
        "Engine created"
    );

    Ok(EngineParts {
        controller: GraphController::new(config.max_nodes, Arc::clone(&shared)),
        processor: AudioProcessor::new(config, shared, consumer),
        midi,
        health,
        monitor,
        clock,
    })
}
