//! Engine health counters, CPU metering and the monitoring event stream.
//!
//! The audio thread only touches atomics and a bounded channel here; the
//! control side reads counters and drains events at its own pace.

use crate::error::ProcessError;
use crate::lockfree::AtomicFloat;
use crate::plugin::{PluginId, PluginInstance};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Something the control layer should know about, reported asynchronously.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A plugin's process call failed; its output was replaced by silence.
    ProcessError {
        plugin: PluginId,
        error: ProcessError,
        sample_time: u64,
    },
    /// A plugin took longer than its share of the block.
    PluginOverrun {
        plugin: PluginId,
        elapsed: Duration,
        budget: Duration,
    },
    /// The plugin hit its failure threshold and is bypassed until reset.
    PluginFailed { plugin: PluginId, failures: u64 },
    /// The whole block took longer than its real-time duration.
    BlockOverrun { sample_time: u64, load: f32 },
    /// The audio device stopped. Processing is halted until restarted.
    DeviceLost { reason: String },
}

/// Per-block CPU load, as a fraction of the block's real-time duration.
pub struct CpuMeter {
    current: AtomicFloat,
    peak: AtomicFloat,
    average: AtomicFloat,
    samples: AtomicU32,
}

impl CpuMeter {
    pub fn new() -> Self {
        Self {
            current: AtomicFloat::new(0.0),
            peak: AtomicFloat::new(0.0),
            average: AtomicFloat::new(0.0),
            samples: AtomicU32::new(0),
        }
    }

    /// Records one block. Returns the load, where `1.0` is the full budget.
    pub fn record(&self, elapsed: Duration, budget: Duration) -> f32 {
        let load = if budget.is_zero() {
            0.0
        } else {
            (elapsed.as_secs_f64() / budget.as_secs_f64()) as f32
        };
        self.current.set(load);
        if load > self.peak.get() {
            self.peak.set(load);
        }

        // Exponential moving average
        let count = self.samples.fetch_add(1, Ordering::Relaxed);
        let alpha = 1.0 / (count.min(100) + 1) as f32;
        let avg = self.average.get();
        self.average.set(avg * (1.0 - alpha) + load * alpha);
        load
    }

    pub fn load(&self) -> CpuLoad {
        CpuLoad {
            current: self.current.get(),
            average: self.average.get(),
            peak: self.peak.get(),
        }
    }

    pub fn reset(&self) {
        self.current.set(0.0);
        self.peak.set(0.0);
        self.average.set(0.0);
        self.samples.store(0, Ordering::Relaxed);
    }
}

impl Default for CpuMeter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuLoad {
    pub current: f32,
    pub average: f32,
    pub peak: f32,
}

/// Point-in-time copy of every health counter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthReport {
    pub xruns: u64,
    pub dropped_midi: u64,
    pub process_errors: u64,
    pub plugin_overruns: u64,
    /// Monitor events discarded because nobody drained the channel.
    pub dropped_events: u64,
    /// Total failed blocks per plugin currently in the graph.
    pub plugin_failures: Vec<(PluginId, u64)>,
    pub cpu: CpuLoad,
}

/// Shared counters written by the audio thread.
pub struct EngineHealth {
    xruns: AtomicU64,
    process_errors: AtomicU64,
    plugin_overruns: AtomicU64,
    dropped_events: AtomicU64,
    cpu: CpuMeter,
    events: Sender<EngineEvent>,
}

impl EngineHealth {
    /// Creates the counters and the receiving end of the event stream.
    pub fn new(event_capacity: usize) -> (Arc<Self>, HealthMonitor) {
        let (tx, rx) = bounded(event_capacity.max(1));
        let health = Arc::new(Self {
            xruns: AtomicU64::new(0),
            process_errors: AtomicU64::new(0),
            plugin_overruns: AtomicU64::new(0),
            dropped_events: AtomicU64::new(0),
            cpu: CpuMeter::new(),
            events: tx,
        });
        (health, HealthMonitor { events: rx })
    }

    /// Queues an event without blocking. Counts it as dropped if the channel
    /// is full.
    #[inline]
    pub fn emit(&self, event: EngineEvent) {
        if self.events.try_send(event).is_err() {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_process_error(&self, plugin: PluginId, error: ProcessError, sample_time: u64) {
        self.process_errors.fetch_add(1, Ordering::Relaxed);
        self.emit(EngineEvent::ProcessError {
            plugin,
            error,
            sample_time,
        });
    }

    #[inline]
    pub fn record_plugin_overrun(&self, plugin: PluginId, elapsed: Duration, budget: Duration) {
        self.plugin_overruns.fetch_add(1, Ordering::Relaxed);
        self.emit(EngineEvent::PluginOverrun {
            plugin,
            elapsed,
            budget,
        });
    }

    /// Feeds the CPU meter; a block slower than real time counts as an xrun.
    #[inline]
    pub fn record_block(&self, elapsed: Duration, budget: Duration, sample_time: u64) {
        let load = self.cpu.record(elapsed, budget);
        if elapsed > budget {
            self.record_xrun();
            self.emit(EngineEvent::BlockOverrun { sample_time, load });
        }
    }

    #[inline]
    pub fn record_xrun(&self) {
        self.xruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn xruns(&self) -> u64 {
        self.xruns.load(Ordering::Relaxed)
    }

    pub fn process_errors(&self) -> u64 {
        self.process_errors.load(Ordering::Relaxed)
    }

    pub fn plugin_overruns(&self) -> u64 {
        self.plugin_overruns.load(Ordering::Relaxed)
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    pub fn cpu(&self) -> &CpuMeter {
        &self.cpu
    }

    pub fn report<'a>(
        &self,
        dropped_midi: u64,
        instances: impl IntoIterator<Item = &'a Arc<PluginInstance>>,
    ) -> HealthReport {
        HealthReport {
            xruns: self.xruns(),
            dropped_midi,
            process_errors: self.process_errors(),
            plugin_overruns: self.plugin_overruns(),
            dropped_events: self.dropped_events(),
            plugin_failures: instances
                .into_iter()
                .map(|i| (i.id(), i.total_failures()))
                .collect(),
            cpu: self.cpu.load(),
        }
    }
}

/// Receiving end of the engine's event stream. Cloneable; each event goes to
/// one receiver.
#[derive(Clone)]
pub struct HealthMonitor {
    events: Receiver<EngineEvent>,
}

impl HealthMonitor {
    pub fn try_next(&self) -> Option<EngineEvent> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn next_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.events.recv_timeout(timeout).ok()
    }

    /// Everything queued right now.
    pub fn drain(&self) -> Vec<EngineEvent> {
        self.events.try_iter().collect()
    }
}
