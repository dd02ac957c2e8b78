//! Plugin Instance Adapter: lifecycle state, parameters and failure tracking
//! around one hosted plugin.

use super::descriptor::PluginDescriptor;
use super::parameter::ParameterBank;
use super::traits::Plugin;
use crate::buffer::AudioBlock;
use crate::error::{PluginError, ProcessError};
use crate::lockfree::AtomicDouble;
use concerto_midi::MidiEvent;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Unique plugin instance identifier, assigned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PluginId(u64);

impl PluginId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plugin#{}", self.0)
    }
}

/// Lifecycle state of a plugin instance.
///
/// ```text
/// Unloaded -> Loaded -> Activated <-> Deactivated -> Unloaded
///                          |  ^
///                          v  | reset
///                         Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PluginState {
    Unloaded = 0,
    Loaded = 1,
    Activated = 2,
    Deactivated = 3,
    Failed = 4,
}

impl PluginState {
    #[inline]
    fn from_u8(value: u8) -> Self {
        match value {
            1 => PluginState::Loaded,
            2 => PluginState::Activated,
            3 => PluginState::Deactivated,
            4 => PluginState::Failed,
            _ => PluginState::Unloaded,
        }
    }
}

/// One loaded plugin, shared between the host, the routing graph and the
/// audio thread.
///
/// State and parameters are atomics, so the audio thread reads them without
/// locking. The plugin object itself sits behind a mutex that the audio
/// thread only ever `try_lock`s: if a control operation holds it, the block
/// fails with [`ProcessError::Busy`] and the engine substitutes silence.
pub struct PluginInstance {
    id: PluginId,
    descriptor: PluginDescriptor,
    state: AtomicU8,
    params: ParameterBank,
    consecutive_failures: AtomicU32,
    total_failures: AtomicU64,
    failure_threshold: u32,
    sample_rate: AtomicDouble,
    max_block_size: AtomicUsize,
    plugin: Mutex<Box<dyn Plugin>>,
}

impl PluginInstance {
    /// Wraps a freshly loaded plugin. The instance starts in
    /// [`PluginState::Loaded`].
    pub fn new(id: PluginId, plugin: Box<dyn Plugin>, failure_threshold: u32) -> Self {
        let descriptor = plugin.descriptor().clone();
        let params = ParameterBank::new(&descriptor.parameters);
        Self {
            id,
            descriptor,
            state: AtomicU8::new(PluginState::Loaded as u8),
            params,
            consecutive_failures: AtomicU32::new(0),
            total_failures: AtomicU64::new(0),
            failure_threshold: failure_threshold.max(1),
            sample_rate: AtomicDouble::new(0.0),
            max_block_size: AtomicUsize::new(0),
            plugin: Mutex::new(plugin),
        }
    }

    #[inline]
    pub fn id(&self) -> PluginId {
        self.id
    }

    pub fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    #[inline]
    pub fn state(&self) -> PluginState {
        PluginState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    fn store_state(&self, state: PluginState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate.get()
    }

    pub fn max_block_size(&self) -> usize {
        self.max_block_size.load(Ordering::Relaxed)
    }

    /// Negotiates sample rate and block size with the plugin.
    ///
    /// Allowed from `Loaded` and `Deactivated`. Activating an already active
    /// instance with the same configuration is a no-op. On failure the state
    /// is left unchanged.
    pub fn activate(&self, sample_rate: f64, max_block_size: usize) -> Result<(), PluginError> {
        let from = self.state();
        match from {
            PluginState::Loaded | PluginState::Deactivated => {}
            PluginState::Activated
                if self.sample_rate.get() == sample_rate
                    && self.max_block_size() == max_block_size =>
            {
                return Ok(());
            }
            _ => return Err(PluginError::InvalidState { from, op: "activate" }),
        }

        if !(sample_rate > 0.0 && sample_rate.is_finite()) || max_block_size == 0 {
            return Err(PluginError::Negotiation(format!(
                "unsupported configuration: {sample_rate} Hz, {max_block_size} frames"
            )));
        }

        let mut plugin = self.plugin.lock();
        plugin.activate(sample_rate, max_block_size)?;

        // Everything goes to the plugin once after (re)negotiation.
        self.params.mark_all_dirty();
        self.params.flush(|id, value| plugin.set_parameter(id, value));

        self.sample_rate.set(sample_rate);
        self.max_block_size.store(max_block_size, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.store_state(PluginState::Activated);
        tracing::info!(
            plugin = %self.id,
            name = %self.descriptor.name,
            sample_rate,
            max_block_size,
            "Plugin activated"
        );
        Ok(())
    }

    /// Calls the plugin's stop hook. Allowed from `Activated` and `Failed`;
    /// deactivating an inactive instance is a no-op.
    pub fn deactivate(&self) -> Result<(), PluginError> {
        let from = self.state();
        match from {
            PluginState::Activated | PluginState::Failed => {
                // Flip the state first so the audio thread stops calling in.
                self.store_state(PluginState::Deactivated);
                self.plugin.lock().deactivate();
                tracing::info!(plugin = %self.id, "Plugin deactivated");
                Ok(())
            }
            PluginState::Deactivated | PluginState::Loaded => Ok(()),
            PluginState::Unloaded => Err(PluginError::InvalidState {
                from,
                op: "deactivate",
            }),
        }
    }

    /// Returns a failed instance to service and clears its DSP state.
    pub fn reset(&self) -> Result<(), PluginError> {
        let from = self.state();
        if !matches!(from, PluginState::Failed | PluginState::Activated) {
            return Err(PluginError::InvalidState { from, op: "reset" });
        }
        self.plugin.lock().reset();
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.store_state(PluginState::Activated);
        if from == PluginState::Failed {
            tracing::info!(plugin = %self.id, "Plugin reset after failure");
        }
        Ok(())
    }

    /// Final transition before the instance is released.
    pub fn mark_unloaded(&self) {
        self.store_state(PluginState::Unloaded);
    }

    /// Stores a parameter value, clamped to its range. The plugin sees it at
    /// the start of its next block.
    pub fn set_parameter(&self, id: u32, value: f64) -> Result<f64, PluginError> {
        self.params
            .set(id, value)
            .ok_or(PluginError::UnknownParameter(id))
    }

    pub fn parameter(&self, id: u32) -> Result<f64, PluginError> {
        self.params.get(id).ok_or(PluginError::UnknownParameter(id))
    }

    pub fn parameters(&self) -> Vec<(u32, f64)> {
        self.params.values()
    }

    /// Renders one block. Audio thread.
    ///
    /// Pending parameter changes are applied first. Plugin faults count
    /// toward the failure threshold; once it is reached the instance moves to
    /// [`PluginState::Failed`] and later calls return `NotActivated`.
    pub fn process(
        &self,
        input: &AudioBlock,
        midi: &[MidiEvent],
        output: &mut AudioBlock,
    ) -> Result<(), ProcessError> {
        self.process_within(input, midi, output, None)
    }

    /// Like [`process`](Self::process), but a call that runs longer than
    /// `deadline` fails with [`ProcessError::Overrun`] and counts toward the
    /// failure threshold like any other plugin fault.
    pub fn process_within(
        &self,
        input: &AudioBlock,
        midi: &[MidiEvent],
        output: &mut AudioBlock,
        deadline: Option<Duration>,
    ) -> Result<(), ProcessError> {
        if self.state() != PluginState::Activated {
            return Err(ProcessError::NotActivated);
        }
        let Some(mut plugin) = self.plugin.try_lock() else {
            return Err(ProcessError::Busy);
        };

        let max = self.max_block_size();
        let frames = output.frames();
        if frames > max {
            return Err(ProcessError::BlockTooLarge { frames, max });
        }

        self.params.flush(|id, value| plugin.set_parameter(id, value));

        let started = Instant::now();
        let result = plugin.process(input, midi, output);
        let result = match (result, deadline) {
            (Ok(()), Some(budget)) => {
                let elapsed = started.elapsed();
                if elapsed > budget {
                    Err(ProcessError::Overrun { elapsed, budget })
                } else {
                    Ok(())
                }
            }
            (result, _) => result,
        };

        match result {
            Ok(()) => {
                self.consecutive_failures.store(0, Ordering::Relaxed);
                Ok(())
            }
            Err(err) => {
                if err.is_plugin_fault() {
                    self.record_failure();
                }
                Err(err)
            }
        }
    }

    /// Counts one failed block. Returns `true` if this failure moved the
    /// instance to `Failed`.
    pub fn record_failure(&self) -> bool {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        let consecutive = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
        if consecutive < self.failure_threshold {
            return false;
        }
        self.state
            .compare_exchange(
                PluginState::Activated as u8,
                PluginState::Failed as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures.load(Ordering::Relaxed)
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }
}

impl fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginInstance")
            .field("id", &self.id)
            .field("name", &self.descriptor.name)
            .field("state", &self.state())
            .field("total_failures", &self.total_failures())
            .finish()
    }
}
