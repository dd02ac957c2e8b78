//! ConcertoEngine that coordinates plugins, routing, MIDI and processing

use crate::{Error, Result};
use concerto_core::{
    AudioBlock, AudioProcessor, CpuLoad, EngineConfig, EngineEvent, EngineHealth, EngineParts,
    GraphController, HealthMonitor, HealthReport, MidiEvent, MidiProducer, NodeRef, PluginId,
    PluginInstance, RoutingEdge, SampleClock,
};
use concerto_midi::Enqueued;
use concerto_plugin::{HostError, PluginHost, PluginInfo, PluginScanner, ScannedPlugin, UnloadMode};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

#[cfg(feature = "device")]
use concerto_core::AudioOutput;

#[cfg(feature = "midi-io")]
use concerto_midi::{HardwareInput, MidiInputDevice};

/// Main engine: the control-thread face of the plugin host.
///
/// Owns the plugin host, the routing controller and the MIDI producer. The
/// [`AudioProcessor`] lives behind [`processor_handle`](Self::processor_handle)
/// so an audio thread (or the `device` stream) can drive it while this side
/// edits the graph.
///
/// # Example
///
/// ```
/// use concerto::prelude::*;
///
/// let mut engine = ConcertoEngine::builder()
///     .block_size(64)
///     .channels(1)
///     .build()?;
///
/// let gain = engine.load_plugin("builtin:gain")?;
/// engine.set_parameter(gain, 0, 0.5)?;
/// engine.connect(NodeRef::Input, gain)?;
/// engine.connect(gain, NodeRef::Output)?;
///
/// let input = AudioBlock::from_channels(&[vec![1.0; 64]]);
/// let mut output = AudioBlock::new(1, 64);
/// engine.process_block(Some(&input), &mut output);
/// assert_eq!(output.channel(0)[0], 0.5);
/// # Ok::<(), concerto::Error>(())
/// ```
pub struct ConcertoEngine {
    config: EngineConfig,
    host: PluginHost,
    controller: GraphController,
    processor: Arc<Mutex<AudioProcessor>>,
    midi: MidiProducer,
    health: Arc<EngineHealth>,
    monitor: HealthMonitor,
    clock: SampleClock,
    scanner: PluginScanner,

    #[cfg(feature = "device")]
    output: Option<AudioOutput>,
    #[cfg(feature = "device")]
    output_device: Option<usize>,

    #[cfg(feature = "midi-io")]
    midi_inputs: Vec<HardwareInput>,
}

impl ConcertoEngine {
    pub fn builder() -> crate::ConcertoEngineBuilder {
        crate::ConcertoEngineBuilder::default()
    }

    pub(crate) fn from_parts(
        config: EngineConfig,
        parts: EngineParts,
        host: PluginHost,
        scanner: PluginScanner,
        #[cfg(feature = "device")] output_device: Option<usize>,
    ) -> Self {
        Self {
            config,
            host,
            controller: parts.controller,
            processor: Arc::new(Mutex::new(parts.processor)),
            midi: parts.midi,
            health: parts.health,
            monitor: parts.monitor,
            clock: parts.clock,
            scanner,

            #[cfg(feature = "device")]
            output: None,
            #[cfg(feature = "device")]
            output_device,

            #[cfg(feature = "midi-io")]
            midi_inputs: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f64 {
        self.config.sample_rate
    }

    pub fn block_size(&self) -> usize {
        self.config.block_size
    }

    pub fn channels(&self) -> usize {
        self.config.channels
    }

    // =========================================================================
    // Plugins
    // =========================================================================

    /// Loads, activates and adds a plugin to the graph (with no edges yet).
    ///
    /// `path` is a plugin library or a `builtin:<name>` identifier. Loading
    /// runs the plugin's own code in this process.
    pub fn load_plugin(&mut self, path: impl AsRef<Path>) -> Result<PluginId> {
        let instance = self.host.load(path)?;
        let id = instance.id();

        let added = instance
            .activate(self.config.sample_rate, self.config.block_size)
            .map_err(Error::from)
            .and_then(|()| self.controller.add_node(instance).map_err(Error::from));

        if let Err(e) = added {
            if let Err(cleanup) = self.host.unload(id, &mut self.controller, UnloadMode::Force) {
                tracing::warn!(plugin = %id, error = %cleanup, "Failed to discard plugin");
            }
            return Err(e);
        }
        Ok(id)
    }

    /// Unloads a plugin that has no edges left. Fails with `PluginInUse`
    /// otherwise.
    pub fn unload_plugin(&mut self, id: PluginId) -> Result<()> {
        self.host.unload(id, &mut self.controller, UnloadMode::Safe)?;
        Ok(())
    }

    /// Removes the plugin's edges, then unloads it.
    pub fn unload_plugin_forced(&mut self, id: PluginId) -> Result<()> {
        self.host.unload(id, &mut self.controller, UnloadMode::Force)?;
        Ok(())
    }

    /// Brings a deactivated plugin back with the engine's sample rate and
    /// block size.
    pub fn activate_plugin(&mut self, id: PluginId) -> Result<()> {
        self.instance(id)?
            .activate(self.config.sample_rate, self.config.block_size)?;
        Ok(())
    }

    /// Deactivates an unrouted plugin, keeping it loaded.
    pub fn deactivate_plugin(&mut self, id: PluginId) -> Result<()> {
        let instance = self.instance(id)?;
        if self.controller.is_referenced(id) {
            return Err(Error::Host(HostError::PluginInUse(id)));
        }
        instance.deactivate()?;
        Ok(())
    }

    /// Returns a failed plugin to service.
    pub fn reset_plugin(&mut self, id: PluginId) -> Result<()> {
        self.instance(id)?.reset()?;
        Ok(())
    }

    pub fn plugins(&self) -> Vec<PluginInfo> {
        self.host.list()
    }

    pub fn plugin(&self, id: PluginId) -> Option<&Arc<PluginInstance>> {
        self.host.get(id)
    }

    /// Plugin libraries found under the configured search paths.
    pub fn scan_plugins(&self) -> Vec<ScannedPlugin> {
        self.scanner.scan()
    }

    fn instance(&self, id: PluginId) -> Result<&Arc<PluginInstance>> {
        self.host
            .get(id)
            .ok_or(Error::Host(HostError::UnknownPlugin(id)))
    }

    // =========================================================================
    // Parameters
    // =========================================================================

    /// Sets a parameter, clamped to its range. Returns the stored value.
    pub fn set_parameter(&self, plugin: PluginId, param: u32, value: f64) -> Result<f64> {
        Ok(self.instance(plugin)?.set_parameter(param, value)?)
    }

    pub fn parameter(&self, plugin: PluginId, param: u32) -> Result<f64> {
        Ok(self.instance(plugin)?.parameter(param)?)
    }

    // =========================================================================
    // Routing
    // =========================================================================

    pub fn connect(&mut self, src: impl Into<NodeRef>, dst: impl Into<NodeRef>) -> Result<()> {
        self.controller.add_edge(src.into(), dst.into())?;
        Ok(())
    }

    /// Connects with a linear gain applied where `dst` sums its inputs.
    pub fn connect_with_gain(
        &mut self,
        src: impl Into<NodeRef>,
        dst: impl Into<NodeRef>,
        gain: f32,
    ) -> Result<()> {
        self.controller
            .add_edge_with_gain(src.into(), dst.into(), gain)?;
        Ok(())
    }

    /// Returns whether the edge existed.
    pub fn disconnect(&mut self, src: impl Into<NodeRef>, dst: impl Into<NodeRef>) -> Result<bool> {
        Ok(self.controller.remove_edge(src.into(), dst.into())?)
    }

    /// Removes every edge touching the plugin. Returns how many were removed.
    pub fn detach_plugin(&mut self, id: PluginId) -> Result<usize> {
        Ok(self.controller.detach(id)?)
    }

    pub fn topological_order(&self) -> Vec<PluginId> {
        self.controller.topological_order()
    }

    pub fn edges(&self) -> Vec<RoutingEdge> {
        self.controller.edges()
    }

    // =========================================================================
    // MIDI
    // =========================================================================

    /// Queues `event` for `target` in the next block, at the event's
    /// `frame_offset`.
    pub fn send_midi(&self, target: PluginId, event: MidiEvent) -> Enqueued {
        let time = self.clock.now() + event.frame_offset as u64;
        self.midi.enqueue(time, target.raw(), event)
    }

    /// Queues `event` at absolute sample `time`.
    pub fn schedule_midi(&self, time: u64, target: PluginId, event: MidiEvent) -> Enqueued {
        self.midi.enqueue(time, target.raw(), event)
    }

    /// Producer handle for MIDI sources on other threads.
    pub fn midi_producer(&self) -> MidiProducer {
        self.midi.clone()
    }

    /// Absolute sample position of the next block.
    pub fn sample_position(&self) -> u64 {
        self.clock.now()
    }

    #[cfg(feature = "midi-io")]
    pub fn list_midi_inputs() -> Result<Vec<MidiInputDevice>> {
        Ok(HardwareInput::list_devices()?)
    }

    /// Routes a hardware MIDI port to `target`. Events land at the start of
    /// the block being rendered when they arrive.
    #[cfg(feature = "midi-io")]
    pub fn connect_midi_input(&mut self, device_index: usize, target: PluginId) -> Result<String> {
        self.instance(target)?;
        let input = HardwareInput::connect(
            device_index,
            self.midi.clone(),
            self.clock.clone(),
            target.raw(),
        )?;
        let name = input.name().to_string();
        self.midi_inputs.push(input);
        Ok(name)
    }

    // =========================================================================
    // Processing
    // =========================================================================

    /// Shared handle to the processor, for driving it from an audio thread.
    pub fn processor_handle(&self) -> Arc<Mutex<AudioProcessor>> {
        Arc::clone(&self.processor)
    }

    /// Renders one block on the calling thread.
    pub fn process_block(&self, input: Option<&AudioBlock>, output: &mut AudioBlock) {
        self.processor.lock().process_block(input, output);
    }

    pub fn process_interleaved(&self, input: Option<&[f32]>, output: &mut [f32]) {
        self.processor
            .lock()
            .process_interleaved(input, output, self.config.channels);
    }

    /// Frees retired snapshots and plugins the audio thread has moved past.
    pub fn reclaim(&mut self) -> usize {
        self.controller.reclaim()
    }

    pub fn pending_reclaim(&self) -> usize {
        self.controller.pending_reclaim()
    }

    // =========================================================================
    // Health
    // =========================================================================

    pub fn health(&self) -> HealthReport {
        self.controller.health_report(self.midi.dropped())
    }

    pub fn cpu_load(&self) -> CpuLoad {
        self.health.cpu().load()
    }

    /// Drains pending monitor events.
    pub fn health_events(&self) -> Vec<EngineEvent> {
        let events = self.monitor.drain();
        for event in &events {
            match event {
                EngineEvent::PluginFailed { plugin, failures } => {
                    tracing::warn!(%plugin, failures, "Plugin failed and is bypassed until reset");
                }
                EngineEvent::DeviceLost { reason } => {
                    tracing::error!(%reason, "Audio device lost");
                }
                _ => {}
            }
        }
        events
    }

    /// A receiver for a dedicated monitoring thread. Events go to whichever
    /// receiver takes them first.
    pub fn monitor(&self) -> HealthMonitor {
        self.monitor.clone()
    }

    pub fn is_halted(&self) -> bool {
        self.controller.is_halted()
    }

    // =========================================================================
    // Device
    // =========================================================================

    /// Opens the output device and starts rendering.
    #[cfg(feature = "device")]
    pub fn start(&mut self) -> Result<()> {
        if self.output.is_some() {
            return Ok(());
        }
        let output = AudioOutput::start(
            &self.config,
            self.output_device,
            Arc::clone(&self.processor),
        )?;
        self.output = Some(output);
        Ok(())
    }

    #[cfg(feature = "device")]
    pub fn stop(&mut self) {
        if self.output.take().is_some() {
            tracing::info!("Audio output stopped");
        }
        self.controller.halt();
    }

    /// Reopens the device after a stream failure. Queued MIDI is discarded.
    #[cfg(feature = "device")]
    pub fn restart(&mut self) -> Result<()> {
        self.stop();
        self.processor.lock().clear_midi();
        self.start()
    }

    #[cfg(feature = "device")]
    pub fn is_running(&self) -> bool {
        self.output.as_ref().is_some_and(|o| !o.is_lost())
    }

    #[cfg(feature = "device")]
    pub fn list_output_devices() -> Result<Vec<String>> {
        Ok(AudioOutput::list_devices()?)
    }

    #[cfg(feature = "device")]
    pub fn output_device_name(&self) -> Option<&str> {
        self.output.as_ref().map(|o| o.device_name())
    }
}

impl Drop for ConcertoEngine {
    fn drop(&mut self) {
        #[cfg(feature = "device")]
        self.stop();
        self.host.shutdown(&mut self.controller);
    }
}
