use super::EngineShared;
use crate::buffer::AudioBlock;
use crate::config::EngineConfig;
use crate::error::ProcessError;
use crate::graph::{FeedSource, GraphSnapshot};
use crate::health::EngineEvent;
use crate::plugin::PluginState;
use concerto_midi::{MidiConsumer, MidiEvent, ScheduledEvent};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Preallocated working set for one block.
struct Renderer {
    shared: Arc<EngineShared>,
    midi: MidiConsumer,
    due: Vec<ScheduledEvent>,
    node_midi: Vec<MidiEvent>,
    node_outputs: Vec<AudioBlock>,
    input: AudioBlock,
    scratch: AudioBlock,
    block_size: usize,
    sample_rate: f64,
    plugin_budget: Option<f64>,
}

/// Audio-thread side of the engine.
///
/// Each block: take the current graph snapshot, drain due MIDI, run every
/// node in topological order, then sum the output feeds. A node that fails,
/// is not active, or runs past its deadline contributes silence for the
/// block; the failure goes to the health counters and monitor stream.
///
/// All buffers are sized up front from [`EngineConfig`]. Nothing in the block
/// path locks, allocates or frees.
pub struct AudioProcessor {
    renderer: Renderer,
    device_in: AudioBlock,
    device_out: AudioBlock,
}

impl AudioProcessor {
    pub(crate) fn new(config: &EngineConfig, shared: Arc<EngineShared>, midi: MidiConsumer) -> Self {
        let channels = config.channels;
        let block_size = config.block_size;
        let renderer = Renderer {
            shared,
            midi,
            due: Vec::with_capacity(config.midi_queue_capacity),
            node_midi: Vec::with_capacity(config.midi_queue_capacity),
            node_outputs: (0..config.max_nodes)
                .map(|_| AudioBlock::new(channels, block_size))
                .collect(),
            input: AudioBlock::new(channels, block_size),
            scratch: AudioBlock::new(channels, block_size),
            block_size,
            sample_rate: config.sample_rate,
            plugin_budget: config.process_budget,
        };
        Self {
            renderer,
            device_in: AudioBlock::new(channels, block_size),
            device_out: AudioBlock::new(channels, block_size),
        }
    }

    pub fn block_size(&self) -> usize {
        self.renderer.block_size
    }

    pub fn channels(&self) -> usize {
        self.renderer.input.channels()
    }

    /// Renders one block into `output`.
    ///
    /// At most `block_size` frames are rendered; any frames of `output`
    /// beyond that are left silent. `input` feeds the graph's `Input`
    /// endpoint, or silence when `None`.
    pub fn process_block(&mut self, input: Option<&AudioBlock>, output: &mut AudioBlock) {
        let frames = output.frames().min(self.renderer.block_size);
        self.renderer.load_input(input, frames);
        self.renderer.render(frames, output);
    }

    /// Runs an interleaved device buffer of any length through fixed-size
    /// blocks.
    pub fn process_interleaved(&mut self, input: Option<&[f32]>, output: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        let total = output.len() / channels;
        let block_size = self.renderer.block_size;
        let mut start = 0;
        while start < total {
            let frames = (total - start).min(block_size);
            let range = start * channels..(start + frames) * channels;

            match input.and_then(|samples| samples.get(range.clone())) {
                Some(samples) => {
                    self.device_in.read_interleaved(samples, channels);
                    self.renderer.load_input(Some(&self.device_in), frames);
                }
                None => self.renderer.load_input(None, frames),
            }

            self.device_out.set_frames(frames);
            self.renderer.render(frames, &mut self.device_out);
            self.device_out
                .write_interleaved(&mut output[range], channels);
            start += frames;
        }
    }

    /// Discards queued MIDI, e.g. after a restart.
    pub fn clear_midi(&mut self) {
        self.renderer.midi.clear();
    }

    pub fn sample_position(&self) -> u64 {
        self.renderer.shared.clock.now()
    }

    #[cfg(feature = "device")]
    pub(crate) fn shared(&self) -> Arc<EngineShared> {
        Arc::clone(&self.renderer.shared)
    }
}

impl Renderer {
    #[inline]
    fn load_input(&mut self, input: Option<&AudioBlock>, frames: usize) {
        self.input.set_frames(frames);
        match input {
            Some(block) => self.input.copy_from(block),
            None => self.input.clear(),
        }
    }

    fn render(&mut self, frames: usize, output: &mut AudioBlock) {
        output.clear();
        if self.shared.halted.get() {
            return;
        }

        let started = Instant::now();
        self.shared.in_block.store(true, Ordering::SeqCst);
        let snapshot = self.shared.snapshot.load_full();
        self.shared.rt_epoch.store(snapshot.epoch, Ordering::SeqCst);

        let block_start = self.shared.clock.now();
        self.due.clear();
        self.midi.drain_up_to(block_start + frames as u64, &mut self.due);

        let block_duration = Duration::from_secs_f64(frames as f64 / self.sample_rate);
        let deadline = self.plugin_budget.map(|share| block_duration.mul_f64(share));

        self.run_nodes(&snapshot, frames, block_start, deadline);

        for feed in &snapshot.output {
            match feed.source {
                FeedSource::Input => output.add_from(&self.input, feed.gain),
                FeedSource::Node(pos) => {
                    if let Some(block) = self.node_outputs.get(pos) {
                        output.add_from(block, feed.gain);
                    }
                }
            }
        }

        self.shared.clock.advance(frames as u64);
        // The control side may free this snapshot once `in_block` clears,
        // so release it first.
        drop(snapshot);
        self.shared.in_block.store(false, Ordering::SeqCst);

        self.shared
            .health
            .record_block(started.elapsed(), block_duration, block_start);
    }

    fn run_nodes(
        &mut self,
        snapshot: &GraphSnapshot,
        frames: usize,
        block_start: u64,
        deadline: Option<Duration>,
    ) {
        let health = &self.shared.health;
        let count = snapshot.nodes.len().min(self.node_outputs.len());

        for (pos, node) in snapshot.nodes[..count].iter().enumerate() {
            let (upstream, rest) = self.node_outputs.split_at_mut(pos);
            let out = &mut rest[0];
            out.set_frames(frames);
            out.clear();

            let instance = &node.instance;
            if instance.state() != PluginState::Activated {
                continue;
            }

            self.scratch.set_frames(frames);
            self.scratch.clear();
            for feed in &node.inputs {
                match feed.source {
                    FeedSource::Input => self.scratch.add_from(&self.input, feed.gain),
                    FeedSource::Node(src) => {
                        if let Some(block) = upstream.get(src) {
                            self.scratch.add_from(block, feed.gain);
                        }
                    }
                }
            }

            let id = instance.id();
            self.node_midi.clear();
            for scheduled in self.due.iter().filter(|e| e.target == id.raw()) {
                if self.node_midi.len() == self.node_midi.capacity() {
                    break;
                }
                self.node_midi.push(scheduled.in_block(block_start));
            }

            let result = instance.process_within(&self.scratch, &self.node_midi, out, deadline);

            match result {
                Ok(()) => {}
                Err(ProcessError::Overrun { elapsed, budget }) => {
                    out.clear();
                    health.record_plugin_overrun(id, elapsed, budget);
                    if instance.state() == PluginState::Failed {
                        health.emit(EngineEvent::PluginFailed {
                            plugin: id,
                            failures: instance.total_failures(),
                        });
                    }
                }
                // Deactivated between the state check and the call.
                Err(ProcessError::NotActivated) => out.clear(),
                Err(ProcessError::Busy) if instance.state() != PluginState::Activated => {
                    out.clear()
                }
                Err(err) => {
                    out.clear();
                    health.record_process_error(id, err, block_start);
                    if err.is_plugin_fault() && instance.state() == PluginState::Failed {
                        health.emit(EngineEvent::PluginFailed {
                            plugin: id,
                            failures: instance.total_failures(),
                        });
                    }
                }
            }
        }
    }
}
