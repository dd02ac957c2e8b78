//! Error types for concerto-core.

use crate::graph::NodeRef;
use crate::plugin::{PluginId, PluginState};
use std::time::Duration;
use thiserror::Error;

/// Error type for concerto-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error("Invalid device: {0}")]
    InvalidDevice(String),

    #[error("Audio device lost; restart the engine to resume processing")]
    DeviceLost,

    #[cfg(feature = "device")]
    #[error("Audio device not available")]
    DeviceNotAvailable(#[from] cpal::DefaultStreamConfigError),

    #[cfg(feature = "device")]
    #[error("Failed to build audio stream")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[cfg(feature = "device")]
    #[error("Failed to play audio stream")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[cfg(feature = "device")]
    #[error("Failed to enumerate devices")]
    DevicesError(#[from] cpal::DevicesError),

    #[cfg(feature = "device")]
    #[error("Failed to get device name")]
    DeviceNameError(#[from] cpal::DeviceNameError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Rejected routing edit. The table keeps its last valid state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("Edge {src} -> {dst} would create a cycle")]
    CycleDetected { src: NodeRef, dst: NodeRef },

    #[error("Unknown node: {0}")]
    UnknownNode(NodeRef),

    #[error("Node already in graph: {0}")]
    DuplicateNode(NodeRef),

    #[error("Edge {src} -> {dst} already exists")]
    DuplicateEdge { src: NodeRef, dst: NodeRef },

    #[error("Invalid edge endpoints: {src} -> {dst}")]
    InvalidEndpoint { src: NodeRef, dst: NodeRef },

    #[error("Plugin {0} is not activated")]
    InactivePlugin(PluginId),

    #[error("Graph is full ({max} nodes)")]
    CapacityExceeded { max: usize },
}

/// Control-thread errors from the plugin instance adapter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PluginError {
    #[error("Plugin is not activated")]
    NotActivated,

    #[error("Cannot {op} a plugin in state {from:?}")]
    InvalidState { from: PluginState, op: &'static str },

    #[error("Sample rate / block size negotiation failed: {0}")]
    Negotiation(String),

    #[error("Unknown parameter id {0}")]
    UnknownParameter(u32),
}

/// Errors raised while processing a block on the audio thread.
///
/// `Copy` and allocation-free; the engine turns these into silence and
/// counters, they never leave the audio thread as failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessError {
    #[error("process called while not activated")]
    NotActivated,

    #[error("plugin busy on another thread")]
    Busy,

    #[error("block of {frames} frames exceeds negotiated maximum {max}")]
    BlockTooLarge { frames: usize, max: usize },

    #[error("expected {expected} channels, got {got}")]
    ChannelMismatch { expected: usize, got: usize },

    #[error("plugin reported error code {code}")]
    Plugin { code: i32 },

    #[error("plugin took {elapsed:?}, over its {budget:?} budget")]
    Overrun { elapsed: Duration, budget: Duration },
}

impl ProcessError {
    /// Whether the error counts toward the plugin's failure threshold.
    #[inline]
    pub fn is_plugin_fault(&self) -> bool {
        matches!(
            self,
            ProcessError::Plugin { .. }
                | ProcessError::ChannelMismatch { .. }
                | ProcessError::Overrun { .. }
        )
    }
}
