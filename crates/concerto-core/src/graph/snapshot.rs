use crate::plugin::PluginInstance;
use std::sync::Arc;

/// Where a node reads one of its inputs from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedSource {
    /// The block's input audio.
    Input,
    /// Output of the node at this position in [`GraphSnapshot::nodes`].
    /// Always earlier than the reading node.
    Node(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Feed {
    pub source: FeedSource,
    pub gain: f32,
}

#[derive(Debug, Clone)]
pub struct ScheduledNode {
    pub instance: Arc<PluginInstance>,
    pub inputs: Vec<Feed>,
}

/// Immutable, pre-resolved view of the routing table.
///
/// Nodes are stored in topological order with their inputs already resolved
/// to positions, so the audio thread walks it front to back without any
/// lookups. Built on the control thread and swapped in atomically.
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    pub epoch: u64,
    pub nodes: Vec<ScheduledNode>,
    pub output: Vec<Feed>,
}

impl GraphSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
