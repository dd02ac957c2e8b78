//! Audio Graph / Routing Table and the immutable snapshots published to the
//! audio thread.

mod snapshot;
mod table;

pub use snapshot::{Feed, FeedSource, GraphSnapshot, ScheduledNode};
pub use table::{RoutingEdge, RoutingTable};

use crate::plugin::PluginId;
use std::fmt;

/// Endpoint of a routing edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    /// Audio arriving from the device or the caller of `process_block`.
    Input,
    Plugin(PluginId),
    /// Terminal node; whatever feeds it is summed into the output buffer.
    Output,
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Input => f.write_str("input"),
            NodeRef::Plugin(id) => write!(f, "{id}"),
            NodeRef::Output => f.write_str("output"),
        }
    }
}

impl From<PluginId> for NodeRef {
    fn from(id: PluginId) -> Self {
        NodeRef::Plugin(id)
    }
}
