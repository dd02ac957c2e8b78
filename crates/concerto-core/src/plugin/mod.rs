//! Plugin capability set and the per-instance adapter.

mod descriptor;
mod instance;
mod parameter;
mod traits;

pub use descriptor::{AudioIO, ParameterInfo, PluginCategory, PluginDescriptor};
pub use instance::{PluginId, PluginInstance, PluginState};
pub use parameter::ParameterBank;
pub use traits::Plugin;
