use crate::error::PluginLoadError;
use concerto_core::Plugin;
use std::path::Path;

/// One plugin format the host knows how to open.
///
/// The host asks each registered loader in turn whether it accepts a path,
/// and the first that does produces the plugin.
pub trait PluginLoader: Send + Sync {
    /// Short format name for logs, e.g. `"builtin"` or `"dylib"`.
    fn name(&self) -> &str;

    fn can_load(&self, path: &Path) -> bool;

    /// Opens the plugin and returns it unactivated.
    fn load(&self, path: &Path) -> Result<Box<dyn Plugin>, PluginLoadError>;
}
