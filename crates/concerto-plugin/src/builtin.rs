//! Registry of plugins compiled into the host, addressed as `builtin:<name>`.

use crate::error::{LoadStage, PluginLoadError};
use crate::loader::PluginLoader;
use crate::plugins::{GainPlugin, SinePlugin};
use concerto_core::Plugin;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Identifier prefix handled by [`BuiltinLoader`].
pub const BUILTIN_PREFIX: &str = "builtin:";

pub type PluginConstructor = Arc<dyn Fn() -> Result<Box<dyn Plugin>, String> + Send + Sync>;

/// Loader for in-process plugins registered by name.
///
/// # Example
/// ```
/// use concerto_core::Plugin;
/// use concerto_plugin::{BuiltinLoader, PluginLoader};
/// use std::path::Path;
///
/// let loader = BuiltinLoader::default();
/// assert!(loader.has_plugin("gain"));
/// let gain = loader.load(Path::new("builtin:gain")).unwrap();
/// assert_eq!(gain.descriptor().name, "Gain");
/// ```
#[derive(Clone)]
pub struct BuiltinLoader {
    constructors: Arc<RwLock<HashMap<String, PluginConstructor>>>,
}

impl BuiltinLoader {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            constructors: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a constructor under `name`, replacing any previous one.
    pub fn register<F>(&self, name: impl Into<String>, constructor: F)
    where
        F: Fn() -> Result<Box<dyn Plugin>, String> + Send + Sync + 'static,
    {
        self.constructors
            .write()
            .insert(name.into(), Arc::new(constructor));
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.constructors.write().remove(name).is_some()
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.constructors.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn name_of(path: &Path) -> Option<&str> {
        path.to_str()?.strip_prefix(BUILTIN_PREFIX)
    }
}

impl Default for BuiltinLoader {
    fn default() -> Self {
        let loader = Self::new();
        loader.register("gain", || Ok(Box::new(GainPlugin::new()) as Box<dyn Plugin>));
        loader.register("sine", || Ok(Box::new(SinePlugin::new()) as Box<dyn Plugin>));
        loader
    }
}

impl PluginLoader for BuiltinLoader {
    fn name(&self) -> &str {
        "builtin"
    }

    fn can_load(&self, path: &Path) -> bool {
        Self::name_of(path).is_some()
    }

    fn load(&self, path: &Path) -> Result<Box<dyn Plugin>, PluginLoadError> {
        let name = Self::name_of(path)
            .ok_or_else(|| PluginLoadError::FileNotFound(path.to_path_buf()))?;
        // Clone out so the constructor runs without holding the lock.
        let constructor = self
            .constructors
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| PluginLoadError::FileNotFound(path.to_path_buf()))?;

        constructor().map_err(|reason| PluginLoadError::InitFailed {
            path: path.to_path_buf(),
            stage: LoadStage::Instantiation,
            reason,
        })
    }
}
