//! Plugin Host Manager: owns every loaded plugin instance.
//!
//! Loading a plugin runs third-party code in the host process (library
//! initialisers, the entry point, the plugin's constructor). There is no
//! sandbox: a misbehaving plugin can crash or corrupt the whole engine. Only
//! load plugins you trust.

use crate::builtin::BuiltinLoader;
use crate::dylib::DylibLoader;
use crate::error::{HostError, PluginLoadError, Result};
use crate::loader::PluginLoader;
use concerto_core::{
    GraphController, PluginDescriptor, PluginId, PluginInstance, PluginState,
};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What to do with edges still referencing a plugin being unloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnloadMode {
    /// Refuse with [`HostError::PluginInUse`].
    #[default]
    Safe,
    /// Remove the edges first.
    Force,
}

/// Summary of one loaded instance.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginInfo {
    pub id: PluginId,
    pub path: PathBuf,
    pub descriptor: PluginDescriptor,
    pub state: PluginState,
    pub total_failures: u64,
}

struct LoadedPlugin {
    instance: Arc<PluginInstance>,
    path: PathBuf,
}

pub struct PluginHost {
    loaders: Vec<Box<dyn PluginLoader>>,
    plugins: BTreeMap<PluginId, LoadedPlugin>,
    next_id: u64,
    failure_threshold: u32,
}

impl PluginHost {
    /// Host with the built-in and dynamic-library loaders.
    pub fn new(failure_threshold: u32) -> Self {
        let mut host = Self::empty(failure_threshold);
        host.add_loader(BuiltinLoader::default());
        host.add_loader(DylibLoader::new());
        host
    }

    /// Host with no loaders registered.
    pub fn empty(failure_threshold: u32) -> Self {
        Self {
            loaders: Vec::new(),
            plugins: BTreeMap::new(),
            next_id: 1,
            failure_threshold,
        }
    }

    /// Registers a loader. Earlier loaders take precedence.
    pub fn add_loader(&mut self, loader: impl PluginLoader + 'static) {
        self.add_boxed_loader(Box::new(loader));
    }

    pub fn add_boxed_loader(&mut self, loader: Box<dyn PluginLoader>) {
        self.loaders.push(loader);
    }

    pub fn loader_names(&self) -> Vec<&str> {
        self.loaders.iter().map(|l| l.name()).collect()
    }

    /// Loads the plugin at `path` (or a `builtin:<name>` identifier) and
    /// wraps it in an instance in state `Loaded`.
    pub fn load(&mut self, path: impl AsRef<Path>) -> std::result::Result<Arc<PluginInstance>, PluginLoadError> {
        let path = path.as_ref();
        let loader = self
            .loaders
            .iter()
            .find(|loader| loader.can_load(path))
            .ok_or_else(|| {
                if path.exists() {
                    PluginLoadError::IncompatibleAbi {
                        path: path.to_path_buf(),
                        reason: "no loader accepts this file".to_string(),
                    }
                } else {
                    PluginLoadError::FileNotFound(path.to_path_buf())
                }
            })?;

        let plugin = loader.load(path)?;
        validate_capabilities(path, plugin.descriptor())?;

        let id = PluginId::new(self.next_id);
        self.next_id += 1;
        let instance = Arc::new(PluginInstance::new(id, plugin, self.failure_threshold));

        tracing::info!(
            plugin = %id,
            name = %instance.descriptor().name,
            loader = loader.name(),
            path = %path.display(),
            "Plugin loaded"
        );

        self.plugins.insert(
            id,
            LoadedPlugin {
                instance: Arc::clone(&instance),
                path: path.to_path_buf(),
            },
        );
        Ok(instance)
    }

    /// Deactivates the plugin (running its stop hook), removes it from the
    /// graph and hands it to the controller for deferred release.
    ///
    /// With [`UnloadMode::Safe`] an instance that still has edges is left
    /// untouched and `PluginInUse` is returned.
    pub fn unload(
        &mut self,
        id: PluginId,
        controller: &mut GraphController,
        mode: UnloadMode,
    ) -> Result<()> {
        let Some(loaded) = self.plugins.get(&id) else {
            return Err(HostError::UnknownPlugin(id));
        };
        if mode == UnloadMode::Safe && controller.is_referenced(id) {
            return Err(HostError::PluginInUse(id));
        }

        loaded.instance.deactivate()?;

        if controller.table().contains(id) {
            let removed = controller.remove_node(id)?;
            controller.retire(removed);
        }
        if let Some(loaded) = self.plugins.remove(&id) {
            tracing::info!(plugin = %id, path = %loaded.path.display(), "Plugin unloaded");
            controller.retire(loaded.instance);
        }
        Ok(())
    }

    /// Unloads everything, forcing edge removal.
    pub fn shutdown(&mut self, controller: &mut GraphController) {
        let ids: Vec<PluginId> = self.plugins.keys().copied().collect();
        for id in ids {
            if let Err(e) = self.unload(id, controller, UnloadMode::Force) {
                tracing::warn!(plugin = %id, error = %e, "Failed to unload plugin during shutdown");
            }
        }
    }

    pub fn get(&self, id: PluginId) -> Option<&Arc<PluginInstance>> {
        self.plugins.get(&id).map(|p| &p.instance)
    }

    pub fn list(&self) -> Vec<PluginInfo> {
        self.plugins
            .iter()
            .map(|(&id, loaded)| PluginInfo {
                id,
                path: loaded.path.clone(),
                descriptor: loaded.instance.descriptor().clone(),
                state: loaded.instance.state(),
                total_failures: loaded.instance.total_failures(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

/// Checks what the engine needs from every plugin before accepting it.
fn validate_capabilities(
    path: &Path,
    descriptor: &PluginDescriptor,
) -> std::result::Result<(), PluginLoadError> {
    let reject = |reason: String| PluginLoadError::IncompatibleAbi {
        path: path.to_path_buf(),
        reason,
    };

    if descriptor.audio_io.outputs == 0 {
        return Err(reject(format!(
            "{} declares no audio outputs",
            descriptor.name
        )));
    }

    let mut ids = HashSet::new();
    for param in &descriptor.parameters {
        if !ids.insert(param.id) {
            return Err(reject(format!("duplicate parameter id {}", param.id)));
        }
        if !(param.min.is_finite() && param.max.is_finite() && param.default.is_finite())
            || param.min > param.max
        {
            return Err(reject(format!(
                "parameter {} has invalid range {}..{}",
                param.name, param.min, param.max
            )));
        }
    }
    Ok(())
}
