//! Builder for configuring and constructing a `ConcertoEngine`.

use crate::{ConcertoEngine, Result};
use concerto_core::{EngineConfig, Plugin};
use concerto_plugin::{BuiltinLoader, DylibLoader, PluginHost, PluginLoader, PluginScanner};
use std::path::PathBuf;

/// Every [`EngineConfig`] key has a setter; anything not set keeps its
/// default. The configuration is validated in [`build`](Self::build).
///
/// Plugin loaders are consulted in order: built-ins, then any added with
/// [`loader`](Self::loader), then shared libraries.
///
/// # Example
///
/// ```
/// use concerto::prelude::*;
///
/// let engine = ConcertoEngine::builder()
///     .sample_rate(48000.0)
///     .block_size(256)
///     .channels(2)
///     .failure_threshold(10)
///     .build()?;
///
/// assert_eq!(engine.block_size(), 256);
/// # Ok::<(), concerto::Error>(())
/// ```
pub struct ConcertoEngineBuilder {
    config: EngineConfig,
    builtins: BuiltinLoader,
    loaders: Vec<Box<dyn PluginLoader>>,
    search_paths: Vec<PathBuf>,
    blacklist: Vec<PathBuf>,
    default_search_paths: bool,

    #[cfg(feature = "device")]
    output_device: Option<usize>,
}

impl Default for ConcertoEngineBuilder {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            builtins: BuiltinLoader::default(),
            loaders: Vec::new(),
            search_paths: Vec::new(),
            blacklist: Vec::new(),
            default_search_paths: false,

            #[cfg(feature = "device")]
            output_device: None,
        }
    }
}

impl ConcertoEngineBuilder {
    /// Replaces the whole configuration, e.g. one read with
    /// [`EngineConfig::from_toml_str`].
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Default: 44100
    pub fn sample_rate(mut self, sample_rate: f64) -> Self {
        self.config.sample_rate = sample_rate;
        self
    }

    /// Default: 512
    pub fn block_size(mut self, frames: usize) -> Self {
        self.config.block_size = frames;
        self
    }

    /// Default: 2
    pub fn channels(mut self, channels: usize) -> Self {
        self.config.channels = channels;
        self
    }

    /// Default: 256
    pub fn midi_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.midi_queue_capacity = capacity;
        self
    }

    /// Default: 10
    pub fn failure_threshold(mut self, failures: u32) -> Self {
        self.config.failure_threshold = failures;
        self
    }

    /// Default: 64
    pub fn max_nodes(mut self, nodes: usize) -> Self {
        self.config.max_nodes = nodes;
        self
    }

    /// Share of the block duration a single plugin may use. `None` turns the
    /// per-plugin deadline off. Default: `Some(1.0)`
    pub fn process_budget(mut self, budget: Option<f64>) -> Self {
        self.config.process_budget = budget;
        self
    }

    /// Default: 256
    pub fn monitor_capacity(mut self, capacity: usize) -> Self {
        self.config.monitor_capacity = capacity;
        self
    }

    /// Makes `builtin:<name>` available to [`ConcertoEngine::load_plugin`].
    pub fn builtin<F>(self, name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn() -> std::result::Result<Box<dyn Plugin>, String> + Send + Sync + 'static,
    {
        self.builtins.register(name, constructor);
        self
    }

    pub fn loader(mut self, loader: impl PluginLoader + 'static) -> Self {
        self.loaders.push(Box::new(loader));
        self
    }

    pub fn search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    /// Include the platform's conventional plugin folders when scanning.
    pub fn default_search_paths(mut self) -> Self {
        self.default_search_paths = true;
        self
    }

    /// Never report `path` from a scan.
    pub fn blacklist(mut self, path: impl Into<PathBuf>) -> Self {
        self.blacklist.push(path.into());
        self
    }

    #[cfg(feature = "device")]
    pub fn output_device(mut self, index: usize) -> Self {
        self.output_device = Some(index);
        self
    }

    pub fn build(self) -> Result<ConcertoEngine> {
        let parts = concerto_core::engine::create(&self.config)?;

        let mut host = PluginHost::empty(self.config.failure_threshold);
        host.add_loader(self.builtins);
        for loader in self.loaders {
            host.add_boxed_loader(loader);
        }
        host.add_loader(DylibLoader::new());

        let mut scanner = if self.default_search_paths {
            PluginScanner::with_default_paths()
        } else {
            PluginScanner::new()
        };
        for path in self.search_paths {
            scanner.add_path(path);
        }
        for path in self.blacklist {
            scanner.blacklist(path);
        }

        tracing::info!(
            sample_rate = self.config.sample_rate,
            block_size = self.config.block_size,
            channels = self.config.channels,
            loaders = ?host.loader_names(),
            "Engine built"
        );

        Ok(ConcertoEngine::from_parts(
            self.config,
            parts,
            host,
            scanner,
            #[cfg(feature = "device")]
            self.output_device,
        ))
    }
}
