//! Plugin hosting for Concerto.
//!
//! - [`PluginHost`]: loads, lists and unloads plugin instances
//! - [`PluginLoader`]: one plugin format; [`BuiltinLoader`] and [`DylibLoader`] ship here
//! - [`PluginScanner`]: finds plugin libraries on disk
//! - [`plugins`]: built-in `gain` and `sine`
//!
//! # Example
//!
//! ```
//! use concerto_plugin::PluginHost;
//!
//! let mut host = PluginHost::new(10);
//! let gain = host.load("builtin:gain")?;
//! gain.activate(48000.0, 512)?;
//! assert_eq!(host.list().len(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub use error::{HostError, LoadStage, PluginLoadError, Result};

mod loader;
pub use loader::PluginLoader;

mod builtin;
pub use builtin::{BuiltinLoader, PluginConstructor, BUILTIN_PREFIX};

pub mod dylib;
pub use dylib::{DylibLoader, DylibPlugin, CONCERTO_ABI_VERSION};

mod scanner;
pub use scanner::{default_search_paths, PluginScanner, ScannedPlugin};

mod host;
pub use host::{PluginHost, PluginInfo, UnloadMode};

pub mod plugins;
