//! Error types for plugin loading and hosting

use concerto_core::{PluginError, PluginId, RoutingError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Scanning,
    Opening,
    EntryLookup,
    AbiCheck,
    Instantiation,
    Validation,
}

impl std::fmt::Display for LoadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadStage::Scanning => write!(f, "scanning"),
            LoadStage::Opening => write!(f, "opening library"),
            LoadStage::EntryLookup => write!(f, "looking up entry point"),
            LoadStage::AbiCheck => write!(f, "checking ABI"),
            LoadStage::Instantiation => write!(f, "creating instance"),
            LoadStage::Validation => write!(f, "validating capabilities"),
        }
    }
}

/// Reported synchronously to the caller of `load`. Never fatal to the engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PluginLoadError {
    #[error("Incompatible plugin ABI: {path}\n  Reason: {reason}")]
    IncompatibleAbi { path: PathBuf, reason: String },

    #[error("Plugin not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Plugin load failed at {stage} stage: {path}\n  Reason: {reason}")]
    InitFailed {
        path: PathBuf,
        stage: LoadStage,
        reason: String,
    },
}

impl PluginLoadError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            PluginLoadError::IncompatibleAbi { path, .. }
            | PluginLoadError::FileNotFound(path)
            | PluginLoadError::InitFailed { path, .. } => path,
        }
    }
}

#[derive(Error, Debug)]
pub enum HostError {
    #[error(transparent)]
    Load(#[from] PluginLoadError),

    #[error("Unknown plugin: {0}")]
    UnknownPlugin(PluginId),

    #[error("Plugin {0} is still routed; remove its edges or force the unload")]
    PluginInUse(PluginId),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HostError>;
