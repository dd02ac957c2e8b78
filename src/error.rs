//! Centralized error type for the concerto umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use concerto_core::{PluginError, RoutingError};
use concerto_plugin::{HostError, PluginLoadError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] concerto_core::Error),

    #[error("MIDI: {0}")]
    Midi(#[from] concerto_midi::Error),

    #[error(transparent)]
    Load(#[from] PluginLoadError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// Host errors not covered by the variants above.
    #[error(transparent)]
    Host(HostError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<HostError> for Error {
    fn from(e: HostError) -> Self {
        match e {
            HostError::Load(e) => Error::Load(e),
            HostError::Routing(e) => Error::Routing(e),
            HostError::Plugin(e) => Error::Plugin(e),
            HostError::Io(e) => Error::Io(e),
            other => Error::Host(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
