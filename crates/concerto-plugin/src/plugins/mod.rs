//! Plugins shipped with the host.

mod gain;
mod sine;

pub use gain::GainPlugin;
pub use sine::SinePlugin;
