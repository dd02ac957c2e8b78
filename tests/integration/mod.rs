//! Integration test modules for Concerto
//!
//! - engine: building, configuration, plugin lifecycle
//! - routing: graph construction and signal flow
//! - midi: MIDI delivery into plugins
//! - health: failure handling and monitoring

pub mod engine;
pub mod health;
pub mod midi;
pub mod routing;
