//! Engine lifecycle integration tests

use crate::helpers::*;
use concerto::prelude::*;
use concerto::{Error, HostError, PluginError, PluginLoadError};

#[test]
fn test_builder_applies_every_setting() {
    let engine = ConcertoEngine::builder()
        .sample_rate(96000.0)
        .block_size(128)
        .channels(4)
        .midi_queue_capacity(64)
        .failure_threshold(3)
        .max_nodes(8)
        .process_budget(Some(0.5))
        .monitor_capacity(32)
        .build()
        .unwrap();

    let config = engine.config();
    assert_eq!(config.sample_rate, 96000.0);
    assert_eq!(config.block_size, 128);
    assert_eq!(config.channels, 4);
    assert_eq!(config.midi_queue_capacity, 64);
    assert_eq!(config.failure_threshold, 3);
    assert_eq!(config.max_nodes, 8);
    assert_eq!(config.process_budget, Some(0.5));
    assert_eq!(config.monitor_capacity, 32);
}

#[test]
fn test_invalid_config_is_rejected() {
    let result = ConcertoEngine::builder().block_size(0).build();
    assert!(matches!(result, Err(Error::Core(concerto::core::Error::InvalidConfig(_)))));

    let result = ConcertoEngine::builder().sample_rate(1000.0).build();
    assert!(result.is_err());
}

#[test]
fn test_non_finite_timing_is_rejected() {
    let result = ConcertoEngine::builder().sample_rate(f64::NAN).build();
    assert!(matches!(result, Err(Error::Core(concerto::core::Error::InvalidConfig(_)))));

    let result = ConcertoEngine::builder().process_budget(Some(1e300)).build();
    assert!(matches!(result, Err(Error::Core(concerto::core::Error::InvalidConfig(_)))));
}

#[test]
fn test_engine_from_toml_config() {
    let config = EngineConfig::from_toml_str(
        r#"
        sample_rate = 48000.0
        block_size = 256
        failure_threshold = 5
        "#,
    )
    .unwrap();

    let engine = ConcertoEngine::builder().config(config).build().unwrap();
    assert_eq!(engine.sample_rate(), 48000.0);
    assert_eq!(engine.block_size(), 256);
    assert_eq!(engine.config().failure_threshold, 5);
    // Untouched keys keep their defaults.
    assert_eq!(engine.channels(), 2);
}

#[test]
fn test_load_plugin_activates_and_adds_node() {
    let mut engine = test_engine();
    let gain = engine.load_plugin("builtin:gain").unwrap();

    let plugins = engine.plugins();
    assert_eq!(plugins.len(), 1);
    assert_eq!(plugins[0].id, gain);
    assert_eq!(plugins[0].state, PluginState::Activated);
    assert_eq!(plugins[0].descriptor.name, "Gain");
    assert_eq!(engine.topological_order(), vec![gain]);
}

#[test]
fn test_load_missing_plugin_reports_file_not_found() {
    let mut engine = test_engine();
    let err = engine.load_plugin("/nowhere/missing.so").unwrap_err();
    assert!(matches!(err, Error::Load(PluginLoadError::FileNotFound(_))));
    assert!(engine.plugins().is_empty());
}

#[test]
fn test_load_garbage_library_reports_incompatible_abi() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.so");
    std::fs::write(&path, [0u8; 64]).unwrap();

    let mut engine = test_engine();
    let err = engine.load_plugin(&path).unwrap_err();
    assert!(matches!(err, Error::Load(PluginLoadError::IncompatibleAbi { .. })));

    // The engine keeps working.
    let gain = engine.load_plugin("builtin:gain").unwrap();
    engine.connect(NodeRef::Input, gain).unwrap();
    engine.connect(gain, NodeRef::Output).unwrap();
    assert_eq!(render(&engine, &[0.25; TEST_BLOCK_SIZE])[0], 0.25);
}

#[test]
fn test_unload_routed_plugin_needs_force() {
    let mut engine = test_engine();
    let gain = engine.load_plugin("builtin:gain").unwrap();
    engine.connect(NodeRef::Input, gain).unwrap();
    engine.connect(gain, NodeRef::Output).unwrap();

    let err = engine.unload_plugin(gain).unwrap_err();
    assert!(matches!(err, Error::Host(HostError::PluginInUse(id)) if id == gain));
    assert_eq!(engine.edges().len(), 2);

    engine.unload_plugin_forced(gain).unwrap();
    assert!(engine.edges().is_empty());
    assert!(engine.plugins().is_empty());
    assert!(is_silent(&render(&engine, &test_signal(TEST_BLOCK_SIZE))));
}

#[test]
fn test_unload_after_detach() {
    let mut engine = test_engine();
    let gain = engine.load_plugin("builtin:gain").unwrap();
    engine.connect(NodeRef::Input, gain).unwrap();
    engine.connect(gain, NodeRef::Output).unwrap();

    assert_eq!(engine.detach_plugin(gain).unwrap(), 2);
    engine.unload_plugin(gain).unwrap();
    assert!(engine.plugin(gain).is_none());
}

#[test]
fn test_unloaded_instance_is_released() {
    let mut engine = test_engine();
    let gain = engine.load_plugin("builtin:gain").unwrap();
    let instance = std::sync::Arc::clone(engine.plugin(gain).unwrap());

    engine.unload_plugin(gain).unwrap();
    engine.reclaim();
    assert_eq!(engine.pending_reclaim(), 0);
    assert_eq!(instance.state(), PluginState::Unloaded);
    assert_eq!(std::sync::Arc::strong_count(&instance), 1);
}

#[test]
fn test_deactivate_and_reactivate() {
    let mut engine = test_engine();
    let gain = engine.load_plugin("builtin:gain").unwrap();
    engine.connect(NodeRef::Input, gain).unwrap();

    // Routed plugins stay active.
    assert!(matches!(
        engine.deactivate_plugin(gain),
        Err(Error::Host(HostError::PluginInUse(_)))
    ));

    engine.detach_plugin(gain).unwrap();
    engine.deactivate_plugin(gain).unwrap();
    assert_eq!(engine.plugin(gain).unwrap().state(), PluginState::Deactivated);
    assert!(engine.connect(NodeRef::Input, gain).is_err());

    engine.activate_plugin(gain).unwrap();
    engine.connect(NodeRef::Input, gain).unwrap();
}

#[test]
fn test_parameters_are_clamped() {
    let mut engine = test_engine();
    let gain = engine.load_plugin("builtin:gain").unwrap();

    assert_eq!(engine.parameter(gain, 0).unwrap(), 1.0);
    assert_eq!(engine.set_parameter(gain, 0, 100.0).unwrap(), 4.0);
    assert_eq!(engine.set_parameter(gain, 0, -1.0).unwrap(), 0.0);
    assert!(matches!(
        engine.set_parameter(gain, 42, 1.0),
        Err(Error::Plugin(PluginError::UnknownParameter(42)))
    ));
}

#[test]
fn test_custom_builtin_and_scanner() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("chorus.so"), b"").unwrap();
    std::fs::write(dir.path().join("skipped.so"), b"").unwrap();

    let mut engine = test_builder()
        .search_path(dir.path())
        .blacklist(dir.path().join("skipped.so"))
        .build()
        .unwrap();

    let found = engine.scan_plugins();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "chorus");

    let broken = engine.load_plugin("builtin:broken").unwrap();
    assert_eq!(engine.plugin(broken).unwrap().descriptor().name, "Broken");
}
