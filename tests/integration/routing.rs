//! Routing and signal-flow integration tests

use crate::helpers::tolerances::FLOAT_EPSILON;
use crate::helpers::*;
use concerto::prelude::*;
use concerto::{Error, RoutingError};

#[test]
fn test_input_to_output_passthrough() {
    let mut engine = test_engine();
    engine.connect(NodeRef::Input, NodeRef::Output).unwrap();

    let signal = test_signal(TEST_BLOCK_SIZE);
    assert_signals_eq(&render(&engine, &signal), &signal, FLOAT_EPSILON);
}

#[test]
fn test_unconnected_graph_is_silent() {
    let mut engine = test_engine();
    engine.load_plugin("builtin:gain").unwrap();
    assert!(is_silent(&render(&engine, &test_signal(TEST_BLOCK_SIZE))));
}

#[test]
fn test_cycle_is_rejected_and_graph_unchanged() {
    let mut engine = test_engine();
    let a = engine.load_plugin("builtin:gain").unwrap();
    let b = engine.load_plugin("builtin:gain").unwrap();
    let c = engine.load_plugin("builtin:gain").unwrap();
    engine.connect(a, b).unwrap();
    engine.connect(b, c).unwrap();

    let edges_before = engine.edges();
    let order_before = engine.topological_order();

    let err = engine.connect(c, a).unwrap_err();
    assert!(matches!(
        err,
        Error::Routing(RoutingError::CycleDetected { .. })
    ));
    assert!(engine.connect(b, b).is_err());

    assert_eq!(engine.edges(), edges_before);
    assert_eq!(engine.topological_order(), order_before);
    assert_eq!(order_before, vec![a, b, c]);
}

#[test]
fn test_topological_order_follows_edges() {
    let mut engine = test_engine();
    let late = engine.load_plugin("builtin:gain").unwrap();
    let early = engine.load_plugin("builtin:gain").unwrap();
    engine.connect(early, late).unwrap();

    assert_eq!(engine.topological_order(), vec![early, late]);
}

#[test]
fn test_unknown_node_is_rejected() {
    let mut engine = test_engine();
    let ghost = PluginId::new(999);
    assert!(matches!(
        engine.connect(NodeRef::Input, ghost),
        Err(Error::Routing(RoutingError::UnknownNode(_)))
    ));
    assert!(engine.edges().is_empty());
}

#[test]
fn test_output_cannot_be_a_source() {
    let mut engine = test_engine();
    let gain = engine.load_plugin("builtin:gain").unwrap();
    assert!(matches!(
        engine.connect(NodeRef::Output, gain),
        Err(Error::Routing(RoutingError::InvalidEndpoint { .. }))
    ));
}

#[test]
fn test_fan_in_sums_with_edge_gain() {
    let mut engine = test_engine();
    let left = engine.load_plugin("builtin:gain").unwrap();
    let right = engine.load_plugin("builtin:gain").unwrap();
    engine.connect(NodeRef::Input, left).unwrap();
    engine.connect(NodeRef::Input, right).unwrap();
    engine.connect_with_gain(left, NodeRef::Output, 0.25).unwrap();
    engine.connect_with_gain(right, NodeRef::Output, 0.5).unwrap();

    let signal = test_signal(TEST_BLOCK_SIZE);
    let expected: Vec<f32> = signal.iter().map(|s| s * 0.75).collect();
    assert_signals_eq(&render(&engine, &signal), &expected, FLOAT_EPSILON);
}

#[test]
fn test_disconnect_takes_effect_next_block() {
    let mut engine = test_engine();
    let gain = engine.load_plugin("builtin:gain").unwrap();
    engine.connect(NodeRef::Input, gain).unwrap();
    engine.connect(gain, NodeRef::Output).unwrap();

    let signal = test_signal(TEST_BLOCK_SIZE);
    assert!(!is_silent(&render(&engine, &signal)));

    assert!(engine.disconnect(gain, NodeRef::Output).unwrap());
    assert!(!engine.disconnect(gain, NodeRef::Output).unwrap());
    assert!(is_silent(&render(&engine, &signal)));
}

#[test]
fn test_parameter_change_applies_next_block() {
    let mut engine = test_engine();
    let gain = engine.load_plugin("builtin:gain").unwrap();
    engine.connect(NodeRef::Input, gain).unwrap();
    engine.connect(gain, NodeRef::Output).unwrap();

    let ones = vec![1.0; TEST_BLOCK_SIZE];
    assert_eq!(render(&engine, &ones)[0], 1.0);

    engine.set_parameter(gain, 0, 2.0).unwrap();
    assert_eq!(render(&engine, &ones)[0], 2.0);
}

#[test]
fn test_interleaved_buffer_longer_than_block() {
    let mut engine = test_builder().channels(2).build().unwrap();
    engine.connect(NodeRef::Input, NodeRef::Output).unwrap();

    // Three and a half blocks of stereo.
    let frames = TEST_BLOCK_SIZE * 3 + TEST_BLOCK_SIZE / 2;
    let input: Vec<f32> = (0..frames * 2).map(|i| i as f32 / 1000.0).collect();
    let mut output = vec![0.0; frames * 2];
    engine.process_interleaved(Some(&input), &mut output);

    assert_signals_eq(&output, &input, FLOAT_EPSILON);
    assert_eq!(engine.sample_position(), frames as u64);
}
