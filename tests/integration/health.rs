//! Failure handling and monitoring integration tests

use crate::helpers::*;
use concerto::prelude::*;
use concerto::ProcessError;

fn routed_broken_plugin(engine: &mut ConcertoEngine) -> PluginId {
    let broken = engine.load_plugin("builtin:broken").unwrap();
    engine.connect(NodeRef::Input, broken).unwrap();
    engine.connect(broken, NodeRef::Output).unwrap();
    broken
}

#[test]
fn test_failing_plugin_outputs_silence() {
    let mut engine = test_engine();
    routed_broken_plugin(&mut engine);

    let out = render(&engine, &test_signal(TEST_BLOCK_SIZE));
    assert!(is_silent(&out));
    assert_eq!(engine.health().process_errors, 1);
}

#[test]
fn test_ten_failures_mark_plugin_failed() {
    let mut engine = test_engine();
    let broken = routed_broken_plugin(&mut engine);

    for _ in 0..9 {
        render_silence_in(&engine);
    }
    assert_eq!(engine.plugin(broken).unwrap().state(), PluginState::Activated);

    render_silence_in(&engine);
    assert_eq!(engine.plugin(broken).unwrap().state(), PluginState::Failed);

    // Bypassed from now on: no further calls, no further errors.
    for _ in 0..5 {
        assert!(is_silent(&render_silence_in(&engine)));
    }
    let report = engine.health();
    assert_eq!(report.process_errors, 10);
    assert_eq!(report.plugin_failures, vec![(broken, 10)]);
}

#[test]
fn test_failure_events_reach_monitor() {
    let mut engine = test_engine();
    let broken = routed_broken_plugin(&mut engine);
    for _ in 0..10 {
        render_silence_in(&engine);
    }

    let events = engine.health_events();
    let errors = events
        .iter()
        .filter(|e| {
            matches!(
                e,
                EngineEvent::ProcessError { plugin, error: ProcessError::Plugin { code: -1 }, .. }
                    if *plugin == broken
            )
        })
        .count();
    assert_eq!(errors, 10);
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::PluginFailed { plugin, .. } if *plugin == broken)));

    // Drained.
    assert!(engine.health_events().is_empty());
}

#[test]
fn test_reset_returns_failed_plugin_to_service() {
    let mut engine = test_builder().failure_threshold(2).build().unwrap();
    let broken = routed_broken_plugin(&mut engine);
    render_silence_in(&engine);
    render_silence_in(&engine);
    assert_eq!(engine.plugin(broken).unwrap().state(), PluginState::Failed);

    engine.reset_plugin(broken).unwrap();
    let instance = engine.plugin(broken).unwrap();
    assert_eq!(instance.state(), PluginState::Activated);
    assert_eq!(instance.consecutive_failures(), 0);

    render_silence_in(&engine);
    assert_eq!(engine.health().process_errors, 3);
}

#[test]
fn test_failing_plugin_does_not_affect_neighbours() {
    let mut engine = test_engine();
    routed_broken_plugin(&mut engine);
    let gain = engine.load_plugin("builtin:gain").unwrap();
    engine.connect(NodeRef::Input, gain).unwrap();
    engine.connect(gain, NodeRef::Output).unwrap();

    let signal = test_signal(TEST_BLOCK_SIZE);
    for _ in 0..12 {
        assert_signals_eq(
            &render(&engine, &signal),
            &signal,
            tolerances::FLOAT_EPSILON,
        );
    }
}

#[test]
fn test_block_overruns_count_as_xruns() {
    let mut engine = test_builder()
        .builtin("slow", || Ok(Box::new(SlowPlugin::new()) as Box<dyn Plugin>))
        .process_budget(Some(0.5))
        .build()
        .unwrap();
    let slow = engine.load_plugin("builtin:slow").unwrap();
    engine.connect(NodeRef::Input, slow).unwrap();
    engine.connect(slow, NodeRef::Output).unwrap();

    let out = render(&engine, &[1.0; TEST_BLOCK_SIZE]);

    // Past its deadline, so its output is dropped.
    assert!(is_silent(&out));
    let report = engine.health();
    assert_eq!(report.plugin_overruns, 1);
    assert_eq!(report.xruns, 1);
    assert!(report.cpu.peak > 1.0);
    assert_eq!(engine.plugin(slow).unwrap().consecutive_failures(), 1);
}

#[test]
fn test_plugin_that_always_overruns_is_bypassed() {
    let mut engine = test_builder()
        .builtin("slow", || Ok(Box::new(SlowPlugin::new()) as Box<dyn Plugin>))
        .process_budget(Some(0.5))
        .build()
        .unwrap();
    let slow = engine.load_plugin("builtin:slow").unwrap();
    engine.connect(NodeRef::Input, slow).unwrap();
    engine.connect(slow, NodeRef::Output).unwrap();

    for _ in 0..15 {
        assert!(is_silent(&render(&engine, &[1.0; TEST_BLOCK_SIZE])));
    }

    let instance = engine.plugin(slow).unwrap();
    assert_eq!(instance.state(), PluginState::Failed);
    assert_eq!(instance.total_failures(), 10);

    // No calls once bypassed.
    let report = engine.health();
    assert_eq!(report.plugin_overruns, 10);
    assert_eq!(report.plugin_failures, vec![(slow, 10)]);
    assert!(engine
        .health_events()
        .iter()
        .any(|e| matches!(e, EngineEvent::PluginFailed { plugin, failures: 10 } if *plugin == slow)));
}

/// Passes audio through after sleeping longer than a whole block.
struct SlowPlugin {
    descriptor: PluginDescriptor,
}

impl SlowPlugin {
    fn new() -> Self {
        Self {
            descriptor: PluginDescriptor::new("test.slow", "Slow"),
        }
    }
}

impl Plugin for SlowPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn activate(&mut self, _: f64, _: usize) -> Result<(), concerto::PluginError> {
        Ok(())
    }

    fn process(
        &mut self,
        input: &AudioBlock,
        _: &[MidiEvent],
        output: &mut AudioBlock,
    ) -> Result<(), ProcessError> {
        // 64 frames at 48 kHz is 1.3 ms.
        std::thread::sleep(std::time::Duration::from_millis(5));
        output.copy_from(input);
        Ok(())
    }

    fn set_parameter(&mut self, _: u32, _: f64) {}
}
