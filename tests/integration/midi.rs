//! MIDI delivery integration tests

use crate::helpers::tolerances::DSP_EPSILON;
use crate::helpers::*;
use concerto::prelude::*;
use concerto::Enqueued;

fn expected_sine(note: u8, frames_since_start: usize) -> f32 {
    let frequency = 440.0 * 2f64.powf((note as f64 - 69.0) / 12.0);
    let phase = frequency * frames_since_start as f64 / TEST_SAMPLE_RATE;
    // Velocity 127 at the default level of 0.5.
    ((phase * std::f64::consts::TAU).sin() * 0.5) as f32
}

#[test]
fn test_note_starts_at_its_sample_offset() {
    let mut engine = test_engine();
    let synth = engine.load_plugin("builtin:sine").unwrap();
    engine.connect(synth, NodeRef::Output).unwrap();

    engine.send_midi(synth, MidiEvent::note_on(0, 69, 127).at(20));
    let out = render_silence_in(&engine);

    assert!(is_silent(&out[..20]));
    for (k, sample) in out[20..].iter().enumerate() {
        assert!(
            (sample - expected_sine(69, k)).abs() < DSP_EPSILON,
            "frame {}: got {sample}",
            20 + k
        );
    }
}

#[test]
fn test_event_scheduled_in_a_later_block() {
    let mut engine = test_engine();
    let synth = engine.load_plugin("builtin:sine").unwrap();
    engine.connect(synth, NodeRef::Output).unwrap();

    // Second block, frame 5.
    let time = TEST_BLOCK_SIZE as u64 + 5;
    engine.schedule_midi(time, synth, MidiEvent::note_on(0, 60, 127));

    assert!(is_silent(&render_silence_in(&engine)));
    let second = render_silence_in(&engine);
    assert!(is_silent(&second[..6]));
    assert!(!is_silent(&second[6..]));
}

#[test]
fn test_note_off_silences_voice() {
    let mut engine = test_engine();
    let synth = engine.load_plugin("builtin:sine").unwrap();
    engine.connect(synth, NodeRef::Output).unwrap();

    engine.send_midi(synth, MidiEvent::note_on(0, 64, 100));
    engine.send_midi(synth, MidiEvent::note_off(0, 64, 0).at(32));
    let out = render_silence_in(&engine);

    assert!(!is_silent(&out[..32]));
    assert!(is_silent(&out[32..]));
}

#[test]
fn test_events_only_reach_their_target() {
    let mut engine = test_engine();
    let a = engine.load_plugin("builtin:sine").unwrap();
    let b = engine.load_plugin("builtin:sine").unwrap();
    engine.connect(b, NodeRef::Output).unwrap();

    engine.send_midi(a, MidiEvent::note_on(0, 69, 127));
    assert!(is_silent(&render_silence_in(&engine)));
}

#[test]
fn test_queue_overflow_drops_oldest() {
    let mut engine = test_builder().midi_queue_capacity(256).build().unwrap();
    let synth = engine.load_plugin("builtin:sine").unwrap();

    let mut dropped = 0;
    for i in 0..300 {
        let event = MidiEvent::control_change(0, 7, (i % 128) as u8);
        if engine.schedule_midi(0, synth, event) == Enqueued::DroppedOldest {
            dropped += 1;
        }
    }
    assert_eq!(dropped, 44);
    assert_eq!(engine.health().dropped_midi, 44);
}

#[test]
fn test_producer_handle_from_another_thread() {
    let mut engine = test_engine();
    let synth = engine.load_plugin("builtin:sine").unwrap();
    engine.connect(synth, NodeRef::Output).unwrap();

    let producer = engine.midi_producer();
    std::thread::spawn(move || {
        producer.enqueue(0, synth.raw(), MidiEvent::note_on(0, 72, 127));
    })
    .join()
    .unwrap();

    assert!(!is_silent(&render_silence_in(&engine)));
}
