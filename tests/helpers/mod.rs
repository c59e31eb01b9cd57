//! Test helpers and fixtures for Tactus integration tests
//!
//! Engines are driven by calling the audio callback by hand, so every test
//! controls exactly which buffers run and in what sizes. Notes are observed
//! through a [`NoteLog`] renderer, which writes a one-sample impulse of each
//! note's velocity at its onset.

#![allow(dead_code)]

use tactus::core::{EngineState, LoggedNote, NoteLog};
use tactus::prelude::*;

/// Default test sample rate (matches common hardware)
pub const TEST_SAMPLE_RATE: f64 = 48000.0;

/// Standard buffer size for deterministic testing
pub const TEST_BUFFER_SIZE: usize = 512;

/// Frames per tick at 120 BPM and 48 ticks per quarter note.
pub const TEST_TICK_SIZE: u64 = 500;

/// Route engine logs through the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Build a prepared engine with a note log and a fixed seed.
pub fn logged_engine(seed: u64) -> (TactusEngine, NoteLog) {
    init_tracing();
    let log = NoteLog::new();
    let engine = TactusEngine::builder()
        .sample_rate(TEST_SAMPLE_RATE)
        .buffer_size(TEST_BUFFER_SIZE)
        .seed(seed)
        .renderer(log.clone())
        .build()
        .expect("Failed to create test engine");
    (engine, log)
}

/// One bar (192 ticks) with a kick on every quarter and a hat on every eighth.
pub fn beat_pattern() -> Pattern {
    let mut pattern = Pattern::new("beat", 192);
    for quarter in 0..4 {
        pattern.add_note(PatternNote::new(0, quarter * 48).velocity(0.9));
    }
    for eighth in 0..8 {
        pattern.add_note(PatternNote::new(1, eighth * 24 + 12).velocity(0.4));
    }
    pattern
}

/// Pattern-mode song with [`beat_pattern`] queued as the next pattern.
pub fn pattern_song() -> Song {
    let mut song = Song::new("pattern song");
    song.add_pattern(beat_pattern());
    song
}

/// Song-mode song with `columns` columns, each playing [`beat_pattern`].
pub fn timeline_song(columns: usize) -> Song {
    let mut song = Song::new("timeline song");
    song.mode = SongMode::Song;
    let beat = song.add_pattern(beat_pattern());
    for _ in 0..columns {
        song.add_column([beat]);
    }
    song
}

/// Load a pattern-mode song and queue its first pattern.
pub fn load_pattern_song(engine: &TactusEngine) {
    engine.load_song(pattern_song()).expect("load song");
    engine.core().set_next_pattern(0).expect("queue pattern");
}

/// Run callbacks with `blocks` cycled until `frames` frames are processed.
/// Returns the interleaved output and the last callback status.
pub fn run_frames(
    engine: &TactusEngine,
    blocks: &[usize],
    frames: u64,
) -> (Vec<f32>, CallbackStatus) {
    let mut output = Vec::new();
    let mut processed = 0u64;
    let mut status = CallbackStatus::Idle;
    for &block in blocks.iter().cycle() {
        if processed >= frames {
            break;
        }
        let n = (frames - processed).min(block as u64) as usize;
        let mut buffer = vec![0.0f32; n * 2];
        status = engine.process(&mut buffer);
        output.extend_from_slice(&buffer);
        processed += n as u64;
    }
    (output, status)
}

/// Onset frames of the logged notes, in submission order.
pub fn onsets(log: &NoteLog) -> Vec<u64> {
    log.notes().lock().iter().map(|n| n.frame).collect()
}

pub fn logged(log: &NoteLog) -> Vec<LoggedNote> {
    log.notes().lock().clone()
}

/// Every event currently queued.
pub fn drain_events(receiver: &tactus::core::EventReceiver) -> Vec<EngineEvent> {
    receiver.try_iter().collect()
}

/// Calculate peak amplitude of a signal.
pub fn peak(samples: &[f32]) -> f32 {
    samples
        .iter()
        .map(|s| s.abs())
        .fold(0.0_f32, |a, b| a.max(b))
}

/// Assert that a signal is silent.
pub fn assert_silence(samples: &[f32]) {
    let max = peak(samples);
    assert!(max == 0.0, "Expected silence, but peak amplitude was {}", max);
}

pub fn assert_state(engine: &TactusEngine, state: EngineState) {
    assert_eq!(engine.position().state, state);
}
