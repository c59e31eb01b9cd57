//! Scheduler integration tests
//!
//! Sample-accurate note placement, humanize determinism, live input and
//! live recording, and parity between realtime callbacks and offline render.

use crate::helpers::*;
use tactus::core::{PreDelete, RecordSettings};
use tactus::prelude::*;
use tactus::ExportOptions;

#[test]
fn test_notes_land_on_their_tick() {
    let (engine, log) = logged_engine(1);
    load_pattern_song(&engine);
    engine.transport().play();

    let (out, _) = run_frames(&engine, &[TEST_BUFFER_SIZE], 192 * TEST_TICK_SIZE);
    let notes = logged(&log);
    assert_eq!(notes.len(), 12);
    for note in &notes {
        assert_eq!(note.frame, note.note.onset_tick * TEST_TICK_SIZE);
        assert_eq!(out[note.frame as usize * 2], note.note.velocity);
    }
}

#[test]
fn test_buffer_size_does_not_change_timing() {
    let reference = {
        let (engine, log) = logged_engine(3);
        load_pattern_song(&engine);
        engine.transport().play();
        run_frames(&engine, &[TEST_BUFFER_SIZE], 200_000);
        onsets(&log)
    };

    for blocks in [&[64usize][..], &[2048], &[17, 999, 256]] {
        let (engine, log) = logged_engine(3);
        load_pattern_song(&engine);
        engine.transport().play();
        run_frames(&engine, blocks, 200_000);
        assert_eq!(onsets(&log), reference, "blocks {blocks:?}");
    }
}

fn humanized_song() -> Song {
    let mut song = pattern_song();
    song.swing_factor = 0.5;
    song.humanize_time = 0.8;
    song.humanize_velocity = 0.3;
    song
}

#[test]
fn test_realtime_and_offline_render_match() {
    let blocks = [512usize, 128, 1024];
    let frames = 1664 * 40;

    let (realtime, realtime_log) = logged_engine(5);
    realtime.load_song(humanized_song()).unwrap();
    realtime.core().set_next_pattern(0).unwrap();
    realtime.transport().play();
    let (realtime_out, _) = run_frames(&realtime, &blocks, frames);

    let (offline, offline_log) = logged_engine(5);
    offline.load_song(humanized_song()).unwrap();
    offline.core().set_next_pattern(0).unwrap();
    let rendered = offline
        .render(&ExportOptions {
            block_sizes: blocks.to_vec(),
            max_frames: frames,
        })
        .unwrap();

    assert_eq!(rendered.frames, frames);
    assert!(!rendered.ended);
    assert_eq!(logged(&realtime_log), logged(&offline_log));
    assert_eq!(realtime_out, rendered.samples);
}

#[test]
fn test_tempo_change_keeps_onsets_in_order() {
    let (engine, log) = logged_engine(1);
    let mut pattern = Pattern::new("dense", 192);
    for pos in 0..192 {
        pattern.add_note(PatternNote::new(0, pos));
    }
    let mut song = Song::new("dense");
    song.add_pattern(pattern);
    engine.load_song(song).unwrap();
    engine.core().set_next_pattern(0).unwrap();
    engine.transport().play();

    let mut out = vec![0.0; TEST_BUFFER_SIZE * 2];
    for cycle in 0..40 {
        if cycle == 20 {
            engine.transport().tempo(240.0);
        }
        engine.process(&mut out);
    }

    // 120 BPM up to frame 10240 (tick 20), then 250 frames per tick.
    let notes = logged(&log);
    let ticks: Vec<u64> = notes.iter().map(|n| n.note.onset_tick).collect();
    assert_eq!(ticks, (0..61).collect::<Vec<u64>>());
    assert!(notes.windows(2).all(|w| w[0].frame < w[1].frame));
    assert_eq!(notes[21].frame, 10_240 + 250);
    assert_eq!(notes[60].frame - notes[59].frame, 250);
}

#[test]
fn test_different_seeds_humanize_differently() {
    let run = |seed| {
        let (engine, log) = logged_engine(seed);
        engine.load_song(humanized_song()).unwrap();
        engine.core().set_next_pattern(0).unwrap();
        engine.transport().play();
        run_frames(&engine, &[TEST_BUFFER_SIZE], 96_000);
        logged(&log)
    };
    assert_eq!(run(8), run(8));
    assert_ne!(run(8), run(9));
}

#[test]
fn test_live_note_plays_in_next_buffer() {
    let (engine, log) = logged_engine(1);
    engine.load_song(Song::new("empty")).unwrap();
    engine.transport().play();
    run_frames(&engine, &[TEST_BUFFER_SIZE], 10 * TEST_BUFFER_SIZE as u64);

    let input = engine.clone();
    std::thread::spawn(move || input.core().note_on(LiveNote::new(3, 0.6)))
        .join()
        .unwrap()
        .unwrap();

    let mut out = vec![0.0; TEST_BUFFER_SIZE * 2];
    engine.process(&mut out);
    let notes = logged(&log);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].note.instrument.0, 3);
    assert!(notes[0].frame >= 10 * TEST_BUFFER_SIZE as u64);
    assert!(notes[0].frame < 11 * TEST_BUFFER_SIZE as u64);
    assert_eq!(peak(&out), 0.6);
}

#[test]
fn test_live_note_after_relocate_is_not_lost() {
    let (engine, log) = logged_engine(1);
    load_pattern_song(&engine);
    engine.transport().play();
    run_frames(&engine, &[TEST_BUFFER_SIZE], 100_000);

    engine.core().note_on(LiveNote::new(7, 0.5)).unwrap();
    engine.transport().seek(0);
    let before = log.notes().lock().len();
    let mut out = vec![0.0; TEST_BUFFER_SIZE * 2];
    engine.process(&mut out);

    let notes = logged(&log);
    assert!(notes[before..].iter().any(|n| n.note.instrument.0 == 7));
}

#[test]
fn test_recording_reports_notes() {
    let (engine, log) = logged_engine(1);
    let events = engine.events();
    load_pattern_song(&engine);
    engine.core().set_selected_pattern(Some(0)).unwrap();
    engine.transport().play();
    // Tick 30.
    run_frames(&engine, &[TEST_BUFFER_SIZE], 30 * TEST_TICK_SIZE);
    drain_events(&events);

    let settings = RecordSettings {
        quantize: true,
        grid_resolution: 8,
        pre_delete: Some(PreDelete::WholePattern),
        ..Default::default()
    };
    let recorded = engine
        .core()
        .record_note(LiveNote::new(2, 0.7), &settings)
        .unwrap()
        .expect("recorded while rolling");

    // Eighth grid at 48 ticks per quarter is 24 ticks.
    assert_eq!(recorded.pattern, 0);
    assert_eq!(recorded.column, 24);
    assert!(!recorded.replaces_existing);

    let received = drain_events(&events);
    assert!(received.contains(&EngineEvent::NoteRecorded(recorded)));
    assert!(received.iter().any(|e| matches!(
        e,
        EngineEvent::NotesErased(erased) if erased.pattern == 0 && erased.instrument.is_none()
    )));

    // Quantized into the past, so it is heard right away.
    let before = log.notes().lock().len();
    let mut out = vec![0.0; TEST_BUFFER_SIZE * 2];
    engine.process(&mut out);
    assert!(logged(&log)[before..]
        .iter()
        .any(|n| n.note.instrument.0 == 2));
}

#[test]
fn test_recording_while_stopped_just_plays() {
    let (engine, log) = logged_engine(1);
    let events = engine.events();
    load_pattern_song(&engine);
    engine.core().set_selected_pattern(Some(0)).unwrap();
    drain_events(&events);

    let recorded = engine
        .core()
        .record_note(LiveNote::new(2, 0.7), &RecordSettings::default())
        .unwrap();
    assert!(recorded.is_none());

    let mut out = vec![0.0; TEST_BUFFER_SIZE * 2];
    engine.process(&mut out);
    assert_eq!(log.notes().lock().len(), 1);
    assert!(!drain_events(&events)
        .iter()
        .any(|e| matches!(e, EngineEvent::NoteRecorded(_))));
}

#[test]
fn test_metronome_clicks_on_every_beat() {
    let (engine, log) = logged_engine(1);
    engine.load_song(Song::new("click")).unwrap();
    engine.transport().metronome().volume(0.5).on();
    engine.transport().play();

    run_frames(&engine, &[TEST_BUFFER_SIZE], 4 * 48 * TEST_TICK_SIZE - 1);
    let frames: Vec<_> = logged(&log).iter().map(|n| n.frame).collect();
    assert_eq!(frames, vec![0, 24_000, 48_000, 72_000]);
}
