//! Transport integration tests
//!
//! Play/stop/seek, tempo, song-mode timeline walk, end of song, and
//! following an external clock.

use crate::helpers::*;
use approx::assert_relative_eq;
use std::sync::{Arc, Mutex};
use tactus::core::{EngineState, ExternalClock, ExternalPosition, SyncSource, SyncStatus};
use tactus::prelude::*;
use tactus::TempoMarker;

#[test]
fn test_transport_play_stop() {
    let (engine, _log) = logged_engine(1);
    load_pattern_song(&engine);
    assert!(!engine.transport().is_playing());

    engine.transport().play();
    assert!(engine.transport().is_playing());
    assert_state(&engine, EngineState::Playing);

    run_frames(&engine, &[TEST_BUFFER_SIZE], 4096);
    engine.transport().stop();
    assert!(!engine.transport().is_playing());
    assert_state(&engine, EngineState::Ready);
    // Stopping keeps the position.
    assert_eq!(engine.position().frame, 4096);
}

#[test]
fn test_transport_tempo() {
    let (engine, _log) = logged_engine(1);
    load_pattern_song(&engine);

    engine.transport().tempo(140.0);
    assert_relative_eq!(engine.transport().get_tempo(), 140.0);

    // Out-of-range tempo is rejected and the old one kept.
    engine.transport().tempo(5000.0);
    assert_eq!(engine.transport().get_tempo(), 140.0);
    assert!(engine.core().set_bpm(f64::NAN).is_err());

    engine.transport().play();
    run_frames(&engine, &[TEST_BUFFER_SIZE], 2048);
    assert_relative_eq!(engine.transport().get_tempo(), 140.0);
    assert_relative_eq!(engine.position().tick_size, 48_000.0 * 60.0 / 140.0 / 48.0);
}

#[test]
fn test_position_is_monotonic_across_tempo_changes() {
    let (engine, log) = logged_engine(1);
    load_pattern_song(&engine);
    engine.transport().play();

    let blocks = [512usize, 64, 1000, 333, 2048];
    let mut last = engine.position();
    for (i, &block) in blocks.iter().cycle().take(200).enumerate() {
        if i == 50 {
            engine.transport().tempo(180.0);
        }
        if i == 120 {
            engine.transport().tempo(75.5);
        }
        let mut out = vec![0.0; block * 2];
        engine.process(&mut out);
        let position = engine.position();
        assert_eq!(position.frame, last.frame + block as u64);
        assert!(position.tick >= last.tick);
        last = position;
    }

    let onsets = onsets(&log);
    assert!(!onsets.is_empty());
    assert!(onsets.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_seek_tick_and_column() {
    let (engine, _log) = logged_engine(1);
    engine.load_song(timeline_song(4)).unwrap();

    engine.transport().seek_tick(96);
    assert_eq!(engine.position().frame, 96 * TEST_TICK_SIZE);
    assert_eq!(engine.position().tick, 96);

    engine.transport().column(2);
    assert_eq!(engine.position().tick, 384);
    assert_eq!(engine.core().pattern_length(2), Some(192));

    // Out-of-range column leaves the position alone.
    engine.transport().column(9);
    assert_eq!(engine.position().tick, 384);
    assert!(engine.core().set_column(9).is_err());
}

#[test]
fn test_song_mode_walks_the_timeline() {
    let (engine, log) = logged_engine(1);
    let events = engine.events();
    engine.load_song(timeline_song(2)).unwrap();
    engine.transport().play();

    // Both columns: 384 ticks.
    let (_, status) = run_frames(&engine, &[TEST_BUFFER_SIZE], 380 * TEST_TICK_SIZE);
    assert_eq!(status, CallbackStatus::Processed);
    assert_eq!(engine.position().column, Some(1));

    let columns: Vec<_> = drain_events(&events)
        .into_iter()
        .filter_map(|e| match e {
            EngineEvent::PatternChanged { column } => column,
            _ => None,
        })
        .collect();
    assert_eq!(columns, vec![0, 1]);

    // Four kicks and eight hats per column.
    assert_eq!(log.notes().lock().len(), 24);
    let kicks: Vec<_> = logged(&log)
        .into_iter()
        .filter(|n| n.note.instrument.0 == 0)
        .map(|n| n.frame)
        .collect();
    let expected: Vec<_> = (0..8).map(|q| q * 48 * TEST_TICK_SIZE).collect();
    assert_eq!(kicks, expected);
}

#[test]
fn test_end_of_song_stops_and_rewinds() {
    let (engine, log) = logged_engine(1);
    let events = engine.events();
    let mut song = Song::new("long");
    song.mode = SongMode::Song;
    let long = song.add_pattern(Pattern::new("long", 10_000).with_note(PatternNote::new(0, 0)));
    song.add_column([long]);
    engine.load_song(song).unwrap();
    engine.transport().play();

    let end_frame = 10_000 * TEST_TICK_SIZE;
    let mut frames = 0u64;
    let mut status = CallbackStatus::Processed;
    let mut out = vec![0.0; TEST_BUFFER_SIZE * 2];
    while status == CallbackStatus::Processed {
        status = engine.process(&mut out);
        frames += TEST_BUFFER_SIZE as u64;
        assert!(frames <= end_frame + TEST_BUFFER_SIZE as u64);
    }
    assert_eq!(status, CallbackStatus::EndOfSong);
    assert!(frames >= end_frame);

    assert!(drain_events(&events).contains(&EngineEvent::EndOfSong));
    assert_state(&engine, EngineState::Ready);
    assert!(!engine.transport().is_playing());
    assert_eq!(engine.position().frame, 0);
    assert_eq!(log.notes().lock().len(), 1);

    // Further callbacks produce silence.
    for _ in 0..4 {
        assert_eq!(engine.process(&mut out), CallbackStatus::Processed);
        assert_silence(&out);
    }
}

#[test]
fn test_timeline_tempo_switches_at_column_start() {
    let (engine, log) = logged_engine(1);
    let events = engine.events();
    let mut song = Song::new("markers");
    song.mode = SongMode::Song;
    song.use_timeline_bpm = true;
    song.tempo_markers.push(TempoMarker { column: 1, bpm: 240.0 });
    let mut pattern = Pattern::new("dense", 48);
    for pos in 0..48 {
        pattern.add_note(PatternNote::new(0, pos));
    }
    let dense = song.add_pattern(pattern);
    song.add_column([dense]);
    song.add_column([dense]);
    engine.load_song(song).unwrap();
    engine.transport().play();

    let mut out = vec![0.0; TEST_BUFFER_SIZE * 2];
    let mut switched_at = None;
    loop {
        let status = engine.process(&mut out);
        if status == CallbackStatus::EndOfSong {
            break;
        }
        assert_eq!(status, CallbackStatus::Processed);
        let position = engine.position();
        if position.tick < 48 {
            assert_relative_eq!(position.bpm, 120.0);
        } else {
            assert_relative_eq!(position.bpm, 240.0);
            assert_relative_eq!(position.tick_size, 250.0);
            switched_at.get_or_insert(position.frame);
        }
    }
    // First buffer ending past the column start at 48 * 500 frames.
    assert_eq!(switched_at, Some(47 * TEST_BUFFER_SIZE as u64));
    assert!(drain_events(&events).contains(&EngineEvent::TempoChanged { bpm: 240.0 }));

    let notes = logged(&log);
    assert_eq!(notes.len(), 96);
    assert!(notes.windows(2).all(|w| w[0].frame < w[1].frame));
    assert!(notes
        .iter()
        .enumerate()
        .all(|(tick, n)| n.note.onset_tick == tick as u64));
    assert_eq!(notes[48].frame, 48 * TEST_TICK_SIZE);
    assert_eq!(notes[49].frame - notes[48].frame, TEST_TICK_SIZE / 2);
}

#[test]
fn test_looping_song_never_ends() {
    let (engine, log) = logged_engine(1);
    engine.load_song(timeline_song(1)).unwrap();
    engine.transport().enable_loop().play();

    let (_, status) = run_frames(&engine, &[TEST_BUFFER_SIZE], 3 * 192 * TEST_TICK_SIZE);
    assert_eq!(status, CallbackStatus::Processed);
    assert!(engine.transport().is_playing());
    // Three passes of twelve notes, plus the downbeat of the fourth inside
    // the final buffer.
    let count = log.notes().lock().len();
    assert!((36..=37).contains(&count), "got {count} notes");
}

#[test]
fn test_enabling_loop_late_keeps_playing() {
    let (engine, _log) = logged_engine(1);
    engine.load_song(timeline_song(1)).unwrap();
    engine.transport().play();
    run_frames(&engine, &[TEST_BUFFER_SIZE], 180 * TEST_TICK_SIZE);

    engine.transport().enable_loop();
    let (_, status) = run_frames(&engine, &[TEST_BUFFER_SIZE], 100 * TEST_TICK_SIZE);
    assert_eq!(status, CallbackStatus::Processed);
    assert!(engine.transport().is_playing());
    assert_eq!(engine.position().column, Some(0));
}

/// External transport the test moves by hand.
#[derive(Clone)]
struct ManualClock(Arc<Mutex<ExternalPosition>>);

impl ManualClock {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(ExternalPosition {
            frame: 0,
            bpm: 120.0,
            rolling: false,
        })))
    }

    fn set(&self, update: impl FnOnce(&mut ExternalPosition)) {
        update(&mut self.0.lock().unwrap());
    }
}

impl ExternalClock for ManualClock {
    fn query(&mut self) -> ExternalPosition {
        *self.0.lock().unwrap()
    }
}

#[test]
fn test_follows_timebase_master() {
    let clock = ManualClock::new();
    let engine = TactusEngine::builder()
        .seed(1)
        .external_clock(clock.clone(), SyncSource::Timebase)
        .build()
        .unwrap();
    let events = engine.events();
    load_pattern_song(&engine);

    let mut out = vec![0.0; TEST_BUFFER_SIZE * 2];
    engine.process(&mut out);
    assert!(!engine.transport().is_playing());

    // Master starts rolling at 140 BPM.
    clock.set(|p| {
        p.rolling = true;
        p.bpm = 140.0;
    });
    for _ in 0..8 {
        engine.process(&mut out);
        clock.set(|p| p.frame += TEST_BUFFER_SIZE as i64);
    }
    assert!(engine.transport().is_playing());
    assert_relative_eq!(engine.position().bpm, 140.0);
    assert_eq!(engine.position().frame, 8 * TEST_BUFFER_SIZE as u64);
    assert_eq!(engine.core().sync_state().status(), SyncStatus::Locked);
    assert!(matches!(
        engine.core().set_bpm(100.0),
        Err(tactus::core::Error::TempoLocked)
    ));
    assert!(drain_events(&events).contains(&EngineEvent::TempoChanged { bpm: 140.0 }));

    // Master jumps; the engine follows.
    clock.set(|p| p.frame = 96_000);
    engine.process(&mut out);
    assert_eq!(engine.position().frame, 96_000 + TEST_BUFFER_SIZE as u64);
    assert!(drain_events(&events)
        .iter()
        .any(|e| matches!(e, EngineEvent::TickPositionChanged { .. })));

    // Malformed tempo is ignored.
    clock.set(|p| {
        p.frame = 96_000 + TEST_BUFFER_SIZE as i64;
        p.bpm = f64::NAN;
    });
    engine.process(&mut out);
    assert_eq!(engine.core().sync_state().status(), SyncStatus::Drifting);
    assert_eq!(engine.position().bpm, 140.0);
    assert!(engine.transport().is_playing());

    // Master stops.
    clock.set(|p| {
        p.rolling = false;
        p.bpm = 140.0;
    });
    engine.process(&mut out);
    assert!(!engine.transport().is_playing());
}

#[test]
fn test_transport_sync_keeps_local_tempo() {
    let clock = ManualClock::new();
    let engine = TactusEngine::builder()
        .external_clock(clock.clone(), SyncSource::Transport)
        .build()
        .unwrap();
    load_pattern_song(&engine);

    clock.set(|p| {
        p.rolling = true;
        p.bpm = 90.0;
    });
    let mut out = vec![0.0; TEST_BUFFER_SIZE * 2];
    engine.process(&mut out);
    assert!(engine.transport().is_playing());
    assert_eq!(engine.position().bpm, 120.0);
    engine.core().set_bpm(100.0).unwrap();
    assert_eq!(engine.position().bpm, 100.0);
}
