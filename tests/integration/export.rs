//! Export integration tests
//!
//! Offline render of a song to WAV and raw float samples.

use crate::helpers::*;
use tactus::core::EngineState;
use tactus::prelude::*;
use tactus::ExportOptions;

#[test]
fn test_render_song_to_end() {
    let (engine, log) = logged_engine(1);
    engine.load_song(timeline_song(2)).unwrap();

    let rendered = engine.render(&ExportOptions::default()).unwrap();
    assert!(rendered.ended);
    assert_eq!(rendered.frames, 384 * TEST_TICK_SIZE);
    assert_eq!(rendered.samples.len() as u64, rendered.frames * 2);
    assert_eq!(log.notes().lock().len(), 24);

    // The engine is rewound and stopped afterwards.
    assert_state(&engine, EngineState::Ready);
    assert_eq!(engine.position().frame, 0);
}

#[test]
fn test_render_rejects_invalid_block_size() {
    let (engine, _log) = logged_engine(1);
    load_pattern_song(&engine);
    let options = ExportOptions {
        block_sizes: vec![512, 0],
        ..Default::default()
    };
    assert!(engine.render(&options).is_err());
    assert!(!engine.transport().is_playing());
}

#[test]
fn test_render_requires_song() {
    let (engine, _log) = logged_engine(1);
    assert!(engine.render(&ExportOptions::default()).is_err());
}

#[test]
fn test_write_raw_samples() {
    let (engine, _log) = logged_engine(1);
    engine.load_song(timeline_song(1)).unwrap();
    let rendered = engine.render(&ExportOptions::default()).unwrap();

    let mut bytes = Vec::new();
    TactusEngine::write_raw(&rendered, &mut bytes).unwrap();
    assert_eq!(bytes.len(), rendered.samples.len() * 4);
    let first = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    assert_eq!(first, rendered.samples[0]);
    assert_eq!(first, 0.9);
}

#[cfg(feature = "wav")]
#[test]
fn test_export_wav_round_trip() {
    let (engine, _log) = logged_engine(1);
    engine.load_song(timeline_song(1)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("beat.wav");

    let rendered = engine
        .export_wav(
            &path,
            &ExportOptions {
                block_sizes: vec![256],
                ..Default::default()
            },
        )
        .unwrap();

    let mut reader = hound::WavReader::open(&path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, 48_000);
    assert_eq!(spec.bits_per_sample, 32);
    assert_eq!(spec.sample_format, hound::SampleFormat::Float);

    let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
    assert_eq!(samples, rendered.samples);
}
