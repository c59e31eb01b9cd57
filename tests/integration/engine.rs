//! Engine integration tests
//!
//! Builder configuration, lifecycle states, the engine lock seen from the
//! audio thread, and event delivery.

use crate::helpers::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tactus::core::{EngineState, LockObserver};
use tactus::prelude::*;
use tactus::{Error, NullRenderer};

#[test]
fn test_builder_prepares_engine() {
    let (engine, _log) = logged_engine(1);
    assert_state(&engine, EngineState::Prepared);
    assert_eq!(engine.sample_rate(), TEST_SAMPLE_RATE);

    // Prepared but without a song the callback does nothing.
    let mut out = vec![1.0; TEST_BUFFER_SIZE * 2];
    assert_eq!(engine.process(&mut out), CallbackStatus::Idle);
    assert_silence(&out);

    engine.load_song(pattern_song()).unwrap();
    assert_state(&engine, EngineState::Ready);
    assert_eq!(engine.process(&mut out), CallbackStatus::Processed);
}

#[test]
fn test_builder_rejects_invalid_config() {
    let result = TactusEngine::builder().sample_rate(1000.0).build();
    assert!(matches!(result, Err(Error::Core(_))));

    let result = TactusEngine::builder().buffer_size(0).build();
    assert!(matches!(result, Err(Error::Core(_))));
}

#[test]
fn test_remove_song_returns_to_prepared() {
    let (engine, _log) = logged_engine(1);
    load_pattern_song(&engine);
    engine.transport().play();
    assert_state(&engine, EngineState::Playing);

    engine.core().remove_song().unwrap();
    assert_state(&engine, EngineState::Prepared);
    assert!(!engine.transport().is_playing());
    assert!(engine.core().song().is_none());
}

#[test]
fn test_control_requires_song() {
    let (engine, _log) = logged_engine(1);
    assert!(engine.core().start().is_err());
    assert!(matches!(
        engine.core().set_next_pattern(0),
        Err(tactus::core::Error::NoSong)
    ));
}

#[test]
fn test_audio_thread_never_waits_for_a_busy_lock() {
    let (engine, _log) = logged_engine(1);
    load_pattern_song(&engine);
    engine.transport().play();

    std::thread::scope(|s| {
        let _held = engine.core().lock();
        let audio = s.spawn(|| {
            let mut out = vec![1.0; TEST_BUFFER_SIZE * 2];
            let started = Instant::now();
            let status = engine.process(&mut out);
            (status, started.elapsed(), out)
        });
        let (status, elapsed, out) = audio.join().unwrap();
        assert_eq!(status, CallbackStatus::LockTimeout);
        assert!(elapsed < Duration::from_millis(200));
        assert_silence(&out);
    });

    assert_eq!(engine.core().lock_timeouts(), 1);
    // The failed callback did not advance the transport.
    assert_eq!(engine.position().frame, 0);

    let mut out = vec![0.0; TEST_BUFFER_SIZE * 2];
    assert_eq!(engine.process(&mut out), CallbackStatus::Processed);
    assert_eq!(engine.position().frame, TEST_BUFFER_SIZE as u64);
}

#[derive(Default)]
struct CountingObserver {
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl LockObserver for CountingObserver {
    fn acquired(&self, _location: &'static std::panic::Location<'static>) {
        self.acquired.fetch_add(1, Ordering::SeqCst);
    }

    fn released(&self, _location: &'static std::panic::Location<'static>) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_lock_observer_sees_every_acquisition() {
    let observer = Arc::new(CountingObserver::default());
    let engine = TactusEngine::builder()
        .renderer(NullRenderer)
        .lock_observer(observer.clone())
        .build()
        .unwrap();
    let after_build = observer.acquired.load(Ordering::SeqCst);
    assert!(after_build > 0);

    engine.load_song(pattern_song()).unwrap();
    let mut out = vec![0.0; 256];
    engine.process(&mut out);

    assert_eq!(observer.acquired.load(Ordering::SeqCst), after_build + 2);
    assert_eq!(
        observer.acquired.load(Ordering::SeqCst),
        observer.released.load(Ordering::SeqCst)
    );
}

#[test]
fn test_events_follow_control_operations() {
    let (engine, _log) = logged_engine(1);
    let events = engine.events();
    load_pattern_song(&engine);
    drain_events(&events);

    engine.transport().play();
    let received = drain_events(&events);
    assert!(received.contains(&EngineEvent::StateChanged(EngineState::Playing)));
    assert!(received.contains(&EngineEvent::PlaybackStateChanged { rolling: true }));

    let mut out = vec![0.0; TEST_BUFFER_SIZE * 2];
    engine.process(&mut out);
    let received = drain_events(&events);
    assert!(received.contains(&EngineEvent::PatternChanged { column: None }));

    engine.transport().stop();
    let received = drain_events(&events);
    assert!(received.contains(&EngineEvent::PlaybackStateChanged { rolling: false }));
    assert_eq!(engine.core().dropped_events(), 0);
}
