//! Fluent control handles for the transport and metronome.
//!
//! Errors are logged and swallowed so calls can be chained; use the
//! [`AudioEngine`] methods directly when the result matters.

use super::Metronome;
use crate::compat::Arc;
use crate::engine::{AudioEngine, PlaybackPosition};
use crate::song::SongMode;

/// Fluent handle for metronome settings.
///
/// Created via `transport.metronome()`.
///
/// # Example
/// ```ignore
/// engine.transport()
///     .metronome()
///     .volume(0.7)
///     .on();
/// ```
pub struct MetronomeHandle {
    metronome: Arc<Metronome>,
}

impl MetronomeHandle {
    pub(crate) fn new(metronome: Arc<Metronome>) -> Self {
        Self { metronome }
    }

    /// Set click volume (0.0 to 1.0).
    pub fn volume(self, volume: f32) -> Self {
        self.metronome.set_volume(volume);
        self
    }

    pub fn get_volume(&self) -> f32 {
        self.metronome.volume()
    }

    pub fn on(self) -> Self {
        self.metronome.set_enabled(true);
        self
    }

    pub fn off(self) -> Self {
        self.metronome.set_enabled(false);
        self
    }

    pub fn toggle(self) -> Self {
        self.metronome.toggle();
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.metronome.is_enabled()
    }
}

/// Fluent handle for transport control.
///
/// Created via `engine.transport()`.
///
/// # Example
/// ```ignore
/// engine.transport()
///     .tempo(128.0)
///     .song_mode(SongMode::Song)
///     .enable_loop()
///     .play();
/// ```
#[derive(Clone)]
pub struct TransportHandle {
    engine: Arc<AudioEngine>,
}

impl TransportHandle {
    pub fn new(engine: Arc<AudioEngine>) -> Self {
        Self { engine }
    }

    /// Set tempo in BPM.
    pub fn tempo(self, bpm: f64) -> Self {
        if let Err(e) = self.engine.set_bpm(bpm) {
            tracing::warn!("Failed to set tempo: {}", e);
        }
        self
    }

    pub fn get_tempo(&self) -> f64 {
        self.engine.position().bpm
    }

    /// Start playback from the current position.
    pub fn play(self) -> Self {
        if let Err(e) = self.engine.start() {
            tracing::warn!("Failed to start playback: {}", e);
        }
        self
    }

    pub fn stop(self) -> Self {
        if let Err(e) = self.engine.stop() {
            tracing::warn!("Failed to stop playback: {}", e);
        }
        self
    }

    /// Stop and silence every voice.
    pub fn panic(self) -> Self {
        if let Err(e) = self.engine.panic() {
            tracing::warn!("Panic failed: {}", e);
        }
        self
    }

    /// Jump to an absolute frame.
    pub fn seek(self, frame: u64) -> Self {
        if let Err(e) = self.engine.relocate(frame) {
            tracing::warn!("Failed to relocate to frame {}: {}", frame, e);
        }
        self
    }

    /// Jump to an absolute tick.
    pub fn seek_tick(self, tick: u64) -> Self {
        if let Err(e) = self.engine.relocate_to_tick(tick) {
            tracing::warn!("Failed to relocate to tick {}: {}", tick, e);
        }
        self
    }

    /// Jump to the start of a timeline column.
    pub fn column(self, column: usize) -> Self {
        if let Err(e) = self.engine.set_column(column) {
            tracing::warn!("Failed to relocate to column {}: {}", column, e);
        }
        self
    }

    pub fn song_mode(self, mode: SongMode) -> Self {
        if let Err(e) = self.engine.set_song_mode(mode) {
            tracing::warn!("Failed to set song mode: {}", e);
        }
        self
    }

    pub fn enable_loop(self) -> Self {
        if let Err(e) = self.engine.set_loop_enabled(true) {
            tracing::warn!("Failed to enable loop: {}", e);
        }
        self
    }

    pub fn disable_loop(self) -> Self {
        if let Err(e) = self.engine.set_loop_enabled(false) {
            tracing::warn!("Failed to disable loop: {}", e);
        }
        self
    }

    /// Metronome settings.
    pub fn metronome(&self) -> MetronomeHandle {
        MetronomeHandle::new(Arc::clone(self.engine.metronome()))
    }

    pub fn position(&self) -> PlaybackPosition {
        self.engine.position()
    }

    pub fn is_playing(&self) -> bool {
        self.engine.position().rolling
    }
}
